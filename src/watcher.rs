//! Runtime environment watcher.
//!
//! Subscribes to exactly the media queries and root-element attributes the
//! scanned stylesheets branch on, and releases every subscription on
//! [`RuntimeWatcher::stop`].

use std::collections::BTreeSet;
use std::rc::Rc;

use log::debug;

use crate::model::{ConditionKind, VariableSet};
use crate::selector::RootTrigger;

/// Change callback. Single-threaded: the host delivers on its event loop.
pub type Notify = Rc<dyn Fn()>;

/// Attribute-change callback; receives the mutated attribute's name.
pub type AttributeNotify = Rc<dyn Fn(&str)>;

/// Host-side subscription primitives (`matchMedia` listeners, a
/// `MutationObserver` on `document.documentElement`).
pub trait EnvironmentHost {
    type Subscription;

    /// Register a change listener on one media query.
    fn subscribe_media(&mut self, query: &str, notify: Notify) -> Self::Subscription;

    /// Observe the given attributes of the root element.
    fn observe_root_attributes(
        &mut self,
        attributes: &[String],
        notify: AttributeNotify,
    ) -> Self::Subscription;

    fn unsubscribe(&mut self, subscription: Self::Subscription);
}

/// The conditions found in the stylesheets, as subscription targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchTargets {
    pub media: BTreeSet<String>,
    /// `class` and/or `data-*` attribute names.
    pub attributes: BTreeSet<String>,
}

impl WatchTargets {
    pub fn from_model(model: &VariableSet) -> Self {
        let attributes = model
            .root_triggers()
            .iter()
            .map(RootTrigger::attribute_name)
            .filter(|name| *name == "class" || name.starts_with("data-"))
            .map(str::to_string)
            .collect();
        Self {
            media: model.conditions(ConditionKind::Media),
            attributes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.media.is_empty() && self.attributes.is_empty()
    }
}

/// Owns the live subscriptions for one engine instance.
pub struct RuntimeWatcher<S> {
    targets: WatchTargets,
    subscriptions: Vec<S>,
}

impl<S> Default for RuntimeWatcher<S> {
    fn default() -> Self {
        Self {
            targets: WatchTargets::default(),
            subscriptions: Vec::new(),
        }
    }
}

impl<S> RuntimeWatcher<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn targets(&self) -> &WatchTargets {
        &self.targets
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Subscribe to `targets`, dropping any previous subscriptions first.
    pub fn start<H>(&mut self, host: &mut H, targets: WatchTargets, notify: Notify)
    where
        H: EnvironmentHost<Subscription = S> + ?Sized,
    {
        self.stop(host);

        for query in &targets.media {
            self.subscriptions
                .push(host.subscribe_media(query, Rc::clone(&notify)));
        }

        if !targets.attributes.is_empty() {
            let tracked = targets.attributes.clone();
            let attrs: Vec<String> = targets.attributes.iter().cloned().collect();
            let on_attr: AttributeNotify = Rc::new(move |name: &str| {
                if tracked.contains(name) {
                    notify();
                }
            });
            self.subscriptions
                .push(host.observe_root_attributes(&attrs, on_attr));
        }

        debug!(
            "watching {} media queries, {} root attributes",
            targets.media.len(),
            targets.attributes.len()
        );
        self.targets = targets;
    }

    /// Release every subscription.
    pub fn stop<H>(&mut self, host: &mut H)
    where
        H: EnvironmentHost<Subscription = S> + ?Sized,
    {
        for sub in self.subscriptions.drain(..) {
            host.unsubscribe(sub);
        }
        self.targets = WatchTargets::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    use crate::model::Condition;
    use crate::scanner::Declared;

    /// Records subscriptions and lets tests fire them.
    #[derive(Default)]
    struct FakeHost {
        next_id: usize,
        media: Vec<(usize, String, Notify)>,
        observers: Vec<(usize, Vec<String>, AttributeNotify)>,
        released: Vec<usize>,
    }

    impl EnvironmentHost for FakeHost {
        type Subscription = usize;

        fn subscribe_media(&mut self, query: &str, notify: Notify) -> usize {
            self.next_id += 1;
            self.media.push((self.next_id, query.to_string(), notify));
            self.next_id
        }

        fn observe_root_attributes(&mut self, attributes: &[String], notify: AttributeNotify) -> usize {
            self.next_id += 1;
            self.observers.push((self.next_id, attributes.to_vec(), notify));
            self.next_id
        }

        fn unsubscribe(&mut self, id: usize) {
            self.released.push(id);
        }
    }

    fn model() -> VariableSet {
        let d = |value: &str, selector: &str, media: Option<&str>| Declared {
            property: "--bg".into(),
            value: value.into(),
            selector: selector.into(),
            condition: media.map(Condition::media),
        };
        VariableSet::build(vec![
            d("#fff", ":root", None),
            d("#000", ".dark", None),
            d("#111", "[data-theme=\"night\"]", None),
            d("#222", ":root", Some("(prefers-color-scheme: dark)")),
            d("#333", ":root", Some("(max-width: 768px)")),
            d("#444", "[aria-busy]", None),
        ])
    }

    #[test]
    fn targets_come_from_stylesheets() {
        let targets = WatchTargets::from_model(&model());
        assert_eq!(
            targets.media.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["(max-width: 768px)", "(prefers-color-scheme: dark)"]
        );
        assert_eq!(
            targets.attributes.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["class", "data-theme"]
        );
    }

    #[test]
    fn subscribes_per_query_and_filters_attributes() {
        let mut host = FakeHost::default();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);

        let mut watcher = RuntimeWatcher::new();
        watcher.start(
            &mut host,
            WatchTargets::from_model(&model()),
            Rc::new(move || counter.set(counter.get() + 1)),
        );
        assert_eq!(watcher.subscription_count(), 3);
        assert_eq!(host.media.len(), 2);

        (host.media[0].2)();
        assert_eq!(hits.get(), 1);

        let on_attr = Rc::clone(&host.observers[0].2);
        on_attr("style");
        assert_eq!(hits.get(), 1);
        on_attr("data-theme");
        on_attr("class");
        assert_eq!(hits.get(), 3);
    }

    #[test]
    fn stop_releases_everything() {
        let mut host = FakeHost::default();
        let mut watcher = RuntimeWatcher::new();
        watcher.start(&mut host, WatchTargets::from_model(&model()), Rc::new(|| {}));
        watcher.stop(&mut host);

        assert_eq!(watcher.subscription_count(), 0);
        let mut released = host.released.clone();
        released.sort();
        assert_eq!(released, vec![1, 2, 3]);
        assert!(watcher.targets().is_empty());
    }

    #[test]
    fn restart_replaces_subscriptions() {
        let mut host = FakeHost::default();
        let mut watcher = RuntimeWatcher::new();
        let targets = WatchTargets::from_model(&model());
        watcher.start(&mut host, targets.clone(), Rc::new(|| {}));
        watcher.start(&mut host, targets, Rc::new(|| {}));
        assert_eq!(host.released.len(), 3);
        assert_eq!(watcher.subscription_count(), 3);
    }

    #[test]
    fn zero_targets_is_noop() {
        let mut host = FakeHost::default();
        let fired = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&fired);
        let mut watcher = RuntimeWatcher::new();
        watcher.start(&mut host, WatchTargets::default(), Rc::new(move || *flag.borrow_mut() = true));
        assert_eq!(watcher.subscription_count(), 0);
        assert!(host.media.is_empty() && host.observers.is_empty());
        watcher.stop(&mut host);
        assert!(host.released.is_empty());
        assert!(!*fired.borrow());
    }
}
