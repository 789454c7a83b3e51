//! A host backed by a stylesheet snapshot and a described viewport.
//!
//! Used by the CLI and by tests that drive a full [`Engine`]. Subscriptions
//! are recorded rather than wired to anything; [`SnapshotHost::set_viewport`]
//! fires the media listeners whose result flipped, the way `matchMedia`
//! change events would.
//!
//! [`Engine`]: crate::engine::Engine

use std::collections::BTreeMap;

use crate::error::Result;
use crate::media::Viewport;
use crate::overrides::{MemorySink, StyleSink};
use crate::resolver::Environment;
use crate::sheet::{CssRule, Snapshot, StyleSource};
use crate::watcher::{AttributeNotify, EnvironmentHost, Notify};

enum Listener {
    Media { query: String, notify: Notify },
    Attributes { names: Vec<String>, notify: AttributeNotify },
}

#[derive(Default)]
pub struct SnapshotHost {
    snapshot: Snapshot,
    viewport: Viewport,
    sink: MemorySink,
    next_id: u32,
    listeners: BTreeMap<u32, Listener>,
}

impl SnapshotHost {
    pub fn new(snapshot: Snapshot, viewport: Viewport) -> Self {
        Self {
            snapshot,
            viewport,
            ..Self::default()
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Swap in a fresh capture. The engine picks it up on its next rescan.
    pub fn replace_snapshot(&mut self, snapshot: Snapshot) {
        self.snapshot = snapshot;
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Change the environment, notifying listeners of queries that flipped.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        let flipped: Vec<Notify> = self
            .listeners
            .values()
            .filter_map(|l| match l {
                Listener::Media { query, notify }
                    if self.viewport.matches(query) != viewport.matches(query) =>
                {
                    Some(notify.clone())
                }
                _ => None,
            })
            .collect();
        self.viewport = viewport;
        for notify in flipped {
            notify();
        }
    }

    /// Simulate a root-element attribute mutation.
    pub fn mutate_root_attribute(&self, name: &str) {
        for listener in self.listeners.values() {
            if let Listener::Attributes { names, notify } = listener {
                if names.iter().any(|n| n == name) {
                    notify(name);
                }
            }
        }
    }

    /// Text currently in the override style element.
    pub fn style_text(&self) -> &str {
        &self.sink.css
    }

    pub fn style_writes(&self) -> usize {
        self.sink.writes
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Media queries with a live listener, in subscription order.
    pub fn watched_queries(&self) -> Vec<&str> {
        self.listeners
            .values()
            .filter_map(|l| match l {
                Listener::Media { query, .. } => Some(query.as_str()),
                Listener::Attributes { .. } => None,
            })
            .collect()
    }

    pub fn watched_attributes(&self) -> Vec<&str> {
        self.listeners
            .values()
            .flat_map(|l| match l {
                Listener::Attributes { names, .. } => names.iter().map(String::as_str).collect(),
                Listener::Media { .. } => Vec::new(),
            })
            .collect()
    }

    fn register(&mut self, listener: Listener) -> u32 {
        self.next_id += 1;
        self.listeners.insert(self.next_id, listener);
        self.next_id
    }
}

impl StyleSource for SnapshotHost {
    fn sheet_count(&self) -> usize {
        self.snapshot.sheet_count()
    }

    fn read_sheet(&self, index: usize) -> Result<Vec<CssRule>> {
        self.snapshot.read_sheet(index)
    }
}

impl Environment for SnapshotHost {
    fn matches_media(&self, query: &str) -> bool {
        self.viewport.matches(query)
    }
}

impl StyleSink for SnapshotHost {
    fn write_style(&mut self, css: &str) {
        self.sink.write_style(css);
    }
}

impl EnvironmentHost for SnapshotHost {
    type Subscription = u32;

    fn subscribe_media(&mut self, query: &str, notify: Notify) -> u32 {
        self.register(Listener::Media {
            query: query.to_string(),
            notify,
        })
    }

    fn observe_root_attributes(&mut self, attributes: &[String], notify: AttributeNotify) -> u32 {
        self.register(Listener::Attributes {
            names: attributes.to_vec(),
            notify,
        })
    }

    fn unsubscribe(&mut self, id: u32) {
        self.listeners.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    use crate::engine::Engine;
    use crate::sheet::StyleSheet;

    fn host() -> SnapshotHost {
        let rules = vec![
            CssRule::style(":root", &[("--gap", "8px")]),
            CssRule::style("[data-theme=\"dense\"]", &[("--gap", "6px")]),
            CssRule::media(
                "(max-width: 768px)",
                vec![CssRule::style(":root", &[("--gap", "4px")])],
            ),
        ];
        SnapshotHost::new(Snapshot::new(vec![StyleSheet::inline(rules)]), Viewport::default())
    }

    #[test]
    fn viewport_change_fires_flipped_queries_only() {
        let fired = Rc::new(Cell::new(0));
        let counter = Rc::clone(&fired);
        let mut engine = Engine::new(host());
        engine.init(Rc::new(move || counter.set(counter.get() + 1)));

        assert_eq!(engine.host().watched_queries(), vec!["(max-width: 768px)"]);
        assert_eq!(engine.host().watched_attributes(), vec!["data-theme"]);

        engine.host_mut().set_viewport(Viewport::sized(1024.0, 768.0));
        assert_eq!(fired.get(), 0);
        engine.host_mut().set_viewport(Viewport::sized(375.0, 812.0));
        assert_eq!(fired.get(), 1);
        assert_eq!(engine.active_context("--gap").unwrap().value, "4px");

        engine.host().mutate_root_attribute("style");
        assert_eq!(fired.get(), 1);
        engine.host().mutate_root_attribute("data-theme");
        assert_eq!(fired.get(), 2);
    }

    #[test]
    fn dispose_removes_all_listeners() {
        let mut engine = Engine::new(host());
        engine.init(Rc::new(|| {}));
        assert_eq!(engine.host().listener_count(), 2);
        engine.set_base_value("--gap", "9px");
        assert!(engine.host().style_text().contains("--gap: 9px;"));

        engine.dispose();
        assert_eq!(engine.host().listener_count(), 0);
        assert_eq!(engine.host().style_text(), "");
    }
}
