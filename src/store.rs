//! Edit store. The detected model, original values and the two edit layers.
//!
//! Base edits apply to the root context; contextual edits are keyed by
//! variable name and context key (condition text or `"base"`). Originals are
//! captured at detection time and are never touched by edits.

use std::collections::BTreeMap;

use log::debug;
use serde::Serialize;

use crate::model::{Condition, ConditionKind, Context, ContextualVariable, VariableSet, BASE_KEY};
use crate::resolver::{self, Environment};

/// One edited variable within a [`ChangeGroup`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangedEntry {
    pub name: String,
    pub value: String,
    /// Value before editing, when one was recorded.
    pub original: Option<String>,
}

/// All edits that share one context key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeGroup {
    pub key: String,
    pub display_name: String,
    /// `None` for the base group.
    pub condition: Option<Condition>,
    pub entries: Vec<ChangedEntry>,
}

impl ChangeGroup {
    pub fn is_base(&self) -> bool {
        self.key == BASE_KEY
    }
}

/// Human-readable label for a context key.
pub fn context_label(key: &str, kind: Option<ConditionKind>) -> String {
    if key == BASE_KEY {
        return "Base".to_string();
    }
    let text = key.trim();
    let text = match text.get(..4) {
        Some(head) if head.eq_ignore_ascii_case("and ") => &text[4..],
        _ => text,
    };
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match kind {
        None | Some(ConditionKind::Media) => text,
        Some(kind) => format!("@{} {text}", kind.at_rule()),
    }
}

#[derive(Debug, Clone, Default)]
pub struct EditStore {
    model: VariableSet,
    original_values: BTreeMap<String, String>,
    base_edits: BTreeMap<String, String>,
    contextual_edits: BTreeMap<String, BTreeMap<String, String>>,
}

impl EditStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Detection results ──────────────────────────────────────────────

    /// Replace the detected model. Edits are kept.
    pub fn set_model(&mut self, model: VariableSet) {
        self.model = model;
    }

    pub fn set_original_values(&mut self, originals: BTreeMap<String, String>) {
        self.original_values = originals;
    }

    pub fn model(&self) -> &VariableSet {
        &self.model
    }

    pub fn variable(&self, name: &str) -> Option<&ContextualVariable> {
        self.model.get(name)
    }

    pub fn original_value(&self, name: &str) -> Option<&str> {
        self.original_values.get(name).map(String::as_str)
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub fn is_user_changed(&self, name: &str) -> bool {
        self.base_edits.contains_key(name)
            || self
                .contextual_edits
                .get(name)
                .is_some_and(|edits| !edits.is_empty())
    }

    pub fn has_edits(&self) -> bool {
        !self.base_edits.is_empty() || self.contextual_edits.values().any(|e| !e.is_empty())
    }

    /// Value shown in the flat editor: the base edit, else the original.
    pub fn displayed_value(&self, name: &str) -> Option<&str> {
        self.base_edits
            .get(name)
            .map(String::as_str)
            .or_else(|| self.original_value(name))
    }

    /// Value shown for one context: its edit, else the authored value.
    pub fn value_for(&self, name: &str, key: &str) -> Option<&str> {
        if let Some(edited) = self.contextual_edits.get(name).and_then(|e| e.get(key)) {
            return Some(edited);
        }
        self.model
            .get(name)?
            .context_for_key(key)
            .map(|c| c.value.as_str())
    }

    /// Key of the context the resolver currently picks for `name`.
    pub fn active_context_key(&self, name: &str, env: &dyn Environment) -> Option<String> {
        let variable = self.model.get(name)?;
        resolver::active_context(variable, env).map(|c| c.key().to_string())
    }

    pub fn base_edits(&self) -> &BTreeMap<String, String> {
        &self.base_edits
    }

    pub fn contextual_edits(&self) -> &BTreeMap<String, BTreeMap<String, String>> {
        &self.contextual_edits
    }

    // ── Mutations ──────────────────────────────────────────────────────

    pub fn set_base_value(&mut self, name: &str, value: &str) {
        debug!("base edit {name} = {value}");
        self.base_edits.insert(name.to_string(), value.to_string());
    }

    /// Record a contextual edit and return the context key it landed on.
    ///
    /// Target resolution order: `explicit`, then `key_override` (`"base"`
    /// is the unconditional context), then the currently active context.
    /// Returns `None` without touching any state when nothing resolves.
    pub fn set_contextual_value(
        &mut self,
        name: &str,
        value: &str,
        explicit: Option<&Context>,
        key_override: Option<&str>,
        env: &dyn Environment,
    ) -> Option<String> {
        let key = match explicit {
            Some(context) => context.key().to_string(),
            None => {
                let variable = self.model.get(name)?;
                let context = match key_override {
                    Some(key) => variable.context_for_key(key),
                    None => resolver::active_context(variable, env),
                };
                match context {
                    Some(c) => c.key().to_string(),
                    None => {
                        debug!("no context resolved for {name}; edit ignored");
                        return None;
                    }
                }
            }
        };

        debug!("contextual edit {name} [{key}] = {value}");
        self.contextual_edits
            .entry(name.to_string())
            .or_default()
            .insert(key.clone(), value.to_string());
        Some(key)
    }

    /// Drop every edit of `name`. No-op without a recorded original.
    pub fn reset_one(&mut self, name: &str) -> bool {
        if !self.original_values.contains_key(name) {
            return false;
        }
        let had_base = self.base_edits.remove(name).is_some();
        let had_contextual = self.contextual_edits.remove(name).is_some();
        had_base || had_contextual
    }

    pub fn reset_all(&mut self) {
        self.base_edits.clear();
        self.contextual_edits.clear();
    }

    // ── Export view ────────────────────────────────────────────────────

    /// Current edits grouped by context key, `"base"` first, then the
    /// remaining keys in lexical order. Entries are sorted by name.
    pub fn changed_entries(&self) -> Vec<ChangeGroup> {
        let mut grouped: BTreeMap<&str, BTreeMap<&str, &str>> = BTreeMap::new();

        for (name, value) in &self.base_edits {
            let shadowed = self
                .contextual_edits
                .get(name)
                .is_some_and(|e| e.contains_key(BASE_KEY));
            if !shadowed {
                grouped.entry(BASE_KEY).or_default().insert(name, value);
            }
        }
        for (name, edits) in &self.contextual_edits {
            for (key, value) in edits {
                grouped.entry(key).or_default().insert(name, value);
            }
        }

        let base = grouped.remove(BASE_KEY);
        base.map(|entries| (BASE_KEY, entries))
            .into_iter()
            .chain(grouped)
            .map(|(key, entries)| {
                let condition = (key != BASE_KEY).then(|| {
                    let kind = self.model.condition_kind(key).unwrap_or(ConditionKind::Media);
                    Condition::new(kind, key)
                });
                ChangeGroup {
                    key: key.to_string(),
                    display_name: context_label(key, condition.as_ref().map(|c| c.kind)),
                    condition,
                    entries: entries
                        .into_iter()
                        .map(|(name, value)| ChangedEntry {
                            name: name.to_string(),
                            value: value.to_string(),
                            original: self.original_for(name, key),
                        })
                        .collect(),
                }
            })
            .collect()
    }

    fn original_for(&self, name: &str, key: &str) -> Option<String> {
        if key == BASE_KEY {
            return self.original_value(name).map(str::to_string);
        }
        self.model
            .get(name)
            .and_then(|v| v.context_for_key(key))
            .map(|c| c.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::Viewport;
    use crate::scanner::Declared;

    const MOBILE: &str = "(max-width: 768px)";

    fn store() -> EditStore {
        let model = VariableSet::build(vec![
            Declared {
                property: "--gap".into(),
                value: "8px".into(),
                selector: ":root".into(),
                condition: None,
            },
            Declared {
                property: "--gap".into(),
                value: "4px".into(),
                selector: ":root".into(),
                condition: Some(Condition::media(MOBILE)),
            },
            Declared {
                property: "--radius".into(),
                value: "4px".into(),
                selector: ":root".into(),
                condition: None,
            },
        ]);
        let mut store = EditStore::new();
        store.set_original_values(model.original_values());
        store.set_model(model);
        store
    }

    #[test]
    fn base_edit_and_reset_round_trip() {
        let mut s = store();
        s.set_base_value("--radius", "12px");
        assert!(s.is_user_changed("--radius"));
        assert_eq!(s.displayed_value("--radius"), Some("12px"));
        assert_eq!(s.original_value("--radius"), Some("4px"));

        assert!(s.reset_one("--radius"));
        assert!(!s.is_user_changed("--radius"));
        assert_eq!(s.displayed_value("--radius"), Some("4px"));
    }

    #[test]
    fn contextual_edit_targets_active_context() {
        let mut s = store();
        let phone = Viewport::sized(375.0, 812.0);
        let key = s.set_contextual_value("--gap", "2px", None, None, &phone);
        assert_eq!(key.as_deref(), Some(MOBILE));
        assert_eq!(s.contextual_edits()["--gap"][MOBILE], "2px");
        assert_eq!(s.value_for("--gap", MOBILE), Some("2px"));
        assert_eq!(s.value_for("--gap", "base"), Some("8px"));
    }

    #[test]
    fn override_key_selects_context() {
        let mut s = store();
        let phone = Viewport::sized(375.0, 812.0);
        let key = s.set_contextual_value("--gap", "10px", None, Some("base"), &phone);
        assert_eq!(key.as_deref(), Some("base"));

        let missing = s.set_contextual_value("--gap", "1px", None, Some("(min-width: 9999px)"), &phone);
        assert!(missing.is_none());
        assert_eq!(s.contextual_edits()["--gap"].len(), 1);
    }

    #[test]
    fn explicit_context_wins() {
        let mut s = store();
        let ctx = s.variable("--gap").unwrap().contexts[1].clone();
        let key = s.set_contextual_value("--gap", "3px", Some(&ctx), Some("base"), &Viewport::default());
        assert_eq!(key.as_deref(), Some(MOBILE));
    }

    #[test]
    fn unresolvable_edit_is_noop() {
        let mut s = store();
        assert!(s.set_contextual_value("--missing", "1px", None, None, &Viewport::default()).is_none());
        assert!(!s.has_edits());
    }

    #[test]
    fn reset_without_original_is_noop() {
        let mut s = store();
        s.set_base_value("--unknown", "1px");
        assert!(!s.reset_one("--unknown"));
        assert!(s.is_user_changed("--unknown"));
    }

    #[test]
    fn reset_all_clears_both_layers() {
        let mut s = store();
        s.set_base_value("--radius", "12px");
        s.set_contextual_value("--gap", "2px", None, None, &Viewport::sized(375.0, 812.0));
        s.reset_all();
        assert!(!s.is_user_changed("--radius"));
        assert!(!s.is_user_changed("--gap"));
        assert!(s.changed_entries().is_empty());
    }

    #[test]
    fn changed_entries_group_base_first() {
        let mut s = store();
        s.set_contextual_value("--gap", "2px", None, None, &Viewport::sized(375.0, 812.0));
        s.set_base_value("--radius", "12px");

        let groups = s.changed_entries();
        assert_eq!(groups.len(), 2);
        assert!(groups[0].is_base());
        assert_eq!(groups[0].display_name, "Base");
        assert_eq!(groups[0].entries[0].name, "--radius");
        assert_eq!(groups[0].entries[0].original.as_deref(), Some("4px"));

        assert_eq!(groups[1].key, MOBILE);
        assert_eq!(groups[1].condition, Some(Condition::media(MOBILE)));
        assert_eq!(groups[1].entries[0].value, "2px");
        assert_eq!(groups[1].entries[0].original.as_deref(), Some("4px"));
    }

    #[test]
    fn contextual_base_edit_shadows_base_layer() {
        let mut s = store();
        s.set_base_value("--gap", "9px");
        s.set_contextual_value("--gap", "7px", None, Some("base"), &Viewport::default());

        let groups = s.changed_entries();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].entries.len(), 1);
        assert_eq!(groups[0].entries[0].value, "7px");
    }

    #[test]
    fn shared_condition_reports_the_edited_declaration() {
        const DARK: &str = "(prefers-color-scheme: dark)";
        let decl = |selector: &str, value: &str, condition: Option<&str>| Declared {
            property: "--bg".into(),
            value: value.into(),
            selector: selector.into(),
            condition: condition.map(Condition::media),
        };
        let model = VariableSet::build(vec![
            decl(":root", "#fff", None),
            decl(":root", "#000", Some(DARK)),
            decl(".card", "#111", Some(DARK)),
        ]);
        let mut s = EditStore::new();
        s.set_original_values(model.original_values());
        s.set_model(model);

        let dark = Viewport::default().dark();
        let key = s.active_context_key("--bg", &dark).unwrap();
        assert_eq!(key, DARK);
        assert_eq!(s.value_for("--bg", &key), Some("#000"));

        s.set_contextual_value("--bg", "#222", None, None, &dark);
        let groups = s.changed_entries();
        assert_eq!(groups[0].entries[0].value, "#222");
        assert_eq!(groups[0].entries[0].original.as_deref(), Some("#000"));
    }

    #[test]
    fn labels() {
        assert_eq!(context_label("base", None), "Base");
        assert_eq!(context_label("and  (max-width:  768px)", None), "(max-width: 768px)");
        assert_eq!(
            context_label("(display: grid)", Some(ConditionKind::Supports)),
            "@supports (display: grid)"
        );
    }
}
