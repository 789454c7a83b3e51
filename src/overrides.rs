//! Override stylesheet generator.
//!
//! Serializes the edit layers into CSS and writes it, whole, into the one
//! style element the engine owns. No incremental patching: edits arrive at
//! human speed.

use std::fmt::Write;

use log::debug;

use crate::model::ConditionKind;
use crate::store::{ChangeGroup, EditStore};

/// `id` of the style element the override CSS is written into.
pub const STYLE_ELEMENT_ID: &str = "dials-overrides";

/// The reserved style element. Created on first write, reused thereafter.
pub trait StyleSink {
    /// Replace the element's entire text content with `css`.
    fn write_style(&mut self, css: &str);
}

/// A sink that just keeps the text. Used by snapshots and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySink {
    pub css: String,
    pub writes: usize,
}

impl StyleSink for MemorySink {
    fn write_style(&mut self, css: &str) {
        self.css.clear();
        self.css.push_str(css);
        self.writes += 1;
    }
}

/// Render grouped changes as CSS: a `:root` block for the base group, then
/// one wrapped `:root` block per conditional group, separated by a blank
/// line.
pub fn render_groups(groups: &[ChangeGroup]) -> String {
    let mut blocks = Vec::with_capacity(groups.len());
    for group in groups.iter().filter(|g| !g.entries.is_empty()) {
        let mut body = String::from(":root {\n");
        for entry in &group.entries {
            let _ = writeln!(body, "  {}: {};", entry.name, entry.value);
        }
        body.push('}');

        let block = match &group.condition {
            None => body,
            Some(cond) => format!("@{} {} {{ {body} }}", wrapper(cond.kind), cond.text),
        };
        blocks.push(block);
    }
    blocks.join("\n\n")
}

/// At-rule an edit group is wrapped in. `:root` never has a container
/// ancestor, so container edits fall back to a viewport media query.
fn wrapper(kind: ConditionKind) -> &'static str {
    match kind {
        ConditionKind::Container => ConditionKind::Media.at_rule(),
        other => other.at_rule(),
    }
}

/// Render the store's current edits. Empty when nothing is edited.
pub fn render(store: &EditStore) -> String {
    render_groups(&store.changed_entries())
}

/// Write the store's edits into `sink`, replacing whatever it held.
pub fn sync(store: &EditStore, sink: &mut dyn StyleSink) -> String {
    let css = render(store);
    debug!("override sheet regenerated ({} bytes)", css.len());
    sink.write_style(&css);
    css
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::Viewport;
    use crate::model::{Condition, ConditionKind, VariableSet};
    use crate::scanner::Declared;

    fn store() -> EditStore {
        let decl = |value: &str, condition: Option<Condition>| Declared {
            property: "--gap".into(),
            value: value.into(),
            selector: ":root".into(),
            condition,
        };
        let model = VariableSet::build(vec![
            decl("8px", None),
            decl("4px", Some(Condition::media("(max-width: 768px)"))),
            decl("1px", Some(Condition::new(ConditionKind::Supports, "(gap: 1px)"))),
            decl("6px", Some(Condition::new(ConditionKind::Container, "(min-width: 400px)"))),
        ]);
        let mut store = EditStore::new();
        store.set_original_values(model.original_values());
        store.set_model(model);
        store
    }

    #[test]
    fn no_edits_renders_empty() {
        assert_eq!(render(&store()), "");
    }

    #[test]
    fn media_edit_renders_wrapped_root() {
        let mut s = store();
        s.set_contextual_value("--gap", "2px", None, None, &Viewport::sized(375.0, 812.0));
        assert_eq!(
            render(&s),
            "@media (max-width: 768px) { :root {\n  --gap: 2px;\n} }"
        );
    }

    #[test]
    fn base_block_comes_first() {
        let mut s = store();
        s.set_contextual_value("--gap", "2px", None, None, &Viewport::sized(375.0, 812.0));
        s.set_base_value("--gap", "10px");
        s.set_base_value("--accent", "red");

        let css = render(&s);
        assert_eq!(
            css,
            ":root {\n  --accent: red;\n  --gap: 10px;\n}\n\n\
             @media (max-width: 768px) { :root {\n  --gap: 2px;\n} }"
        );
    }

    #[test]
    fn non_media_kinds_use_their_at_rule() {
        let mut s = store();
        s.set_contextual_value("--gap", "3px", None, Some("(gap: 1px)"), &Viewport::default());
        assert_eq!(render(&s), "@supports (gap: 1px) { :root {\n  --gap: 3px;\n} }");
    }

    #[test]
    fn container_edit_falls_back_to_media() {
        let mut s = store();
        s.set_contextual_value("--gap", "5px", None, Some("(min-width: 400px)"), &Viewport::default());
        assert_eq!(render(&s), "@media (min-width: 400px) { :root {\n  --gap: 5px;\n} }");
        assert_eq!(s.changed_entries()[0].display_name, "@container (min-width: 400px)");
    }

    #[test]
    fn sync_replaces_sink_content() {
        let mut s = store();
        let mut sink = MemorySink::default();
        s.set_base_value("--gap", "10px");
        sync(&s, &mut sink);
        assert!(sink.css.starts_with(":root {"));

        s.reset_all();
        sync(&s, &mut sink);
        assert_eq!(sink.css, "");
        assert_eq!(sink.writes, 2);
    }
}
