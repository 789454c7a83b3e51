//! Export formats built from [`EditStore::changed_entries`].
//!
//! [`EditStore::changed_entries`]: crate::store::EditStore::changed_entries

use serde_json::{Map, Value};

use crate::overrides;
use crate::store::ChangeGroup;

/// Export format for changed variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Css,
    Json,
}

/// `name: value;` for copying a single variable.
pub fn declaration(name: &str, value: &str) -> String {
    format!("{name}: {value};")
}

/// Same layout as the live override sheet.
pub fn to_css(groups: &[ChangeGroup]) -> String {
    overrides::render_groups(groups)
}

/// `{ "<context display name>": { "<name>": "<value>" } }`
pub fn to_json_value(groups: &[ChangeGroup]) -> Value {
    let mut root = Map::new();
    for group in groups.iter().filter(|g| !g.entries.is_empty()) {
        let vars: Map<String, Value> = group
            .entries
            .iter()
            .map(|e| (e.name.clone(), Value::String(e.value.clone())))
            .collect();
        root.insert(group.display_name.clone(), Value::Object(vars));
    }
    Value::Object(root)
}

pub fn to_json(groups: &[ChangeGroup]) -> String {
    serde_json::to_string_pretty(&to_json_value(groups)).unwrap_or_else(|_| "{}".to_string())
}

pub fn export(groups: &[ChangeGroup], format: ExportFormat) -> String {
    match format {
        ExportFormat::Css => to_css(groups),
        ExportFormat::Json => to_json(groups),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Condition;
    use crate::store::ChangedEntry;

    fn groups() -> Vec<ChangeGroup> {
        vec![
            ChangeGroup {
                key: "base".into(),
                display_name: "Base".into(),
                condition: None,
                entries: vec![ChangedEntry {
                    name: "--radius".into(),
                    value: "12px".into(),
                    original: Some("4px".into()),
                }],
            },
            ChangeGroup {
                key: "(max-width: 768px)".into(),
                display_name: "(max-width: 768px)".into(),
                condition: Some(Condition::media("(max-width: 768px)")),
                entries: vec![ChangedEntry {
                    name: "--gap".into(),
                    value: "2px".into(),
                    original: Some("4px".into()),
                }],
            },
        ]
    }

    #[test]
    fn css_export_orders_base_first() {
        let css = to_css(&groups());
        let root = css.find(":root {\n  --radius: 12px;\n}").expect("base block");
        let media = css
            .find("@media (max-width: 768px) { :root {\n  --gap: 2px;\n} }")
            .expect("media block");
        assert!(root < media);
        assert!(css.contains("}\n\n@media"));
    }

    #[test]
    fn json_export_keys_by_display_name() {
        let value = to_json_value(&groups());
        assert_eq!(value["Base"]["--radius"], "12px");
        assert_eq!(value["(max-width: 768px)"]["--gap"], "2px");
        assert_eq!(value.as_object().unwrap().len(), 2);
    }

    #[test]
    fn single_declaration() {
        assert_eq!(declaration("--gap", "8px"), "--gap: 8px;");
    }

    #[test]
    fn empty_export() {
        assert_eq!(export(&[], ExportFormat::Css), "");
        assert_eq!(export(&[], ExportFormat::Json), "{}");
    }
}
