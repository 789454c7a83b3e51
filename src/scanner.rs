//! Stylesheet scanner. Walks every readable stylesheet and yields each
//! custom property declaration with its selector and enclosing condition.

use log::{debug, trace};

use crate::model::{Condition, ConditionKind};
use crate::sheet::{CssRule, StyleSource};

/// One custom property declaration site, in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct Declared {
    pub property: String,
    pub value: String,
    pub selector: String,
    pub condition: Option<Condition>,
}

/// Counters from one scan, for logging and the CLI summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub sheets: usize,
    pub skipped_sheets: usize,
    pub style_rules: usize,
    pub declarations: usize,
}

/// Scan all stylesheets of `source`.
///
/// Unreadable sheets are skipped; the document is never mutated.
pub fn scan(source: &dyn StyleSource) -> (Vec<Declared>, ScanStats) {
    let mut out = Vec::new();
    let mut stats = ScanStats {
        sheets: source.sheet_count(),
        ..ScanStats::default()
    };
    debug!("scanning {} stylesheets", stats.sheets);

    for index in 0..stats.sheets {
        match source.read_sheet(index) {
            Ok(rules) => {
                debug!("stylesheet {index}: {} rules", rules.len());
                walk(&rules, None, &mut out, &mut stats);
            }
            Err(e) => {
                debug!("stylesheet {index} skipped: {e}");
                stats.skipped_sheets += 1;
            }
        }
    }

    stats.declarations = out.len();
    (out, stats)
}

fn walk(
    rules: &[CssRule],
    parent: Option<&Condition>,
    out: &mut Vec<Declared>,
    stats: &mut ScanStats,
) {
    for rule in rules {
        match rule {
            CssRule::Style {
                selector,
                declarations,
            } => {
                stats.style_rules += 1;
                for decl in declarations.iter().filter(|d| d.is_custom_property()) {
                    trace!(
                        "found {} = {} in {selector}{}",
                        decl.property,
                        decl.value.trim(),
                        parent.map(|c| format!(" ({c})")).unwrap_or_default()
                    );
                    out.push(Declared {
                        property: decl.property.clone(),
                        value: decl.value.trim().to_string(),
                        selector: selector.trim().to_string(),
                        condition: parent.cloned(),
                    });
                }
            }
            // The innermost conditional container replaces the parent
            // condition; conditions are not composed.
            CssRule::Media { condition, rules } => {
                let cond = Condition::new(ConditionKind::Media, condition);
                walk(rules, Some(&cond), out, stats);
            }
            CssRule::Supports { condition, rules } => {
                let cond = Condition::new(ConditionKind::Supports, condition);
                walk(rules, Some(&cond), out, stats);
            }
            CssRule::Container { condition, rules } => {
                let cond = Condition::new(ConditionKind::Container, condition);
                walk(rules, Some(&cond), out, stats);
            }
            CssRule::Layer { name, rules } if !name.trim().is_empty() => {
                let cond = Condition::new(ConditionKind::Layer, name);
                walk(rules, Some(&cond), out, stats);
            }
            // Anonymous layers and other groups are transparent.
            CssRule::Layer { rules, .. } | CssRule::Group { rules } => {
                walk(rules, parent, out, stats);
            }
            CssRule::Opaque => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::{Snapshot, StyleSheet};

    #[test]
    fn collects_only_custom_properties() {
        let snapshot = Snapshot::new(vec![StyleSheet::inline(vec![CssRule::style(
            ":root",
            &[("--gap", " 8px "), ("color", "red"), ("--radius", "4px")],
        )])]);

        let (decls, stats) = scan(&snapshot);
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].property, "--gap");
        assert_eq!(decls[0].value, "8px");
        assert_eq!(decls[1].property, "--radius");
        assert!(decls.iter().all(|d| d.condition.is_none()));
        assert_eq!(stats.style_rules, 1);
        assert_eq!(stats.declarations, 2);
    }

    #[test]
    fn media_condition_is_carried() {
        let snapshot = Snapshot::new(vec![StyleSheet::inline(vec![CssRule::media(
            "(max-width: 768px)",
            vec![CssRule::style(":root", &[("--gap", "4px")])],
        )])]);

        let (decls, _) = scan(&snapshot);
        let cond = decls[0].condition.as_ref().expect("condition");
        assert_eq!(cond.kind, ConditionKind::Media);
        assert_eq!(cond.text, "(max-width: 768px)");
    }

    #[test]
    fn innermost_condition_wins() {
        let snapshot = Snapshot::new(vec![StyleSheet::inline(vec![CssRule::media(
            "screen",
            vec![CssRule::supports(
                "(display: grid)",
                vec![CssRule::style(":root", &[("--cols", "3")])],
            )],
        )])]);

        let (decls, _) = scan(&snapshot);
        let cond = decls[0].condition.as_ref().unwrap();
        assert_eq!(cond.kind, ConditionKind::Supports);
        assert_eq!(cond.text, "(display: grid)");
    }

    #[test]
    fn groups_pass_parent_condition_through() {
        let snapshot = Snapshot::new(vec![StyleSheet::inline(vec![CssRule::media(
            "(prefers-color-scheme: dark)",
            vec![
                CssRule::Group {
                    rules: vec![CssRule::style(":root", &[("--bg", "#000")])],
                },
                CssRule::Layer {
                    name: String::new(),
                    rules: vec![CssRule::style(":root", &[("--fg", "#fff")])],
                },
            ],
        )])]);

        let (decls, _) = scan(&snapshot);
        assert_eq!(decls.len(), 2);
        for d in &decls {
            assert_eq!(
                d.condition.as_ref().map(|c| c.text.as_str()),
                Some("(prefers-color-scheme: dark)")
            );
        }
    }

    #[test]
    fn named_layer_is_recorded() {
        let snapshot = Snapshot::new(vec![StyleSheet::inline(vec![CssRule::Layer {
            name: "tokens".into(),
            rules: vec![CssRule::style(":root", &[("--gap", "2px")])],
        }])]);

        let (decls, _) = scan(&snapshot);
        let cond = decls[0].condition.as_ref().unwrap();
        assert_eq!(cond.kind, ConditionKind::Layer);
        assert_eq!(cond.text, "tokens");
    }

    #[test]
    fn unreadable_sheets_are_skipped() {
        let snapshot = Snapshot::new(vec![
            StyleSheet::cross_origin("https://cdn.example.com/a.css"),
            StyleSheet::inline(vec![CssRule::style(":root", &[("--gap", "8px")])]),
        ]);

        let (decls, stats) = scan(&snapshot);
        assert_eq!(decls.len(), 1);
        assert_eq!(stats.sheets, 2);
        assert_eq!(stats.skipped_sheets, 1);
    }
}
