//! Host stylesheet object model.
//!
//! The engine never parses CSS text. It walks rules the host has already
//! parsed, presented either live through [`StyleSource`] or as a serialized
//! [`Snapshot`] captured from `document.styleSheets`.
//!
//! Rule objects are classified once into [`CssRule`] variants so traversal
//! can dispatch on a tag instead of type-testing host rule classes.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DialsError, Result};

/// A single `property: value` pair from a style rule's declaration block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub property: String,
    pub value: String,
}

impl Declaration {
    pub fn new(property: &str, value: &str) -> Self {
        Self {
            property: property.to_string(),
            value: value.to_string(),
        }
    }

    /// Custom properties start with the two-character `--` prefix.
    pub fn is_custom_property(&self) -> bool {
        self.property.starts_with("--")
    }
}

/// A classified rule node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CssRule {
    /// Declaration-bearing rule: `selector { declarations }`.
    Style {
        selector: String,
        #[serde(default)]
        declarations: Vec<Declaration>,
    },
    /// `@media <condition> { rules }`
    Media {
        condition: String,
        #[serde(default)]
        rules: Vec<CssRule>,
    },
    /// `@supports <condition> { rules }`
    Supports {
        condition: String,
        #[serde(default)]
        rules: Vec<CssRule>,
    },
    /// `@container <condition> { rules }`
    Container {
        condition: String,
        #[serde(default)]
        rules: Vec<CssRule>,
    },
    /// `@layer <name> { rules }`
    Layer {
        #[serde(default)]
        name: String,
        #[serde(default)]
        rules: Vec<CssRule>,
    },
    /// Any other rule exposing nested rules (`@document`, `@scope`, ...).
    Group {
        #[serde(default)]
        rules: Vec<CssRule>,
    },
    /// Rules with nothing to descend into, or that the host could not read.
    #[serde(other)]
    Opaque,
}

impl CssRule {
    pub fn style(selector: &str, declarations: &[(&str, &str)]) -> Self {
        CssRule::Style {
            selector: selector.to_string(),
            declarations: declarations
                .iter()
                .map(|(p, v)| Declaration::new(p, v))
                .collect(),
        }
    }

    pub fn media(condition: &str, rules: Vec<CssRule>) -> Self {
        CssRule::Media {
            condition: condition.to_string(),
            rules,
        }
    }

    pub fn supports(condition: &str, rules: Vec<CssRule>) -> Self {
        CssRule::Supports {
            condition: condition.to_string(),
            rules,
        }
    }
}

/// One entry of `document.styleSheets`.
///
/// `rules` is `None` when reading `cssRules` threw (cross-origin sheets).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleSheet {
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub rules: Option<Vec<CssRule>>,
}

impl StyleSheet {
    pub fn inline(rules: Vec<CssRule>) -> Self {
        Self {
            href: None,
            rules: Some(rules),
        }
    }

    pub fn cross_origin(href: &str) -> Self {
        Self {
            href: Some(href.to_string()),
            rules: None,
        }
    }
}

/// Anything that can hand the scanner the document's stylesheets.
pub trait StyleSource {
    /// Number of stylesheets currently attached to the document.
    fn sheet_count(&self) -> usize;

    /// Read the rule list of sheet `index`.
    ///
    /// Inaccessible sheets report [`DialsError::SheetUnreadable`]; the scanner
    /// skips them.
    fn read_sheet(&self, index: usize) -> Result<Vec<CssRule>>;
}

/// A serialized capture of the document's stylesheet list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub sheets: Vec<StyleSheet>,
}

impl Snapshot {
    pub fn new(sheets: Vec<StyleSheet>) -> Self {
        Self { sheets }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| DialsError::io(path, e))?;
        Self::from_json(&json)
    }
}

impl StyleSource for Snapshot {
    fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    fn read_sheet(&self, index: usize) -> Result<Vec<CssRule>> {
        let sheet = self
            .sheets
            .get(index)
            .ok_or_else(|| DialsError::host(&format!("no stylesheet at index {index}")))?;
        sheet
            .rules
            .clone()
            .ok_or_else(|| DialsError::unreadable(index, sheet.href.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_decodes_tagged_rules() {
        let json = r#"{
            "sheets": [
                { "href": null, "rules": [
                    { "type": "style", "selector": ":root",
                      "declarations": [{ "property": "--gap", "value": "8px" }] },
                    { "type": "media", "condition": "(max-width: 768px)", "rules": [
                        { "type": "style", "selector": ":root",
                          "declarations": [{ "property": "--gap", "value": "4px" }] }
                    ] },
                    { "type": "font-face" }
                ] },
                { "href": "https://fonts.example.com/a.css", "rules": null }
            ]
        }"#;

        let snapshot = Snapshot::from_json(json).expect("snapshot should decode");
        assert_eq!(snapshot.sheet_count(), 2);

        let rules = snapshot.read_sheet(0).unwrap();
        assert_eq!(rules.len(), 3);
        assert!(matches!(&rules[0], CssRule::Style { selector, .. } if selector == ":root"));
        assert!(matches!(&rules[1], CssRule::Media { condition, rules } if condition == "(max-width: 768px)" && rules.len() == 1));
        assert_eq!(rules[2], CssRule::Opaque);
    }

    #[test]
    fn cross_origin_sheet_is_unreadable() {
        let snapshot = Snapshot::new(vec![StyleSheet::cross_origin("https://cdn.example.com/x.css")]);
        let err = snapshot.read_sheet(0).unwrap_err();
        assert!(matches!(err, DialsError::SheetUnreadable { index: 0, .. }));
    }

    #[test]
    fn out_of_range_sheet_is_host_error() {
        let snapshot = Snapshot::default();
        assert!(matches!(snapshot.read_sheet(3), Err(DialsError::Host(_))));
    }

    #[test]
    fn custom_property_prefix() {
        assert!(Declaration::new("--gap", "8px").is_custom_property());
        assert!(!Declaration::new("gap", "8px").is_custom_property());
        assert!(!Declaration::new("-webkit-gap", "8px").is_custom_property());
    }
}
