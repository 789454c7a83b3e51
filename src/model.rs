//! Context model. Every declaration site of every custom property,
//! grouped by property name.
//!
//! The model is rebuilt wholesale on each detection pass; nothing here is
//! patched incrementally.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::{info, trace};
use serde::{Deserialize, Serialize};

use crate::scanner::{self, Declared, ScanStats};
use crate::selector::{self, RootTrigger};
use crate::sheet::StyleSource;

/// Context key for edits that target the unconditional declaration.
pub const BASE_KEY: &str = "base";

/// Kind of conditional group rule enclosing a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionKind {
    Media,
    Supports,
    Container,
    Layer,
}

impl ConditionKind {
    /// The at-rule keyword, without the `@`.
    pub fn at_rule(self) -> &'static str {
        match self {
            ConditionKind::Media => "media",
            ConditionKind::Supports => "supports",
            ConditionKind::Container => "container",
            ConditionKind::Layer => "layer",
        }
    }
}

/// Text of an enclosing conditional rule together with its kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Condition {
    pub kind: ConditionKind,
    pub text: String,
}

impl Condition {
    pub fn new(kind: ConditionKind, text: &str) -> Self {
        Self {
            kind,
            text: text.trim().to_string(),
        }
    }

    pub fn media(text: &str) -> Self {
        Self::new(ConditionKind::Media, text)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.at_rule(), self.text)
    }
}

/// One declaration site for one custom property.
///
/// Equality ignores `source_order`: two scans of the same sites compare
/// equal whatever order the sheets were walked in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    pub selector: String,
    pub condition: Option<Condition>,
    pub specificity: u32,
    pub value: String,
    /// Position of the winning declaration in the scan; later wins ties.
    #[serde(skip)]
    pub source_order: usize,
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.selector == other.selector
            && self.condition == other.condition
            && self.specificity == other.specificity
            && self.value == other.value
    }
}

impl Eq for Context {}

impl Context {
    pub fn new(selector: &str, condition: Option<Condition>, value: &str) -> Self {
        let specificity = specificity(selector, condition.as_ref());
        Self {
            selector: selector.to_string(),
            condition,
            specificity,
            value: value.to_string(),
            source_order: 0,
        }
    }

    /// Cascade precedence between two contexts: specificity, then `:root`,
    /// then the later declaration.
    pub fn cascade_cmp(&self, other: &Self) -> Ordering {
        self.specificity
            .cmp(&other.specificity)
            .then_with(|| selector::is_root(&self.selector).cmp(&selector::is_root(&other.selector)))
            .then_with(|| self.source_order.cmp(&other.source_order))
    }

    pub fn condition_text(&self) -> Option<&str> {
        self.condition.as_ref().map(|c| c.text.as_str())
    }

    pub fn kind(&self) -> Option<ConditionKind> {
        self.condition.as_ref().map(|c| c.kind)
    }

    /// Key used by the edit layers: the condition text, or `"base"`.
    pub fn key(&self) -> &str {
        self.condition_text().unwrap_or(BASE_KEY)
    }

    pub fn is_unconditional(&self) -> bool {
        self.condition.is_none()
    }

    /// The unconditional `:root` declaration.
    pub fn is_base(&self) -> bool {
        self.is_unconditional() && selector::is_root(&self.selector)
    }

    fn same_site(&self, selector: &str, condition: Option<&Condition>) -> bool {
        self.selector == selector && self.condition.as_ref() == condition
    }
}

/// Ranking heuristic for contexts of one property.
///
/// +100 for a condition, +10 for exactly `:root`, otherwise +1 per compound
/// segment. Not CSS specificity.
pub fn specificity(selector: &str, condition: Option<&Condition>) -> u32 {
    let mut score = 0;
    if condition.is_some() {
        score += 100;
    }
    if selector::is_root(selector) {
        score += 10;
    } else {
        score += selector::compound_count(selector) as u32;
    }
    score
}

/// All declaration sites of one custom property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextualVariable {
    pub name: String,
    /// Value at unconditional `:root`, else the first discovered value.
    pub value: String,
    /// Sorted ascending by specificity.
    pub contexts: Vec<Context>,
    pub is_rewritten: bool,
}

impl ContextualVariable {
    /// The unconditional `:root` context, if declared.
    pub fn base_context(&self) -> Option<&Context> {
        self.contexts.iter().find(|c| c.is_base())
    }

    /// Target of `"base"` edits: unconditional `:root`, else the first
    /// unconditional context.
    pub fn unconditional_context(&self) -> Option<&Context> {
        self.base_context()
            .or_else(|| self.contexts.iter().find(|c| c.is_unconditional()))
    }

    /// Look up a context by edit key. Several selectors may share one
    /// condition; the one the cascade ranks highest stands for the key.
    pub fn context_for_key(&self, key: &str) -> Option<&Context> {
        if key == BASE_KEY {
            return self.unconditional_context();
        }
        self.contexts
            .iter()
            .filter(|c| c.condition_text() == Some(key))
            .max_by(|a, b| a.cascade_cmp(b))
    }

    pub fn distinct_values(&self) -> BTreeSet<&str> {
        self.contexts.iter().map(|c| c.value.as_str()).collect()
    }
}

/// Detection result: property name to its contexts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VariableSet {
    variables: BTreeMap<String, ContextualVariable>,
}

impl VariableSet {
    /// Scan `source` and build the model.
    pub fn detect(source: &dyn StyleSource) -> (Self, ScanStats) {
        let (declared, stats) = scanner::scan(source);
        let set = Self::build(declared);
        info!(
            "detected {} variables ({} contextual) from {} of {} stylesheets",
            set.len(),
            set.contextual().count(),
            stats.sheets - stats.skipped_sheets,
            stats.sheets
        );
        (set, stats)
    }

    /// Group scanned declarations into variables.
    ///
    /// A repeated (selector, condition) site keeps its first position but
    /// takes the last declared value and that declaration's source order.
    pub fn build(declared: impl IntoIterator<Item = Declared>) -> Self {
        let mut discovered: BTreeMap<String, Vec<Context>> = BTreeMap::new();

        for (order, decl) in declared.into_iter().enumerate() {
            let contexts = discovered.entry(decl.property).or_default();
            match contexts
                .iter_mut()
                .find(|c| c.same_site(&decl.selector, decl.condition.as_ref()))
            {
                Some(existing) => {
                    existing.value = decl.value;
                    existing.source_order = order;
                }
                None => {
                    let mut context = Context::new(&decl.selector, decl.condition, &decl.value);
                    context.source_order = order;
                    contexts.push(context);
                }
            }
        }

        let variables = discovered
            .into_iter()
            .filter_map(|(name, mut contexts)| {
                let value = contexts
                    .iter()
                    .find(|c| c.is_base())
                    .or_else(|| contexts.first())?
                    .value
                    .clone();

                contexts.sort_by(|a, b| {
                    a.specificity
                        .cmp(&b.specificity)
                        .then_with(|| a.condition.cmp(&b.condition))
                        .then_with(|| a.selector.cmp(&b.selector))
                });

                let distinct: BTreeSet<&str> = contexts.iter().map(|c| c.value.as_str()).collect();
                let is_rewritten = distinct.len() > 1;
                trace!("{name}: {} contexts, rewritten={is_rewritten}", contexts.len());

                Some((
                    name.clone(),
                    ContextualVariable {
                        name,
                        value,
                        contexts,
                        is_rewritten,
                    },
                ))
            })
            .collect();

        Self { variables }
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ContextualVariable> {
        self.variables.get(name)
    }

    /// Every detected variable, by name.
    pub fn all(&self) -> impl Iterator<Item = &ContextualVariable> {
        self.variables.values()
    }

    /// Only variables with more than one distinct value.
    pub fn contextual(&self) -> impl Iterator<Item = &ContextualVariable> {
        self.variables.values().filter(|v| v.is_rewritten)
    }

    /// Representative values, captured as the reset target.
    pub fn original_values(&self) -> BTreeMap<String, String> {
        self.variables
            .values()
            .map(|v| (v.name.clone(), v.value.clone()))
            .collect()
    }

    /// Distinct conditions of the given kind across all contexts.
    pub fn conditions(&self, kind: ConditionKind) -> BTreeSet<String> {
        self.all()
            .flat_map(|v| v.contexts.iter())
            .filter_map(|c| c.condition.as_ref())
            .filter(|c| c.kind == kind)
            .map(|c| c.text.clone())
            .collect()
    }

    /// Kind recorded for a condition key, if any context uses it.
    pub fn condition_kind(&self, key: &str) -> Option<ConditionKind> {
        self.all()
            .flat_map(|v| v.contexts.iter())
            .find(|c| c.condition_text() == Some(key))
            .and_then(Context::kind)
    }

    /// Root element classes/attributes that select contextual declarations.
    pub fn root_triggers(&self) -> BTreeSet<RootTrigger> {
        self.contextual()
            .flat_map(|v| v.contexts.iter())
            .filter(|c| !selector::is_root(&c.selector))
            .flat_map(|c| selector::root_triggers(&c.selector))
            .collect()
    }
}
