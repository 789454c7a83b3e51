//! Active-context resolution: which declaration of a variable the cascade
//! honors right now.
//!
//! Only `media` conditions are evaluated live. `supports`, `container` and
//! `layer` contexts are modeled but never match here; they fall through to
//! the base context.

use crate::media::Viewport;
use crate::model::{ConditionKind, Context, ContextualVariable};

/// Live runtime state the resolver queries.
pub trait Environment {
    /// Whether `query` currently matches (`window.matchMedia(query).matches`).
    ///
    /// Implementations must return `false` for queries they cannot parse.
    fn matches_media(&self, query: &str) -> bool;
}

impl Environment for Viewport {
    fn matches_media(&self, query: &str) -> bool {
        self.matches(query)
    }
}

impl<E: Environment + ?Sized> Environment for &E {
    fn matches_media(&self, query: &str) -> bool {
        (**self).matches_media(query)
    }
}

/// Pick the context the cascade currently applies for `variable`.
///
/// Highest-specificity matching conditional context first; with none
/// matching, the unconditional `:root` context, else `None`. Equal
/// specificity goes to `:root`, then to the later declaration, as in the
/// cascade. Pure: no side effects, safe to call per render.
pub fn active_context<'v>(
    variable: &'v ContextualVariable,
    env: &dyn Environment,
) -> Option<&'v Context> {
    let mut candidates: Vec<&Context> = variable
        .contexts
        .iter()
        .filter(|c| !c.is_unconditional())
        .collect();
    candidates.sort_by(|a, b| b.cascade_cmp(a));

    candidates
        .into_iter()
        .find(|c| match &c.condition {
            Some(cond) if cond.kind == ConditionKind::Media => {
                !cond.text.is_empty() && env.matches_media(&cond.text)
            }
            _ => false,
        })
        .or_else(|| variable.base_context())
}

/// Value the variable currently takes, falling back to its representative.
pub fn active_value<'v>(variable: &'v ContextualVariable, env: &dyn Environment) -> &'v str {
    active_context(variable, env)
        .map(|c| c.value.as_str())
        .unwrap_or(&variable.value)
}
