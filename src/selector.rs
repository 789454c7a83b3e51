//! Lightweight selector analysis.
//!
//! This is not a selector matcher. It only answers two questions about the
//! selector text of a rule that declares custom properties:
//!
//! - how many compound segments it has (for the specificity heuristic)
//! - which classes/attributes on the root element it depends on (for the
//!   runtime watcher)

use logos::Logos;

/// Tokens of a selector list.
#[derive(Logos, Debug, Clone, PartialEq)]
enum SelToken {
    #[regex(r"[ \t\r\n]+")]
    Space,
    #[token(">")]
    Child,
    #[token("+")]
    Adjacent,
    #[token("~")]
    Sibling,
    #[token(",")]
    Comma,

    #[regex(r"\.-?[a-zA-Z_][a-zA-Z0-9_-]*", |lex| lex.slice()[1..].to_string())]
    Class(String),
    #[regex(r"#-?[a-zA-Z_][a-zA-Z0-9_-]*")]
    Id,
    #[regex(r"\[[^\]]*\]", |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].to_string()
    })]
    Attr(String),
    #[regex(r"::?[a-zA-Z-]+(\([^)]*\))?", |lex| lex.slice().to_string())]
    Pseudo(String),
    #[regex(r"-?[a-zA-Z_][a-zA-Z0-9_-]*|\*|&", |lex| lex.slice().to_ascii_lowercase())]
    Type(String),
}

impl SelToken {
    fn is_separator(&self) -> bool {
        matches!(
            self,
            SelToken::Space | SelToken::Child | SelToken::Adjacent | SelToken::Sibling | SelToken::Comma
        )
    }
}

/// A root-element class or attribute a contextual selector depends on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RootTrigger {
    Class(String),
    Attribute { name: String, value: Option<String> },
}

impl RootTrigger {
    /// Name of the root element attribute whose mutation flips this trigger.
    pub fn attribute_name(&self) -> &str {
        match self {
            RootTrigger::Class(_) => "class",
            RootTrigger::Attribute { name, .. } => name,
        }
    }
}

fn lex(selector: &str) -> Option<Vec<SelToken>> {
    SelToken::lexer(selector).collect::<Result<Vec<_>, _>>().ok()
}

/// Whether the selector is exactly `:root`.
pub fn is_root(selector: &str) -> bool {
    selector.trim() == ":root"
}

/// Count compound selectors across the whole selector list.
///
/// `.a .b > .c, .d` has four. Unlexable selectors count as one.
pub fn compound_count(selector: &str) -> usize {
    let Some(tokens) = lex(selector) else {
        return 1;
    };

    let mut count = 0;
    let mut in_compound = false;
    for token in &tokens {
        if token.is_separator() {
            in_compound = false;
        } else if !in_compound {
            count += 1;
            in_compound = true;
        }
    }
    count.max(1)
}

/// Classes and attributes of the root element that a selector keys on.
///
/// Only the first compound of each complex selector is inspected, and only
/// when it can sit on the root element: `:root.dark`, `html[data-theme]`,
/// or a bare `.dark` / `[data-mode="x"]` ancestor qualifier.
pub fn root_triggers(selector: &str) -> Vec<RootTrigger> {
    let Some(tokens) = lex(selector) else {
        return Vec::new();
    };

    let mut triggers = Vec::new();
    for complex in tokens.split(|t| *t == SelToken::Comma) {
        let first: Vec<&SelToken> = complex
            .iter()
            .skip_while(|t| **t == SelToken::Space)
            .take_while(|t| !t.is_separator())
            .collect();

        let rooted = first.iter().all(|t| match t {
            SelToken::Type(name) => name == "html",
            SelToken::Pseudo(p) => p == ":root",
            SelToken::Class(_) | SelToken::Attr(_) => true,
            _ => false,
        });
        if !rooted {
            continue;
        }

        for token in first {
            let trigger = match token {
                SelToken::Class(name) => RootTrigger::Class(name.clone()),
                SelToken::Attr(body) => parse_attribute(body),
                _ => continue,
            };
            if !triggers.contains(&trigger) {
                triggers.push(trigger);
            }
        }
    }
    triggers
}

fn parse_attribute(body: &str) -> RootTrigger {
    let (name, value) = match body.find(|c| matches!(c, '=' | '~' | '|' | '^' | '$' | '*')) {
        Some(at) => {
            let value = body[at..]
                .trim_start_matches(|c| matches!(c, '=' | '~' | '|' | '^' | '$' | '*'))
                .trim();
            let value = value
                .strip_suffix(" i")
                .or_else(|| value.strip_suffix(" s"))
                .unwrap_or(value)
                .trim()
                .trim_matches(|c| c == '"' || c == '\'');
            (&body[..at], Some(value.to_string()))
        }
        None => (body, None),
    };
    RootTrigger::Attribute {
        name: name.trim().to_ascii_lowercase(),
        value,
    }
}
