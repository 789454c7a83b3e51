//! Media query evaluation against a described viewport.
//!
//! In a browser the host answers `matchMedia` itself; this evaluator is
//! used for snapshots, the CLI and tests. It understands the features that
//! design-token stylesheets actually branch on. Anything it cannot parse or
//! does not know evaluates to `false`.

use std::collections::BTreeSet;

use logos::Logos;
use serde::{Deserialize, Serialize};

/// A dimension token: number plus (possibly empty) unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Dim {
    pub value: f64,
    pub unit: String,
}

fn parse_dim(lex: &mut logos::Lexer<MqToken>) -> Option<Dim> {
    let s = lex.slice();
    let split = s
        .find(|c: char| c.is_ascii_alphabetic() || c == '%')
        .unwrap_or(s.len());
    Some(Dim {
        value: s[..split].parse().ok()?,
        unit: s[split..].to_ascii_lowercase(),
    })
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum MqToken {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token("/")]
    Slash,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("=")]
    Eq,
    #[regex(r"-?([0-9]+(\.[0-9]+)?|\.[0-9]+)[a-zA-Z%]*", parse_dim)]
    Dimension(Dim),
    #[regex(r"-?[a-zA-Z_][a-zA-Z0-9_-]*", |lex| lex.slice().to_ascii_lowercase())]
    Ident(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cmp {
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
}

impl Cmp {
    fn from_token(tok: &MqToken) -> Option<Self> {
        match tok {
            MqToken::Lt => Some(Cmp::Lt),
            MqToken::Le => Some(Cmp::Le),
            MqToken::Eq => Some(Cmp::Eq),
            MqToken::Ge => Some(Cmp::Ge),
            MqToken::Gt => Some(Cmp::Gt),
            _ => None,
        }
    }

    /// `a op b` with the operands swapped: `b op' a`.
    fn flip(self) -> Self {
        match self {
            Cmp::Lt => Cmp::Gt,
            Cmp::Le => Cmp::Ge,
            Cmp::Eq => Cmp::Eq,
            Cmp::Ge => Cmp::Le,
            Cmp::Gt => Cmp::Lt,
        }
    }

    fn holds(self, lhs: f64, rhs: f64) -> bool {
        const EPS: f64 = 1e-6;
        match self {
            Cmp::Lt => lhs < rhs - EPS,
            Cmp::Le => lhs <= rhs + EPS,
            Cmp::Eq => (lhs - rhs).abs() <= EPS,
            Cmp::Ge => lhs >= rhs - EPS,
            Cmp::Gt => lhs > rhs + EPS,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Screen,
    Print,
}

/// A described runtime environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Viewport {
    /// CSS pixels.
    pub width: f64,
    pub height: f64,
    pub media_type: MediaType,
    pub color_scheme: ColorScheme,
    pub high_contrast: bool,
    pub reduced_motion: bool,
    /// Query strings the host reports as matching verbatim.
    pub matching: BTreeSet<String>,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
            media_type: MediaType::Screen,
            color_scheme: ColorScheme::Light,
            high_contrast: false,
            reduced_motion: false,
            matching: BTreeSet::new(),
        }
    }
}

const ROOT_FONT_SIZE: f64 = 16.0;

impl Viewport {
    pub fn sized(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn dark(mut self) -> Self {
        self.color_scheme = ColorScheme::Dark;
        self
    }

    /// Evaluate a media query list. Malformed input never matches.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim();
        if self.matching.contains(query) {
            return true;
        }
        let Ok(tokens) = MqToken::lexer(query).collect::<Result<Vec<_>, _>>() else {
            return false;
        };
        if tokens.is_empty() {
            return false;
        }
        let mut result = false;
        for part in split_top_level(&tokens) {
            let mut eval = Eval {
                tokens: part,
                pos: 0,
                viewport: self,
            };
            // Each query in the list must parse fully; a broken one is false.
            if eval.query().filter(|_| eval.at_end()) == Some(true) {
                result = true;
            }
        }
        result
    }

    fn media_type_matches(&self, name: &str) -> Option<bool> {
        match name {
            "all" => Some(true),
            "screen" => Some(self.media_type == MediaType::Screen),
            "print" => Some(self.media_type == MediaType::Print),
            // Deprecated media types never match.
            "tv" | "tty" | "projection" | "handheld" | "braille" | "embossed" | "aural"
            | "speech" => Some(false),
            _ => None,
        }
    }

    fn numeric(&self, name: &str) -> Option<f64> {
        match name {
            "width" => Some(self.width),
            "height" => Some(self.height),
            "aspect-ratio" => Some(self.width / self.height.max(1.0)),
            _ => None,
        }
    }

    fn feature(&self, name: &str, value: Option<&Value>) -> Option<bool> {
        if let Some(base) = name.strip_prefix("min-") {
            return self.range(base, Cmp::Ge, value?);
        }
        if let Some(base) = name.strip_prefix("max-") {
            return self.range(base, Cmp::Le, value?);
        }
        if self.numeric(name).is_some() {
            return match value {
                Some(v) => self.range(name, Cmp::Eq, v),
                None => Some(self.numeric(name)? > 0.0),
            };
        }

        let keyword = match value {
            Some(Value::Keyword(k)) => Some(k.as_str()),
            Some(_) => return None,
            None => None,
        };
        match (name, keyword) {
            ("orientation", Some("portrait")) => Some(self.height >= self.width),
            ("orientation", Some("landscape")) => Some(self.width > self.height),
            ("prefers-color-scheme", Some("dark")) => Some(self.color_scheme == ColorScheme::Dark),
            ("prefers-color-scheme", Some("light")) => Some(self.color_scheme == ColorScheme::Light),
            ("prefers-contrast", Some("more" | "high")) => Some(self.high_contrast),
            ("prefers-contrast", Some("no-preference")) => Some(!self.high_contrast),
            ("prefers-contrast", Some("less" | "custom")) => Some(false),
            ("prefers-contrast", None) => Some(self.high_contrast),
            ("prefers-reduced-motion", Some("reduce")) => Some(self.reduced_motion),
            ("prefers-reduced-motion", Some("no-preference")) => Some(!self.reduced_motion),
            ("prefers-reduced-motion", None) => Some(self.reduced_motion),
            ("color", None) => Some(true),
            _ => None,
        }
    }

    fn range(&self, name: &str, cmp: Cmp, value: &Value) -> Option<bool> {
        let actual = self.numeric(name)?;
        let expected = match (name, value) {
            ("aspect-ratio", Value::Ratio(r)) => *r,
            ("aspect-ratio", Value::Number(n)) => *n,
            ("width" | "height", Value::Length(px)) => *px,
            ("width" | "height", Value::Number(n)) if *n == 0.0 => 0.0,
            _ => return None,
        };
        Some(cmp.holds(actual, expected))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    /// Already converted to CSS pixels.
    Length(f64),
    Number(f64),
    Ratio(f64),
    Keyword(String),
}

fn split_top_level(tokens: &[MqToken]) -> Vec<&[MqToken]> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, tok) in tokens.iter().enumerate() {
        match tok {
            MqToken::LParen => depth += 1,
            MqToken::RParen => depth = depth.saturating_sub(1),
            MqToken::Comma if depth == 0 => {
                parts.push(&tokens[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&tokens[start..]);
    parts
}

struct Eval<'a> {
    tokens: &'a [MqToken],
    pos: usize,
    viewport: &'a Viewport,
}

impl<'a> Eval<'a> {
    fn peek(&self) -> Option<&'a MqToken> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&'a MqToken> {
        self.tokens.get(self.pos + offset)
    }

    fn bump(&mut self) -> Option<&'a MqToken> {
        let tok = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(tok)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn is_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(MqToken::Ident(s)) if s == kw)
    }

    fn expect(&mut self, tok: &MqToken) -> Option<()> {
        (self.bump()? == tok).then_some(())
    }

    /// `[not|only] <type> [and <condition>]` or a bare `<condition>`.
    fn query(&mut self) -> Option<bool> {
        let typed = match (self.peek()?, self.peek_at(1)) {
            (MqToken::Ident(kw), Some(MqToken::Ident(_))) if kw == "not" || kw == "only" => true,
            (MqToken::Ident(kw), _) => kw != "not",
            _ => false,
        };
        if !typed {
            return self.condition();
        }

        let negate = self.is_keyword("not");
        if negate || self.is_keyword("only") {
            self.bump();
        }
        let media_type = match self.bump()? {
            MqToken::Ident(name) => self.viewport.media_type_matches(name)?,
            _ => return None,
        };

        let mut result = media_type;
        if self.is_keyword("and") {
            self.bump();
            let cond = self.condition_without_or()?;
            result = result && cond;
        }
        Some(if negate { !result } else { result })
    }

    fn condition(&mut self) -> Option<bool> {
        if self.is_keyword("not") {
            self.bump();
            return Some(!self.in_parens()?);
        }
        let mut result = self.in_parens()?;
        let mut joiner: Option<&str> = None;
        while let Some(MqToken::Ident(kw)) = self.peek() {
            let kw = kw.as_str();
            if kw != "and" && kw != "or" {
                return None;
            }
            // Mixing `and` and `or` without parentheses is invalid.
            if joiner.is_some_and(|j| j != kw) {
                return None;
            }
            joiner = Some(if kw == "and" { "and" } else { "or" });
            self.bump();
            let next = self.in_parens()?;
            result = if kw == "and" { result && next } else { result || next };
        }
        Some(result)
    }

    fn condition_without_or(&mut self) -> Option<bool> {
        if self.is_keyword("not") {
            self.bump();
            return Some(!self.in_parens()?);
        }
        let mut result = self.in_parens()?;
        while self.is_keyword("and") {
            self.bump();
            let next = self.in_parens()?;
            result = result && next;
        }
        Some(result)
    }

    fn in_parens(&mut self) -> Option<bool> {
        self.expect(&MqToken::LParen)?;
        let nested = matches!(self.peek()?, MqToken::LParen)
            || matches!(self.peek()?, MqToken::Ident(s) if s == "not");
        let result = if nested {
            self.condition()?
        } else {
            self.feature()?
        };
        self.expect(&MqToken::RParen)?;
        Some(result)
    }

    /// Contents of `( ... )` for a single feature, up to the closing paren.
    fn feature(&mut self) -> Option<bool> {
        let start = self.pos;
        while !matches!(self.peek()?, MqToken::RParen) {
            self.pos += 1;
        }
        let body = &self.tokens[start..self.pos];
        let vp = self.viewport;

        match body {
            [MqToken::Ident(name)] => vp.feature(name, None),
            [MqToken::Ident(name), MqToken::Colon, rest @ ..] => {
                let value = parse_value(rest)?;
                vp.feature(name, Some(&value))
            }
            _ => self.range(body),
        }
    }

    /// `(width <= 768px)`, `(768px >= width)`, `(400px < width <= 700px)`.
    fn range(&self, body: &[MqToken]) -> Option<bool> {
        let pos = body
            .iter()
            .position(|t| matches!(t, MqToken::Ident(_)))?;
        let MqToken::Ident(name) = &body[pos] else {
            return None;
        };
        let vp = self.viewport;

        let mut result = true;
        if pos > 0 {
            let cmp = Cmp::from_token(body.get(pos - 1)?)?;
            let value = parse_value(&body[..pos - 1])?;
            result &= vp.range(name, cmp.flip(), &value)?;
        }
        if pos + 1 < body.len() {
            let cmp = Cmp::from_token(&body[pos + 1])?;
            let value = parse_value(&body[pos + 2..])?;
            result &= vp.range(name, cmp, &value)?;
        }
        (pos > 0 || pos + 1 < body.len()).then_some(result)
    }
}

fn parse_value(tokens: &[MqToken]) -> Option<Value> {
    match tokens {
        [MqToken::Ident(k)] => Some(Value::Keyword(k.clone())),
        [MqToken::Dimension(d)] => dimension_value(d),
        [MqToken::Dimension(a), MqToken::Slash, MqToken::Dimension(b)]
            if a.unit.is_empty() && b.unit.is_empty() && b.value != 0.0 =>
        {
            Some(Value::Ratio(a.value / b.value))
        }
        _ => None,
    }
}

fn dimension_value(d: &Dim) -> Option<Value> {
    match d.unit.as_str() {
        "" => Some(Value::Number(d.value)),
        "px" => Some(Value::Length(d.value)),
        "em" | "rem" => Some(Value::Length(d.value * ROOT_FONT_SIZE)),
        _ => None,
    }
}
