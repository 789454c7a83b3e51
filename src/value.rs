//! Value kinds, so editors can pick a color picker or a number stepper.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    Color,
    Number,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorFormat {
    Hex,
    Rgba,
    Hsla,
    Oklch,
}

/// A number with a unit, e.g. `12px`, `-0.5rem`, `50%`.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberWithUnit {
    pub value: f64,
    pub unit: String,
}

pub fn is_color(value: &str) -> bool {
    let v = value.trim();
    v.to_ascii_lowercase().starts_with("oklch(") || csscolorparser::parse(v).is_ok()
}

/// Parse `<number><unit>`. A unit is required; bare numbers are `None`.
pub fn parse_number_with_unit(value: &str) -> Option<NumberWithUnit> {
    let v = value.trim();
    let split = v.find(|c: char| c.is_ascii_alphabetic() || c == '%')?;
    let (number, unit) = v.split_at(split);
    if number.is_empty() || !unit.chars().all(|c| c.is_ascii_alphabetic() || c == '%') {
        return None;
    }
    // Reject forms like `+1px` or `1e3px` that the editor cannot round-trip.
    if !number
        .chars()
        .enumerate()
        .all(|(i, c)| c.is_ascii_digit() || c == '.' || (i == 0 && c == '-'))
    {
        return None;
    }
    Some(NumberWithUnit {
        value: number.parse().ok()?,
        unit: unit.to_string(),
    })
}

pub fn variable_kind(value: &str) -> VariableKind {
    if is_color(value) {
        VariableKind::Color
    } else if parse_number_with_unit(value).is_some() {
        VariableKind::Number
    } else {
        VariableKind::Other
    }
}

/// Re-express a color value in `format`. `None` for unparseable input.
pub fn format_color(value: &str, format: ColorFormat) -> Option<String> {
    let color = csscolorparser::parse(value.trim()).ok()?;
    let alpha = round(color.a as f64, 2);

    Some(match format {
        ColorFormat::Hex => color.to_css_hex(),
        ColorFormat::Rgba => {
            let [r, g, b, _] = color.to_rgba8();
            format!("rgba({r}, {g}, {b}, {alpha})")
        }
        ColorFormat::Hsla => {
            let [h, s, l, _] = color.to_hsla();
            let h = if h.is_nan() { 0.0 } else { h };
            format!(
                "hsla({}, {}%, {}%, {alpha})",
                h.round(),
                (s * 100.0).round(),
                (l * 100.0).round()
            )
        }
        ColorFormat::Oklch => {
            let [l, c, h, _] = color.to_oklcha();
            let lightness = (l * 100.0).clamp(0.0, 100.0);
            let chroma = (c * 100.0).clamp(0.0, 100.0);
            // Hue comes back in radians on (-pi, pi].
            let hue = if h.is_nan() { 0.0 } else { h.to_degrees().rem_euclid(360.0) };
            let mut out = format!("oklch({lightness:.1}% {chroma:.1} {}deg", hue.round());
            if alpha < 1.0 {
                out.push_str(&format!(" / {alpha:.2}"));
            }
            out.push(')');
            out
        }
    })
}

fn round(v: f64, places: i32) -> f64 {
    let f = 10f64.powi(places);
    (v * f).round() / f
}
