//! Natural-size inference for SVG documents.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{attribute, find_root_tag};

/// Width used when neither attributes nor viewBox give one.
pub const DEFAULT_WIDTH: f64 = 300.0;
/// Height used when neither attributes nor viewBox give one.
pub const DEFAULT_HEIGHT: f64 = 150.0;

static RE_WIDTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|\s)width\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>/]+))"#).unwrap()
});
static RE_HEIGHT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|\s)height\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>/]+))"#).unwrap()
});
static RE_VIEWBOX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|\s)viewBox\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});
static RE_LENGTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\+?(\d*\.?\d+(?:[eE][+-]?\d+)?)\s*([a-zA-Z]*|%)\s*$").unwrap()
});
static RE_LIST_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s,]+").unwrap());

/// A positive, finite width/height pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Infers the natural size of `markup`.
///
/// Each axis comes from the root `width`/`height` attribute when it is a
/// positive number (with or without a unit). Missing, percentage or
/// unparsable axes are taken from the viewBox, and anything still
/// unresolved falls back to 300×150.
pub fn resolve_dimensions(markup: &str) -> Dimensions {
    let root = find_root_tag(markup);
    let attrs = root.as_ref().map(|r| r.attrs).unwrap_or("");

    let mut width = attribute(&RE_WIDTH, attrs).and_then(parse_length);
    let mut height = attribute(&RE_HEIGHT, attrs).and_then(parse_length);

    if width.is_none() || height.is_none() {
        if let Some(view_box) = parse_view_box(attrs) {
            width = width.or(Some(view_box.width));
            height = height.or(Some(view_box.height));
        }
    }

    Dimensions {
        width: width.unwrap_or(DEFAULT_WIDTH),
        height: height.unwrap_or(DEFAULT_HEIGHT),
    }
}

/// Parses an attribute length. Percentages and non-positive values yield
/// `None`; other units are accepted and the number taken as-is.
fn parse_length(value: &str) -> Option<f64> {
    let caps = RE_LENGTH.captures(value)?;
    if caps.get(2).map(|m| m.as_str()) == Some("%") {
        return None;
    }
    caps.get(1)?
        .as_str()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}

/// Returns the width/height components of a four-number viewBox.
pub(crate) fn parse_view_box(attrs: &str) -> Option<Dimensions> {
    let raw = attribute(&RE_VIEWBOX, attrs)?;
    let numbers: Vec<f64> = RE_LIST_SEPARATOR
        .split(raw.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>())
        .collect::<Result<_, _>>()
        .ok()?;

    if numbers.len() != 4 {
        return None;
    }

    let (width, height) = (numbers[2], numbers[3]);
    let valid = |v: f64| v.is_finite() && v > 0.0;
    if valid(width) && valid(height) {
        Some(Dimensions { width, height })
    } else {
        None
    }
}
