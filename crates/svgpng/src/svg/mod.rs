//! Markup-level helpers that operate on the root `<svg>` start tag.

pub mod dimensions;
pub mod normalize;

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

pub use dimensions::{resolve_dimensions, Dimensions};
pub use normalize::{fill_missing_dimensions, normalize_for_raster, SVG_NAMESPACE};

static RE_ROOT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<svg\b([^>]*)>").unwrap());

/// Location of the root start tag inside a document.
pub(crate) struct RootTag<'a> {
    /// Byte range of the whole `<svg ...>` tag.
    pub span: Range<usize>,
    /// Attribute text between `<svg` and `>` (without a trailing `/`).
    pub attrs: &'a str,
    pub self_closing: bool,
}

impl RootTag<'_> {
    /// Rebuilds the start tag around new attribute text.
    pub fn rebuild(&self, attrs: &str) -> String {
        if self.self_closing {
            format!("<svg{}/>", attrs)
        } else {
            format!("<svg{}>", attrs)
        }
    }
}

pub(crate) fn find_root_tag(markup: &str) -> Option<RootTag<'_>> {
    let caps = RE_ROOT_TAG.captures(markup)?;
    let whole = caps.get(0)?;
    let raw = caps.get(1)?.as_str();
    let (attrs, self_closing) = match raw.strip_suffix('/') {
        Some(stripped) => (stripped, true),
        None => (raw, false),
    };
    Some(RootTag {
        span: whole.range(),
        attrs,
        self_closing,
    })
}

/// Reads a quoted or bare attribute value from root-tag attribute text.
pub(crate) fn attribute<'a>(re: &Regex, attrs: &'a str) -> Option<&'a str> {
    let caps = re.captures(attrs)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.as_str())
}
