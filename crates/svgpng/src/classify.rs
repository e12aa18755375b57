//! Maps raw failure messages onto the small set of user-facing error categories.

use serde::{Deserialize, Serialize};

use crate::config::ErrorTexts;

/// User-facing failure category, in matching priority order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCategory {
    Corrupt,
    TooLarge,
    Loading,
    Svg,
    Processing,
}

const CORRUPT_KEYWORDS: &[&str] = &[
    "could not be decoded",
    "cannot decode",
    "size of offscreencanvas is zero",
    "readback",
    "createimagebitmap",
    "encoding",
    "invalid image",
    "not a valid",
    "invalid state",
];

const TOO_LARGE_KEYWORDS: &[&str] = &[
    "memory access",
    "out of memory",
    "abort(",
    "exit(1)",
    "unreachable",
    "wasm worker crashed",
];

const LOADING_KEYWORDS: &[&str] = &[
    "failed to fetch",
    "dynamically imported module",
    "load failed",
];

const SVG_KEYWORDS: &[&str] = &[
    "max buffer length",
    "non-whitespace before first tag",
    "invalid svg",
];

/// Ordered rule table; the first category with a matching keyword wins.
const RULES: &[(ErrorCategory, &[&str])] = &[
    (ErrorCategory::Corrupt, CORRUPT_KEYWORDS),
    (ErrorCategory::TooLarge, TOO_LARGE_KEYWORDS),
    (ErrorCategory::Loading, LOADING_KEYWORDS),
    (ErrorCategory::Svg, SVG_KEYWORDS),
];

/// Classifies a raw error message. `None` and unmatched messages fall back to
/// [`ErrorCategory::Processing`].
pub fn classify(message: Option<&str>) -> ErrorCategory {
    let Some(message) = message else {
        return ErrorCategory::Processing;
    };
    let lowered = message.to_lowercase();

    RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
        .map(|(category, _)| *category)
        .unwrap_or(ErrorCategory::Processing)
}

impl ErrorCategory {
    /// Returns the configured user copy for this category.
    pub fn message<'a>(&self, texts: &'a ErrorTexts) -> &'a str {
        match self {
            ErrorCategory::Corrupt => &texts.corrupt,
            ErrorCategory::TooLarge => &texts.too_large,
            ErrorCategory::Loading => &texts.loading,
            ErrorCategory::Svg => &texts.svg,
            ErrorCategory::Processing => &texts.processing,
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Corrupt => write!(f, "corrupt"),
            ErrorCategory::TooLarge => write!(f, "too large"),
            ErrorCategory::Loading => write!(f, "loading"),
            ErrorCategory::Svg => write!(f, "invalid svg"),
            ErrorCategory::Processing => write!(f, "processing"),
        }
    }
}
