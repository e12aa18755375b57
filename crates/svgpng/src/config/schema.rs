use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Host-supplied converter configuration. Every field falls back to its
/// default when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: String,
    /// Largest accepted upload, in bytes.
    #[serde(default = "default_max_size")]
    pub max_size: u64,
    /// Ceiling on the number of tracked entries.
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    /// Accepted input format tokens (lowercase, e.g. "svg").
    #[serde(default = "default_input_formats")]
    pub input_formats: Vec<String>,
    #[serde(default = "default_output_format")]
    pub output_format: String,
    /// Upscale factor applied to both axes for full-resolution output.
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Edge of the square thumbnail box, in pixels.
    #[serde(default = "default_thumbnail_size")]
    pub thumbnail_size: u32,
    /// Largest raster area (width × height) the converter will allocate.
    #[serde(default = "default_max_pixels")]
    pub max_pixels: u64,
    /// Delay between staggered downloads, in milliseconds.
    #[serde(default = "default_download_delay_ms")]
    pub download_delay_ms: u64,
    /// Free-form UI labels.
    #[serde(default)]
    pub texts: HashMap<String, String>,
    #[serde(default)]
    pub errors: ErrorTexts,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_max_size() -> u64 {
    50 * 1024 * 1024
}

fn default_max_files() -> usize {
    20
}

fn default_input_formats() -> Vec<String> {
    vec!["svg".to_string()]
}

fn default_output_format() -> String {
    "png".to_string()
}

fn default_scale() -> f64 {
    2.0
}

fn default_thumbnail_size() -> u32 {
    200
}

fn default_max_pixels() -> u64 {
    crate::raster::DEFAULT_MAX_PIXELS
}

fn default_download_delay_ms() -> u64 {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            max_size: default_max_size(),
            max_files: default_max_files(),
            input_formats: default_input_formats(),
            output_format: default_output_format(),
            scale: default_scale(),
            thumbnail_size: default_thumbnail_size(),
            max_pixels: default_max_pixels(),
            download_delay_ms: default_download_delay_ms(),
            texts: HashMap::new(),
            errors: ErrorTexts::default(),
            diagnostics: DiagnosticsConfig::default(),
        }
    }
}

impl Config {
    /// Whether `format` (any case) is an accepted input token.
    pub fn accepts(&self, format: &str) -> bool {
        self.input_formats
            .iter()
            .any(|f| f.eq_ignore_ascii_case(format))
    }

    /// Looks up a UI label, falling back to `default` when unset.
    pub fn text<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.texts.get(key).map(String::as_str).unwrap_or(default)
    }
}

/// User copy shown for each error category.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorTexts {
    #[serde(default = "default_corrupt")]
    pub corrupt: String,
    #[serde(default = "default_too_large")]
    pub too_large: String,
    #[serde(default = "default_loading")]
    pub loading: String,
    #[serde(default = "default_svg")]
    pub svg: String,
    #[serde(default = "default_processing")]
    pub processing: String,
    #[serde(default = "default_browser_unsupported")]
    pub browser_unsupported: String,
}

fn default_corrupt() -> String {
    "The file appears to be corrupted or is not supported".to_string()
}

fn default_too_large() -> String {
    "The image is too large to convert".to_string()
}

fn default_loading() -> String {
    "A required component failed to load, please try again".to_string()
}

fn default_svg() -> String {
    "The SVG markup is invalid".to_string()
}

fn default_processing() -> String {
    "Processing failed".to_string()
}

fn default_browser_unsupported() -> String {
    "Please update your browser".to_string()
}

impl Default for ErrorTexts {
    fn default() -> Self {
        Self {
            corrupt: default_corrupt(),
            too_large: default_too_large(),
            loading: default_loading(),
            svg: default_svg(),
            processing: default_processing(),
            browser_unsupported: default_browser_unsupported(),
        }
    }
}

/// Best-effort remote error reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsConfig {
    /// Where reports are POSTed. Reporting is disabled when unset.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Maximum number of reports per session.
    #[serde(default = "default_report_limit")]
    pub limit: usize,
    #[serde(default)]
    pub site_key: String,
}

fn default_report_limit() -> usize {
    5
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            limit: default_report_limit(),
            site_key: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.max_size, 50 * 1024 * 1024);
        assert_eq!(config.max_files, 20);
        assert_eq!(config.input_formats, vec!["svg"]);
        assert_eq!(config.output_format, "png");
        assert_eq!(config.scale, 2.0);
        assert_eq!(config.thumbnail_size, 200);
        assert_eq!(config.download_delay_ms, 100);
        assert_eq!(config.max_pixels, 100_000_000);
        assert_eq!(config.diagnostics.limit, 5);
        assert!(config.diagnostics.endpoint.is_none());
    }

    #[test]
    fn test_accepts_is_case_insensitive() {
        let config = Config::default();
        assert!(config.accepts("svg"));
        assert!(config.accepts("SVG"));
        assert!(!config.accepts("png"));
    }

    #[test]
    fn test_text_fallback() {
        let mut config = Config::default();
        assert_eq!(config.text("save", "SAVE"), "SAVE");
        config
            .texts
            .insert("save".to_string(), "Speichern".to_string());
        assert_eq!(config.text("save", "SAVE"), "Speichern");
    }

    #[test]
    fn test_partial_errors_keep_defaults() {
        let texts: ErrorTexts = serde_json::from_str(r#"{"svg": "Bad SVG"}"#).unwrap();
        assert_eq!(texts.svg, "Bad SVG");
        assert_eq!(texts.processing, default_processing());
    }
}
