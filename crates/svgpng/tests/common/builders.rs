//! Builder patterns for creating test data programmatically.

#![allow(dead_code)]

use svgpng::Config;

/// Builder for creating `Config` instances.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with default limits and no download delay.
    pub fn new() -> Self {
        Self {
            config: Config {
                download_delay_ms: 0,
                ..Config::default()
            },
        }
    }

    pub fn max_files(mut self, max_files: usize) -> Self {
        self.config.max_files = max_files;
        self
    }

    pub fn max_size(mut self, max_size: u64) -> Self {
        self.config.max_size = max_size;
        self
    }

    pub fn scale(mut self, scale: f64) -> Self {
        self.config.scale = scale;
        self
    }

    pub fn thumbnail_size(mut self, edge: u32) -> Self {
        self.config.thumbnail_size = edge;
        self
    }

    pub fn input_formats(mut self, formats: &[&str]) -> Self {
        self.config.input_formats = formats.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn max_pixels(mut self, max_pixels: u64) -> Self {
        self.config.max_pixels = max_pixels;
        self
    }

    pub fn download_delay_ms(mut self, delay: u64) -> Self {
        self.config.download_delay_ms = delay;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }

    /// Serialize to the JSON accepted by `load_config`.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.config).expect("Failed to serialize config")
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for small SVG documents.
pub struct SvgBuilder {
    width: Option<String>,
    height: Option<String>,
    view_box: Option<String>,
    xmlns: bool,
    body: String,
}

impl SvgBuilder {
    pub fn new() -> Self {
        Self {
            width: None,
            height: None,
            view_box: None,
            xmlns: true,
            body: r##"<rect x="0" y="0" width="100%" height="100%" fill="#3366ff"/>"##.to_string(),
        }
    }

    pub fn size(mut self, width: &str, height: &str) -> Self {
        self.width = Some(width.to_string());
        self.height = Some(height.to_string());
        self
    }

    pub fn view_box(mut self, view_box: &str) -> Self {
        self.view_box = Some(view_box.to_string());
        self
    }

    pub fn without_namespace(mut self) -> Self {
        self.xmlns = false;
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    pub fn build(&self) -> String {
        let mut attrs = String::new();
        if self.xmlns {
            attrs.push_str(r#" xmlns="http://www.w3.org/2000/svg""#);
        }
        if let Some(view_box) = &self.view_box {
            attrs.push_str(&format!(r#" viewBox="{}""#, view_box));
        }
        if let Some(width) = &self.width {
            attrs.push_str(&format!(r#" width="{}""#, width));
        }
        if let Some(height) = &self.height {
            attrs.push_str(&format!(r#" height="{}""#, height));
        }
        format!("<svg{}>{}</svg>", attrs, self.body)
    }
}

impl Default for SvgBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The first bytes of a PNG file.
pub const PNG_SIGNATURE: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];
