//! Decode, draw and encode: SVG markup in, PNG bytes of an exact size out.

use async_trait::async_trait;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::RasterError;
use crate::handle::ObjectStore;
use crate::svg::{normalize_for_raster, resolve_dimensions, Dimensions};

pub const SVG_MIME: &str = "image/svg+xml";
pub const PNG_MIME: &str = "image/png";

/// 100 megapixels, about 400 MB of RGBA.
pub const DEFAULT_MAX_PIXELS: u64 = 100_000_000;

/// An integral raster size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl std::fmt::Display for PixelSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Encoded PNG bytes together with their pixel size.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub data: Vec<u8>,
    pub size: PixelSize,
}

/// Produces a raster of exactly the requested size from SVG markup.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(&self, markup: &str, size: PixelSize) -> Result<RasterImage, RasterError>;
}

/// [`Rasterizer`] backed by `resvg`. Markup is handed to the decoder through
/// a temporary object URL that is released as soon as decoding finishes.
///
/// Targets larger than `max_pixels` are refused before anything is allocated.
#[derive(Debug, Clone)]
pub struct ResvgRasterizer {
    store: ObjectStore,
    max_pixels: u64,
}

impl Default for ResvgRasterizer {
    fn default() -> Self {
        Self::new(ObjectStore::default())
    }
}

impl ResvgRasterizer {
    pub fn new(store: ObjectStore) -> Self {
        Self {
            store,
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }

    pub fn from_config(config: &Config, store: ObjectStore) -> Self {
        Self::new(store).with_max_pixels(config.max_pixels)
    }

    pub fn with_max_pixels(mut self, max_pixels: u64) -> Self {
        self.max_pixels = max_pixels;
        self
    }

    pub fn max_pixels(&self) -> u64 {
        self.max_pixels
    }

    fn render(store: &ObjectStore, markup: &str, size: PixelSize) -> Result<Vec<u8>, RasterError> {
        let normalized = normalize_for_raster(markup, size.width, size.height);
        let tree = {
            let mut url = store.create_url(normalized.into_bytes().into(), SVG_MIME);
            let decoded = match url.data() {
                Some(data) => usvg::Tree::from_data(&data, &usvg::Options::default())
                    .map_err(|e| RasterError::Decode(e.to_string())),
                None => Err(RasterError::Decode("object url was revoked".to_string())),
            };
            url.release();
            decoded?
        };

        let mut pixmap = Pixmap::new(size.width, size.height).ok_or(RasterError::Allocate {
            width: size.width,
            height: size.height,
        })?;

        let tree_size = tree.size();
        let transform = Transform::from_scale(
            size.width as f32 / tree_size.width(),
            size.height as f32 / tree_size.height(),
        );
        resvg::render(&tree, transform, &mut pixmap.as_mut());

        // PNG stores straight alpha.
        let mut rgba = pixmap.take();
        demultiply(&mut rgba);

        let mut png = Vec::new();
        PngEncoder::new(&mut png)
            .write_image(&rgba, size.width, size.height, ExtendedColorType::Rgba8)
            .map_err(|e| RasterError::Encode(e.to_string()))?;
        Ok(png)
    }
}

fn demultiply(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u32::from(px[3]);
        match a {
            255 => {}
            0 => px[..3].fill(0),
            _ => {
                for c in &mut px[..3] {
                    *c = ((u32::from(*c) * 255 + a / 2) / a).min(255) as u8;
                }
            }
        }
    }
}

#[async_trait]
impl Rasterizer for ResvgRasterizer {
    async fn rasterize(&self, markup: &str, size: PixelSize) -> Result<RasterImage, RasterError> {
        if size.width == 0 || size.height == 0 || size.area() > self.max_pixels {
            tracing::debug!(%size, max_pixels = self.max_pixels, "raster size refused");
            return Err(RasterError::Allocate {
                width: size.width,
                height: size.height,
            });
        }

        let store = self.store.clone();
        let markup = markup.to_string();

        let data = tokio::task::spawn_blocking(move || Self::render(&store, &markup, size))
            .await
            .map_err(|e| RasterError::Task(e.to_string()))??;

        tracing::debug!(%size, bytes = data.len(), "rasterized");
        Ok(RasterImage { data, size })
    }
}

/// `round(natural × scale)` per axis, never below one pixel.
pub fn scaled_size(natural: Dimensions, scale: f64) -> PixelSize {
    PixelSize {
        width: to_pixels(natural.width * scale),
        height: to_pixels(natural.height * scale),
    }
}

/// Fits `natural` into a `edge`×`edge` box: the long axis takes the box edge
/// (height wins ties) and the short axis keeps the aspect ratio.
pub fn fit_within(natural: Dimensions, edge: u32) -> PixelSize {
    let edge_f = f64::from(edge);
    if natural.width > natural.height {
        PixelSize {
            width: edge.max(1),
            height: to_pixels(natural.height * edge_f / natural.width),
        }
    } else {
        PixelSize {
            width: to_pixels(natural.width * edge_f / natural.height),
            height: edge.max(1),
        }
    }
}

fn to_pixels(value: f64) -> u32 {
    if !value.is_finite() {
        return 1;
    }
    value.round().clamp(1.0, f64::from(u32::MAX)) as u32
}

/// Full-resolution conversion at `scale` times the natural size.
pub async fn convert_full(
    rasterizer: &dyn Rasterizer,
    markup: &str,
    scale: f64,
) -> Result<RasterImage, RasterError> {
    let natural = resolve_dimensions(markup);
    let target = scaled_size(natural, scale);
    tracing::debug!(natural_width = natural.width, natural_height = natural.height, %target, "full conversion");
    rasterizer.rasterize(markup, target).await
}

/// Preview raster fitted into the thumbnail box. Also returns the natural
/// size it was derived from.
pub async fn thumbnail(
    rasterizer: &dyn Rasterizer,
    markup: &str,
    edge: u32,
) -> Result<(RasterImage, Dimensions), RasterError> {
    let natural = resolve_dimensions(markup);
    let target = fit_within(natural, edge);
    let image = rasterizer.rasterize(markup, target).await?;
    Ok((image, natural))
}
