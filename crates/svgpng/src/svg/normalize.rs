//! Root-element repairs applied before rasterization.
//!
//! Decoders refuse or mis-size markup whose root has percentage or missing
//! dimensions, so every document is given explicit pixel sizes first.

use std::sync::LazyLock;

use regex::Regex;

use super::dimensions::parse_view_box;
use super::{find_root_tag, RootTag};

pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

static RE_HAS_XMLNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|\s)xmlns\s*=").unwrap());
static RE_HAS_WIDTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|\s)width\s*=").unwrap());
static RE_HAS_HEIGHT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|\s)height\s*=").unwrap());
static RE_SIZE_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|\s)(?:width|height)\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'>/]+)"#).unwrap()
});

/// Prepares markup for a raster of exactly `width`×`height` pixels.
///
/// Declares the SVG namespace when the root lacks one, drops every existing
/// `width`/`height` attribute on the root, then sets the requested pair.
/// Markup without a root `<svg>` tag is returned unchanged.
pub fn normalize_for_raster(markup: &str, width: u32, height: u32) -> String {
    let Some(root) = find_root_tag(markup) else {
        return markup.to_string();
    };

    let mut attrs = String::with_capacity(root.attrs.len() + 64);
    if !RE_HAS_XMLNS.is_match(root.attrs) {
        attrs.push_str(" xmlns=\"");
        attrs.push_str(SVG_NAMESPACE);
        attrs.push('"');
    }
    attrs.push_str(&RE_SIZE_ATTRIBUTE.replace_all(root.attrs, ""));
    attrs.push_str(&format!(" width=\"{}\" height=\"{}\"", width, height));

    splice_root(markup, &root, &attrs)
}

/// Adds `width`/`height` taken from the viewBox when the root is missing
/// either of them. Existing values are never touched.
pub fn fill_missing_dimensions(markup: &str) -> String {
    let Some(root) = find_root_tag(markup) else {
        return markup.to_string();
    };

    let has_width = RE_HAS_WIDTH.is_match(root.attrs);
    let has_height = RE_HAS_HEIGHT.is_match(root.attrs);
    if has_width && has_height {
        return markup.to_string();
    }

    let Some(view_box) = parse_view_box(root.attrs) else {
        return markup.to_string();
    };

    let mut attrs = root.attrs.to_string();
    if !has_width {
        attrs.push_str(&format!(" width=\"{}\"", view_box.width));
    }
    if !has_height {
        attrs.push_str(&format!(" height=\"{}\"", view_box.height));
    }

    splice_root(markup, &root, &attrs)
}

fn splice_root(markup: &str, root: &RootTag<'_>, attrs: &str) -> String {
    let mut out = String::with_capacity(markup.len() + attrs.len());
    out.push_str(&markup[..root.span.start]);
    out.push_str(&root.rebuild(attrs));
    out.push_str(&markup[root.span.end..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::svg::resolve_dimensions;

    #[test]
    fn test_normalize_adds_namespace_and_size() {
        let out = normalize_for_raster(r#"<svg viewBox="0 0 10 10"><rect/></svg>"#, 20, 20);
        assert_eq!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 10 10" width="20" height="20"><rect/></svg>"#
        );
    }

    #[test]
    fn test_normalize_keeps_existing_namespace() {
        let markup = r#"<svg xmlns="http://www.w3.org/2000/svg" width="5" height="5"/>"#;
        let out = normalize_for_raster(markup, 10, 10);
        assert_eq!(out.matches("xmlns=").count(), 1);
        assert!(out.ends_with(r#" width="10" height="10"/>"#));
    }

    #[test]
    fn test_normalize_replaces_existing_sizes() {
        let markup = r#"<svg width='100%' height=50 viewBox="0 0 4 2"><rect width="1" height="1"/></svg>"#;
        let out = normalize_for_raster(markup, 8, 4);

        let root = find_root_tag(&out).unwrap();
        assert_eq!(root.attrs.matches("width=").count(), 1);
        assert_eq!(root.attrs.matches("height=").count(), 1);
        assert_eq!(resolve_dimensions(&out).width, 8.0);
        assert_eq!(resolve_dimensions(&out).height, 4.0);
        // Child elements keep their own sizing.
        assert!(out.contains(r#"<rect width="1" height="1"/>"#));
    }

    #[test]
    fn test_normalize_keeps_stroke_width() {
        let out = normalize_for_raster(r#"<svg stroke-width="3" width="2" height="2"/>"#, 4, 4);
        assert!(out.contains(r#"stroke-width="3""#));
    }

    #[test]
    fn test_normalize_without_root_is_identity() {
        assert_eq!(normalize_for_raster("hello", 1, 1), "hello");
    }

    #[test]
    fn test_normalize_preserves_prolog_and_body() {
        let markup = "<?xml version=\"1.0\"?>\n<svg viewBox=\"0 0 1 1\">\n<g/></svg>\n";
        let out = normalize_for_raster(markup, 3, 3);
        assert!(out.starts_with("<?xml version=\"1.0\"?>\n<svg xmlns="));
        assert!(out.ends_with(">\n<g/></svg>\n"));
    }

    #[test]
    fn test_fill_missing_adds_both() {
        let out = fill_missing_dimensions(r#"<svg viewBox="0 0 10 20"></svg>"#);
        assert_eq!(out, r#"<svg viewBox="0 0 10 20" width="10" height="20"></svg>"#);
    }

    #[test]
    fn test_fill_missing_adds_only_absent_axis() {
        let out = fill_missing_dimensions(r#"<svg width="7" viewBox="0 0 10 20"></svg>"#);
        assert_eq!(out, r#"<svg width="7" viewBox="0 0 10 20" height="20"></svg>"#);
    }

    #[test]
    fn test_fill_missing_never_overrides() {
        let markup = r#"<svg width="50%" height="3em" viewBox="0 0 10 20"></svg>"#;
        assert_eq!(fill_missing_dimensions(markup), markup);
    }

    #[test]
    fn test_fill_missing_without_view_box() {
        let markup = "<svg><g/></svg>";
        assert_eq!(fill_missing_dimensions(markup), markup);
    }

    #[test]
    fn test_fill_missing_fractional_view_box() {
        let out = fill_missing_dimensions(r#"<svg viewBox="0 0 12.5 4"/>"#);
        assert_eq!(out, r#"<svg viewBox="0 0 12.5 4" width="12.5" height="4"/>"#);
    }
}
