//! Minification for rendered pages and static assets.
//!
//! HTML goes through `minify_html`; stylesheets, scripts and JSON files
//! through `minifier`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MinifyError {
    #[error("failed to minify CSS: {0}")]
    Css(String),
    #[error("not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
}

/// Content type for minification.
pub enum MinifyType<'a> {
    Html(&'a [u8]),
    Css(&'a [u8]),
    Js(&'a [u8]),
    Json(&'a [u8]),
}

impl<'a> MinifyType<'a> {
    /// Picks the minifier for a static file by its extension. Files of any
    /// other type are copied as they are.
    pub fn for_extension(ext: &str, content: &'a [u8]) -> Option<Self> {
        match ext {
            "css" => Some(MinifyType::Css(content)),
            "js" => Some(MinifyType::Js(content)),
            "json" => Some(MinifyType::Json(content)),
            _ => None,
        }
    }
}

pub fn minify(content: MinifyType<'_>) -> Result<Vec<u8>, MinifyError> {
    match content {
        MinifyType::Html(html) => Ok(minify_html_inner(html)),
        MinifyType::Css(css) => {
            let css = std::str::from_utf8(css)?;
            minifier::css::minify(css)
                .map(|m| m.to_string().into_bytes())
                .map_err(|e| MinifyError::Css(e.to_string()))
        }
        MinifyType::Js(js) => {
            let js = std::str::from_utf8(js)?;
            Ok(minifier::js::minify(js).to_string().into_bytes())
        }
        MinifyType::Json(json) => {
            let json = std::str::from_utf8(json)?;
            Ok(minifier::json::minify(json).to_string().into_bytes())
        }
    }
}

/// Collapses whitespace but keeps closing tags, the `<html>`/`<head>`
/// opening tags and default attribute values.
fn minify_html_inner(html: &[u8]) -> Vec<u8> {
    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.keep_input_type_text_attr = true;
    cfg.keep_comments = false;
    cfg.minify_css = true;
    cfg.minify_js = true;
    minify_html::minify(html, &cfg)
}
