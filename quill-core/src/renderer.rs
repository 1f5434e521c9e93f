//! Turns a parsed page into the bytes of its output file.

use std::borrow::Cow;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;
use tera::Context;
use thiserror::Error;

use crate::helpers::RenderContext;
use crate::markdown::render_markdown;
use crate::minify::{MinifyError, MinifyType, minify};
use crate::page::{Format, Page};
use crate::template::{TemplateError, TemplateSet, error_chain, render_body};

static HTML_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("comment pattern is valid"));

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("{}: failed to execute page body: {}", path.display(), error_chain(source))]
    Body {
        path: PathBuf,
        #[source]
        source: tera::Error,
    },
    #[error("{}: {source}", path.display())]
    Layout {
        path: PathBuf,
        #[source]
        source: TemplateError,
    },
    #[error("{}: {source}", path.display())]
    Minify {
        path: PathBuf,
        #[source]
        source: MinifyError,
    },
    #[error("{}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Removes every `<!-- ... -->` span. Comments do not nest.
pub fn strip_comments(html: &str) -> Cow<'_, str> {
    HTML_COMMENT.replace_all(html, "")
}

fn page_context(page: &Page, site: &Value) -> Context {
    let mut context = Context::new();
    context.insert("page", page);
    context.insert("site", site);
    context
}

/// Renders `page` and writes the minified result to `out`.
///
/// The body is executed as a template first, then converted from Markdown
/// if the source was Markdown, stripped of HTML comments and finally wrapped
/// in the page's layout. `page.content` holds the processed body afterwards,
/// which is what the layout sees through `content(page=page)`.
pub fn render_page<W: Write>(
    page: &mut Page,
    templates: &TemplateSet,
    helpers: &Arc<RenderContext>,
    site: &Value,
    mut out: W,
) -> Result<(), RenderError> {
    let body = render_body(&page.content, &page_context(page, site), helpers).map_err(
        |source| RenderError::Body {
            path: page.path().to_path_buf(),
            source,
        },
    )?;

    let body = match page.format() {
        Format::Markdown => render_markdown(&body),
        Format::Html => body,
    };
    page.content = strip_comments(&body).into_owned();

    let html = templates
        .render(&page.template, &page_context(page, site))
        .map_err(|source| RenderError::Layout {
            path: page.path().to_path_buf(),
            source,
        })?;

    let minified = minify(MinifyType::Html(html.as_bytes())).map_err(|source| {
        RenderError::Minify {
            path: page.path().to_path_buf(),
            source,
        }
    })?;

    out.write_all(&minified)
        .map_err(|source| RenderError::Write {
            path: page.path().to_path_buf(),
            source,
        })
}
