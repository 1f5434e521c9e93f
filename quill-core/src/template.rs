use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use tera::{Context, Tera};
use thiserror::Error;

use crate::helpers::{self, RenderContext};
use crate::scanner::{discover_files, is_ignored, relative_slash_path};

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to walk templates: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("failed to parse templates: {}", error_chain(.0))]
    Parse(#[source] tera::Error),
    #[error("no such template {name:?}")]
    Unknown { name: String },
    #[error("failed to execute template {name:?}: {}", error_chain(source))]
    Render {
        name: String,
        #[source]
        source: tera::Error,
    },
}

/// Joins an error with all of its causes. Tera keeps the useful part of a
/// failure (the offending expression) in the source chain.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Every layout under the templates directory, named by its slash separated
/// path without the `.html` extension (`templates/blog/post.html` is
/// `blog/post`).
pub struct TemplateSet {
    tera: Tera,
    names: BTreeSet<String>,
}

impl TemplateSet {
    pub fn load(root: &Path) -> Result<Self, TemplateError> {
        let mut templates = Vec::new();
        for path in discover_files(root)? {
            if is_ignored(&path) || path.extension().is_none_or(|ext| ext != "html") {
                continue;
            }
            let Some(relative) = relative_slash_path(root, &path) else {
                continue;
            };
            let name = relative.strip_suffix(".html").unwrap_or(&relative).to_string();
            let source = std::fs::read_to_string(&path).map_err(|source| TemplateError::Io {
                path: path.clone(),
                source,
            })?;
            debug!("Loaded template {name} from {}", path.display());
            templates.push((name, source));
        }

        let names = templates.iter().map(|(name, _)| name.clone()).collect();
        let mut tera = Tera::default();
        // Names carry no extension, but be explicit: output is raw HTML.
        tera.autoescape_on(vec![]);
        tera.add_raw_templates(templates)
            .map_err(TemplateError::Parse)?;

        Ok(Self { tera, names })
    }

    /// Makes the helper functions available to every layout.
    pub fn install_helpers(&mut self, ctx: Arc<RenderContext>) {
        helpers::register(&mut self.tera, ctx);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn render(&self, name: &str, context: &Context) -> Result<String, TemplateError> {
        if !self.contains(name) {
            return Err(TemplateError::Unknown {
                name: name.to_string(),
            });
        }
        self.tera
            .render(name, context)
            .map_err(|source| TemplateError::Render {
                name: name.to_string(),
                source,
            })
    }
}

/// Renders a page body as a one-off template with the helper set installed.
pub fn render_body(
    source: &str,
    context: &Context,
    ctx: &Arc<RenderContext>,
) -> Result<String, tera::Error> {
    let mut tera = Tera::default();
    tera.autoescape_on(vec![]);
    helpers::register(&mut tera, Arc::clone(ctx));
    tera.render_str(source, context)
}
