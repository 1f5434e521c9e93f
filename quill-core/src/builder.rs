use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};
use thiserror::Error;

use crate::assets::{AssetError, AssetMap, copy_tree};
use crate::config::Config;
use crate::feed::{FeedError, write_feed_file};
use crate::helpers::RenderContext;
use crate::page::{Page, PageError};
use crate::renderer::{RenderError, render_page};
use crate::scanner::{discover_files, is_ignored};
use crate::template::{TemplateError, TemplateSet};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Page(#[from] PageError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error("failed to walk pages: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("failed to snapshot pages: {0}")]
    Snapshot(#[from] serde_json::Error),
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> BuildError + '_ {
    move |source| BuildError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Summary of a finished build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub pages: usize,
    pub assets: usize,
    pub feed: bool,
    pub elapsed: Duration,
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pages, {} static files{} in {:.2?}",
            self.pages,
            self.assets,
            if self.feed { ", feed" } else { "" },
            self.elapsed
        )
    }
}

/// Builds the site described by `config` into `config.dst`.
///
/// Templates, pages and static asset hashes are all loaded before the
/// destination is touched, so a site that fails to parse leaves the previous
/// output in place. Once the destination has been cleared, a failure leaves
/// whatever was written so far.
pub fn build(config: &Config) -> Result<BuildReport, BuildError> {
    let started = Instant::now();

    let mut templates = TemplateSet::load(&config.templates_dir())?;
    debug!("Loaded {} templates", templates.len());

    let mut pages = load_pages(&config.pages_dir(), config.prod)?;
    sort_pages(&mut pages);
    debug!("Loaded {} pages", pages.len());

    check_templates(&pages, &templates)?;

    let static_dir = config.static_dir();
    let assets = AssetMap::hash_tree(&static_dir, config)?;
    debug!("Fingerprinted {} static files", assets.len());

    let helpers = Arc::new(RenderContext::new(config.clone(), assets.clone(), &pages)?);
    templates.install_helpers(Arc::clone(&helpers));
    let site = serde_json::to_value(config)?;

    clear_output(&config.dst)?;

    for page in &mut pages {
        let target = config.dst.join(page.dst_path());
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        let mut w = BufWriter::new(File::create(&target).map_err(io_error(&target))?);
        render_page(page, &templates, &helpers, &site, &mut w)?;
        w.flush().map_err(io_error(&target))?;
        debug!("Wrote {} to {}", page.path().display(), target.display());
    }

    let feed = !config.skip_feed;
    if feed {
        write_feed_file(config, &pages, &config.dst)?;
    }

    let copied = copy_tree(&static_dir, &config.dst, &assets)?;

    let report = BuildReport {
        pages: pages.len(),
        assets: copied,
        feed,
        elapsed: started.elapsed(),
    };
    info!("Built {} into {}", report, config.dst.display());
    Ok(report)
}

/// Fails on the first page naming a layout that `templates` does not have.
fn check_templates(pages: &[Page], templates: &TemplateSet) -> Result<(), RenderError> {
    match pages.iter().find(|p| !templates.contains(&p.template)) {
        Some(page) => Err(RenderError::Layout {
            path: page.path().to_path_buf(),
            source: TemplateError::Unknown {
                name: page.template.clone(),
            },
        }),
        None => Ok(()),
    }
}

/// Parses every content file under `root` in discovery order. Drafts are
/// left out when `prod` is set.
pub fn load_pages(root: &Path, prod: bool) -> Result<Vec<Page>, BuildError> {
    let mut pages = Vec::new();
    for path in discover_files(root)? {
        if is_ignored(&path) {
            continue;
        }
        let page = Page::from_file(&path)?;
        if page.draft && prod {
            debug!("Skipping draft {}", path.display());
            continue;
        }
        pages.push(page);
    }
    Ok(pages)
}

/// Newest first; pages without a date keep their relative order after all
/// dated ones.
pub fn sort_pages(pages: &mut [Page]) {
    pages.sort_by(|a, b| match (a.date, b.date) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

fn clear_output(dst: &Path) -> Result<(), BuildError> {
    match fs::remove_dir_all(dst) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(io_error(dst)(e)),
    }
    fs::create_dir_all(dst).map_err(io_error(dst))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(title: &str, date: Option<&str>) -> Page {
        let date = date.map_or("null".to_string(), |d| format!("\"{d}\""));
        let source = format!(
            "{{\n\"title\": \"{title}\", \"template\": \"t\", \"permalink\": \"/{title}\", \"date\": {date}\n}}\n"
        );
        Page::parse("p.html", source.as_bytes()).unwrap()
    }

    fn titles(pages: &[Page]) -> Vec<&str> {
        pages.iter().map(|p| p.title.as_str()).collect()
    }

    #[test]
    fn test_sort_pages() {
        let mut pages = vec![
            page("a", None),
            page("b", Some("2020-01-01")),
            page("c", None),
            page("d", Some("2022-06-01")),
            page("e", Some("2020-01-01")),
        ];
        sort_pages(&mut pages);
        assert_eq!(titles(&pages), vec!["d", "b", "e", "a", "c"]);
    }

    #[test]
    fn test_load_pages_skips_drafts_in_prod() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("draft.html"),
            "{\n\"title\": \"Draft\", \"template\": \"t\", \"permalink\": \"/draft\", \"draft\": true\n}\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("live.html"),
            "{\n\"title\": \"Live\", \"template\": \"t\", \"permalink\": \"/live\"\n}\n",
        )
        .unwrap();
        fs::write(dir.path().join("live.html~"), "backup").unwrap();

        assert_eq!(titles(&load_pages(dir.path(), false).unwrap()), vec!["Draft", "Live"]);
        assert_eq!(titles(&load_pages(dir.path(), true).unwrap()), vec!["Live"]);
    }

    #[test]
    fn test_load_pages_rejects_unknown_format() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        let err = load_pages(dir.path(), false).unwrap_err();
        assert!(matches!(err, BuildError::Page(PageError::UnsupportedFormat { .. })));
    }

    #[test]
    fn test_report_display() {
        let report = BuildReport {
            pages: 3,
            assets: 2,
            feed: true,
            elapsed: Duration::from_millis(5),
        };
        assert!(report.to_string().starts_with("3 pages, 2 static files, feed in "));
    }
}
