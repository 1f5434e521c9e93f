use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::links::{clean_path, is_full_url, validate_permalink};

/// Content type assigned to pages that don't declare one.
pub const DEFAULT_PAGE_TYPE: &str = "page";

#[derive(Debug, Error)]
pub enum PageError {
    #[error("{}: format unsupported", path.display())]
    UnsupportedFormat { path: PathBuf },
    #[error("{}: missing front matter", path.display())]
    MissingFrontMatter { path: PathBuf },
    #[error("{}: failed to parse front matter: {source}", path.display())]
    FrontMatterParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(
        "{}: missing required front matter parameter (title, template, permalink)",
        path.display()
    )]
    MissingParameter { path: PathBuf },
    #[error("{}: invalid permalink: {reason}", path.display())]
    InvalidPermalink { path: PathBuf, reason: String },
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Source formats a page can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Html,
    Markdown,
}

impl Format {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "html" => Some(Format::Html),
            "md" => Some(Format::Markdown),
            _ => None,
        }
    }
}

/// A content file. The public fields are the front matter; `content` holds
/// the body and is rewritten in place by each render stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Page {
    /// Page title, required.
    pub title: String,
    /// Output URL of the page, required.
    pub permalink: String,
    /// Name of the layout that wraps the page, required.
    pub template: String,
    /// Kind of page, `page` unless set. Posts go into the feed.
    #[serde(rename = "type")]
    pub kind: String,
    /// Publication date, `YYYY-MM-DD`.
    pub date: Option<NaiveDate>,
    /// Drafts are left out of production builds.
    pub draft: bool,
    /// Render without the surrounding chrome (header, footer).
    pub content_only: bool,
    /// Used as the feed summary and the description meta tag.
    pub summary: String,
    /// Extra `<meta name content>` pairs.
    pub meta_tags: BTreeMap<String, String>,
    /// Extra stylesheets to load.
    pub css: Vec<String>,
    /// Extra scripts to load.
    pub js: Vec<String>,

    #[serde(skip_deserializing)]
    pub content: String,
    #[serde(skip)]
    path: PathBuf,
    #[serde(skip)]
    dst_path: PathBuf,
}

impl Page {
    /// Reads and parses the content file at `path`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PageError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|source| PageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, file)
    }

    /// Parses a content file read from `reader`. `path` is the declared
    /// source path; it decides the format and tags every error.
    pub fn parse<P: AsRef<Path>, R: Read>(path: P, mut reader: R) -> Result<Self, PageError> {
        let path = path.as_ref().to_path_buf();

        if Format::from_path(&path).is_none() {
            return Err(PageError::UnsupportedFormat { path });
        }

        let mut text = String::new();
        if let Err(source) = reader.read_to_string(&mut text) {
            return Err(PageError::Io { path, source });
        }

        let Some((front_matter, body)) = split_front_matter(&text) else {
            return Err(PageError::MissingFrontMatter { path });
        };

        let mut page: Page = match serde_json::from_str(&front_matter) {
            Ok(page) => page,
            Err(source) => return Err(PageError::FrontMatterParse { path, source }),
        };

        if page.kind.is_empty() {
            page.kind = DEFAULT_PAGE_TYPE.to_string();
        }

        if page.title.is_empty() || page.template.is_empty() || page.permalink.is_empty() {
            return Err(PageError::MissingParameter { path });
        }
        if let Err(reason) = validate_permalink(&page.permalink) {
            return Err(PageError::InvalidPermalink { path, reason });
        }

        page.dst_path = destination_path(&page.permalink);
        page.content = body;
        page.path = path;

        Ok(page)
    }

    /// Path of the source file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Output path, relative to the destination root.
    pub fn dst_path(&self) -> &Path {
        &self.dst_path
    }

    pub fn format(&self) -> Format {
        // parse() only accepts pages with a known format
        Format::from_path(&self.path).unwrap_or(Format::Html)
    }

    pub fn is_post(&self) -> bool {
        self.kind == "post"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    BeforeBlock,
    InBlock,
    InBody,
}

const OPEN_DELIM: &str = "{";
const CLOSE_DELIM: &str = "}";

/// Splits a content file into its front matter block and body.
///
/// Lines before the first line consisting solely of `{` are dropped, which
/// leaves room for a leading comment such as an editor modeline. The block
/// runs up to and including the first line consisting solely of `}`; every
/// line after it is body, even one that looks like a delimiter.
///
/// Returns `None` when no closed block is found.
pub fn split_front_matter(text: &str) -> Option<(String, String)> {
    let mut state = Scan::BeforeBlock;
    let mut front_matter = String::new();
    let mut body = String::new();

    for line in text.lines() {
        state = match (state, line) {
            (Scan::BeforeBlock, OPEN_DELIM) => {
                push_line(&mut front_matter, line);
                Scan::InBlock
            }
            (Scan::BeforeBlock, _) => Scan::BeforeBlock,
            (Scan::InBlock, CLOSE_DELIM) => {
                push_line(&mut front_matter, line);
                Scan::InBody
            }
            (Scan::InBlock, _) => {
                push_line(&mut front_matter, line);
                Scan::InBlock
            }
            (Scan::InBody, _) => {
                push_line(&mut body, line);
                Scan::InBody
            }
        };
    }

    (state == Scan::InBody).then_some((front_matter, body))
}

fn push_line(buf: &mut String, line: &str) {
    buf.push_str(line);
    buf.push('\n');
}

/// Maps a permalink to an output path relative to the destination root.
///
/// `/` becomes `index.html`, permalinks ending in `.html` are kept, and every
/// other permalink gets `/index.html` appended.
pub fn destination_path(permalink: &str) -> PathBuf {
    let path = if is_full_url(permalink) {
        url::Url::parse(permalink)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| permalink.to_string())
    } else {
        permalink.to_string()
    };

    let dst = if path.ends_with(".html") {
        path
    } else if path == "/" {
        "/index.html".to_string()
    } else {
        format!("{path}/index.html")
    };

    PathBuf::from(clean_path(&dst).trim_start_matches('/'))
}
