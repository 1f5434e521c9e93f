use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use url::Url;

/// Files that are copied under their own name instead of a fingerprinted one.
pub const DEFAULT_SKIP_FINGERPRINT: &[&str] = &["robots.txt"];

/// Build configuration, supplied once per build or serve call.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Title of the site, used in the feed.
    pub title: String,
    /// Name of the site author, used in the feed.
    pub author: String,
    /// Base URL of the site. Absolute URLs are derived from it in production.
    pub base_url: Url,
    /// Base URL of the primary site, used for links from the vanity site.
    pub primary_url: Url,
    /// Directory containing `pages`, `static` and `templates`.
    pub src: PathBuf,
    /// Directory the site is written to.
    pub dst: PathBuf,
    /// Production builds drop drafts and make URLs absolute.
    pub prod: bool,
    /// Don't write `feed.xml`.
    pub skip_feed: bool,
    /// Build the vanity import site flavor.
    pub vanity: bool,
    /// Static files (relative to the static root) that keep their name.
    pub skip_fingerprint: Vec<String>,
    /// Fixed `updated` stamp for the feed. `None` means the build time.
    #[serde(skip)]
    pub feed_updated: Option<DateTime<FixedOffset>>,
}

impl Default for Config {
    fn default() -> Self {
        let base = default_url();
        Self {
            title: "Quill".to_string(),
            author: "Quill".to_string(),
            base_url: base.clone(),
            primary_url: base,
            src: PathBuf::from("."),
            dst: PathBuf::from("./build"),
            prod: false,
            skip_feed: false,
            vanity: false,
            skip_fingerprint: DEFAULT_SKIP_FINGERPRINT
                .iter()
                .map(|s| s.to_string())
                .collect(),
            feed_updated: None,
        }
    }
}

impl Config {
    /// Config rooted at `src`, writing to `dst`, with every other field defaulted.
    pub fn new<S: AsRef<Path>, D: AsRef<Path>>(src: S, dst: D) -> Self {
        Self {
            src: src.as_ref().to_path_buf(),
            dst: dst.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn pages_dir(&self) -> PathBuf {
        self.src.join("pages")
    }

    pub fn static_dir(&self) -> PathBuf {
        self.src.join("static")
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.src.join("templates")
    }

    /// Roots the dev server watches for changes.
    pub fn source_dirs(&self) -> [PathBuf; 3] {
        [self.pages_dir(), self.static_dir(), self.templates_dir()]
    }

    pub fn skips_fingerprint(&self, relative: &str) -> bool {
        self.skip_fingerprint.iter().any(|s| s == relative)
    }
}

fn default_url() -> Url {
    Url::parse("https://example.com/").expect("default URL is valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.src, PathBuf::from("."));
        assert_eq!(config.dst, PathBuf::from("./build"));
        assert_eq!(config.base_url.as_str(), "https://example.com/");
        assert!(!config.prod);
        assert!(config.skips_fingerprint("robots.txt"));
        assert!(!config.skips_fingerprint("css/main.css"));
    }

    #[test]
    fn test_source_dirs() {
        let config = Config::new("/site", "/out");
        assert_eq!(
            config.source_dirs(),
            [
                PathBuf::from("/site/pages"),
                PathBuf::from("/site/static"),
                PathBuf::from("/site/templates"),
            ]
        );
    }
}
