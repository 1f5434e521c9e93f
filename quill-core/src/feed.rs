//! Atom feed of the site's posts.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use atom_syndication::{Content, Entry, Feed, Link, Person, Text};
use chrono::{DateTime, FixedOffset, NaiveTime, Utc};
use thiserror::Error;

use crate::config::Config;
use crate::links::{is_full_url, join_url};
use crate::page::Page;

/// Name of the feed file in the output root.
pub const FEED_FILE: &str = "feed.xml";

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write feed: {0}")]
    Atom(#[from] atom_syndication::Error),
}

/// Absolute link to a post: its permalink on `base_url`, with a trailing
/// slash unless it names an `.html` file.
pub fn entry_link(config: &Config, permalink: &str) -> String {
    let mut link = if is_full_url(permalink) {
        permalink.to_string()
    } else {
        join_url(&config.base_url, permalink)
    };
    if !link.ends_with(".html") && !link.ends_with('/') {
        link.push('/');
    }
    link
}

fn author(config: &Config) -> Vec<Person> {
    vec![Person {
        name: config.author.clone(),
        ..Default::default()
    }]
}

/// Builds the feed from `pages` in their given order. Only posts are
/// included, and drafts are left out of production builds.
pub fn feed(config: &Config, pages: &[Page]) -> Feed {
    let stamp: DateTime<FixedOffset> = config
        .feed_updated
        .unwrap_or_else(|| Utc::now().fixed_offset());

    let entries = pages
        .iter()
        .filter(|page| page.is_post() && !(page.draft && config.prod))
        .map(|page| {
            let link = entry_link(config, &page.permalink);
            let date = page
                .date
                .map(|d| d.and_time(NaiveTime::MIN).and_utc().fixed_offset())
                .unwrap_or(stamp);

            Entry {
                title: Text::plain(page.title.clone()),
                id: link.clone(),
                updated: date,
                published: Some(date),
                authors: author(config),
                links: vec![Link {
                    href: link,
                    ..Default::default()
                }],
                summary: (!page.summary.is_empty()).then(|| Text::plain(page.summary.clone())),
                content: Some(Content {
                    value: Some(page.content.clone()),
                    content_type: Some("html".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }
        })
        .collect();

    Feed {
        title: Text::plain(config.title.clone()),
        id: config.base_url.to_string(),
        updated: stamp,
        authors: author(config),
        links: vec![Link {
            href: config.base_url.to_string(),
            ..Default::default()
        }],
        entries,
        ..Default::default()
    }
}

/// Writes the feed document to `w`.
pub fn write_feed<W: Write>(config: &Config, pages: &[Page], w: W) -> Result<(), FeedError> {
    feed(config, pages).write_to(w)?;
    Ok(())
}

/// Writes the feed to `feed.xml` under `dst`.
pub fn write_feed_file(config: &Config, pages: &[Page], dst: &Path) -> Result<(), FeedError> {
    let path = dst.join(FEED_FILE);
    let file = File::create(&path).map_err(|source| FeedError::Io {
        path: path.clone(),
        source,
    })?;
    let mut w = BufWriter::new(file);
    write_feed(config, pages, &mut w)?;
    w.flush().map_err(|source| FeedError::Io { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn page(title: &str, kind: &str, permalink: &str, date: Option<&str>, draft: bool) -> Page {
        let date = date.map_or("null".to_string(), |d| format!("\"{d}\""));
        let source = format!(
            "{{\n\"title\": \"{title}\", \"type\": \"{kind}\", \"template\": \"t\", \"permalink\": \"{permalink}\", \"date\": {date}, \"draft\": {draft}, \"summary\": \"About {title}\"\n}}\n<p>{title} body</p>"
        );
        Page::parse("p.html", source.as_bytes()).unwrap()
    }

    fn config() -> Config {
        Config {
            title: "Example".to_string(),
            author: "Jane".to_string(),
            base_url: Url::parse("https://example.com").unwrap(),
            feed_updated: Some(DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z").unwrap()),
            ..Config::default()
        }
    }

    #[test]
    fn test_entry_link() {
        let c = config();
        assert_eq!(entry_link(&c, "/posts/hello"), "https://example.com/posts/hello/");
        assert_eq!(entry_link(&c, "/posts/hello/"), "https://example.com/posts/hello/");
        assert_eq!(entry_link(&c, "/old.html"), "https://example.com/old.html");
        assert_eq!(entry_link(&c, "/"), "https://example.com/");
    }

    #[test]
    fn test_feed_entries() {
        let pages = vec![
            page("Newer", "post", "/newer", Some("2024-02-01"), false),
            page("About", "page", "/about", None, false),
            page("Older", "post", "/older", Some("2023-01-01"), false),
            page("Undated", "post", "/undated", None, false),
        ];
        let feed = feed(&config(), &pages);

        assert_eq!(feed.title.as_str(), "Example");
        assert_eq!(feed.id, "https://example.com/");
        assert_eq!(feed.authors[0].name, "Jane");
        let titles: Vec<_> = feed.entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Newer", "Older", "Undated"]);

        let newer = &feed.entries[0];
        assert_eq!(newer.id, "https://example.com/newer/");
        assert_eq!(newer.links[0].href, "https://example.com/newer/");
        assert_eq!(newer.updated.to_rfc3339(), "2024-02-01T00:00:00+00:00");
        assert_eq!(newer.summary.as_ref().unwrap().as_str(), "About Newer");
        assert_eq!(
            newer.content.as_ref().unwrap().value.as_deref(),
            Some("<p>Newer body</p>\n")
        );

        assert_eq!(feed.entries[2].updated, feed.updated);
    }

    #[test]
    fn test_drafts_only_in_dev() {
        let pages = vec![
            page("Draft", "post", "/draft", Some("2024-01-01"), true),
            page("Live", "post", "/live", Some("2023-01-01"), false),
        ];
        assert_eq!(feed(&config(), &pages).entries.len(), 2);

        let prod = Config {
            prod: true,
            ..config()
        };
        let feed = feed(&prod, &pages);
        assert_eq!(feed.entries.len(), 1);
        assert_eq!(feed.entries[0].title.as_str(), "Live");
    }

    #[test]
    fn test_write_feed_file() {
        let dir = tempfile::tempdir().unwrap();
        let pages = vec![page("Hello", "post", "/hello", Some("2024-02-01"), false)];
        write_feed_file(&config(), &pages, dir.path()).unwrap();

        let xml = std::fs::read_to_string(dir.path().join(FEED_FILE)).unwrap();
        assert!(xml.contains("<feed"));
        assert!(xml.contains("http://www.w3.org/2005/Atom"));
        assert!(xml.contains(">Hello</title>"));
        assert!(xml.contains("https://example.com/hello/"));
    }

    #[test]
    fn test_write_feed_file_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_feed_file(&config(), &[], &dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, FeedError::Io { .. }));
    }
}
