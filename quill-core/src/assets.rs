//! Static asset fingerprinting and copying.
//!
//! Assets are processed in two passes. [`AssetMap::hash_tree`] runs before any
//! page is rendered so the `static` template helper can resolve fingerprinted
//! names; [`copy_tree`] runs last and writes the (minified) files out.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

use crate::config::Config;
use crate::minify::{MinifyError, MinifyType, minify};
use crate::scanner::{discover_files, is_ignored, relative_slash_path};

/// Number of hex digits of the content digest kept in file names.
const HASH_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to walk static files: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("{}: {source}", path.display())]
    Minify {
        path: PathBuf,
        #[source]
        source: MinifyError,
    },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> AssetError + '_ {
    move |source| AssetError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Hex content digest used in fingerprinted names.
pub fn fingerprint(content: &[u8]) -> String {
    let mut hex = blake3::hash(content).to_hex().to_string();
    hex.truncate(HASH_LEN);
    hex
}

/// Inserts `-<hash>` before the extension of the last path segment, or
/// appends it when there is none.
pub fn fingerprinted_name(relative: &str, hash: &str) -> String {
    let (dir, file) = match relative.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, relative),
    };

    let file = match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}-{hash}.{ext}"),
        _ => format!("{file}-{hash}"),
    };

    match dir {
        Some(dir) => format!("{dir}/{file}"),
        None => file,
    }
}

/// Source-relative path to fingerprinted path, both slash separated and
/// relative to their roots.
#[derive(Debug, Clone, Default)]
pub struct AssetMap {
    entries: BTreeMap<String, String>,
}

impl AssetMap {
    /// Hashes every static file under `root` that is neither ignored nor
    /// listed in the config's skip list. A missing root yields an empty map.
    pub fn hash_tree(root: &Path, config: &Config) -> Result<Self, AssetError> {
        let mut map = Self::default();
        if !root.exists() {
            debug!("No static directory at {}", root.display());
            return Ok(map);
        }

        for path in discover_files(root)? {
            if is_ignored(&path) {
                continue;
            }
            let Some(relative) = relative_slash_path(root, &path) else {
                continue;
            };
            if config.skips_fingerprint(&relative) {
                continue;
            }

            let content = fs::read(&path).map_err(io_error(&path))?;
            let name = fingerprinted_name(&relative, &fingerprint(&content));
            debug!("Fingerprinted {relative} as {name}");
            map.entries.insert(relative, name);
        }

        Ok(map)
    }

    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, relative: K, fingerprinted: V) {
        self.entries.insert(relative.into(), fingerprinted.into());
    }

    /// Fingerprinted name of a source-relative path.
    pub fn get(&self, relative: &str) -> Option<&str> {
        self.entries.get(relative).map(String::as_str)
    }

    /// Resolves a site path such as `/css/main.css` to its fingerprinted site
    /// path, e.g. `/css/main-0123456789abcdef.css`.
    pub fn resolve(&self, path: &str) -> Option<String> {
        self.get(path.trim_start_matches('/'))
            .map(|name| format!("/{name}"))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Copies every static file under `root` into `dst`, under its fingerprinted
/// name when it has one, minifying stylesheets, scripts and JSON on the way.
/// Returns the number of files written.
pub fn copy_tree(root: &Path, dst: &Path, assets: &AssetMap) -> Result<usize, AssetError> {
    if !root.exists() {
        return Ok(0);
    }

    let mut copied = 0;
    for path in discover_files(root)? {
        if is_ignored(&path) {
            continue;
        }
        let Some(relative) = relative_slash_path(root, &path) else {
            continue;
        };

        let content = fs::read(&path).map_err(io_error(&path))?;
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let minified = match MinifyType::for_extension(&ext, &content) {
            Some(kind) => Some(minify(kind).map_err(|source| AssetError::Minify {
                path: path.clone(),
                source,
            })?),
            None => None,
        };
        let content = minified.unwrap_or(content);

        let target = dst.join(assets.get(&relative).unwrap_or(relative.as_str()));
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        fs::write(&target, content).map_err(io_error(&target))?;
        debug!("Copied {} to {}", path.display(), target.display());
        copied += 1;
    }

    Ok(copied)
}
