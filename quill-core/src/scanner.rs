use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Lists the regular files under `root`, depth first, with the entries of
/// every directory visited in lexical order.
///
/// This order is what the build treats as discovery order, so it does not
/// depend on how the file system happens to enumerate directories.
pub fn discover_files<P: AsRef<Path>>(root: P) -> Result<Vec<PathBuf>, walkdir::Error> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            paths.push(entry.into_path());
        }
    }
    Ok(paths)
}

/// Files that editors and version control leave behind in source trees.
pub fn is_ignored(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    name.ends_with('~') || name == ".DS_Store" || path.to_string_lossy().contains(".gitignore")
}

/// `path` relative to `root`, joined with forward slashes.
pub fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    Some(parts.join("/"))
}
