//! Source watching and debounced rebuilds.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, error, warn};
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

/// Quiet period after the last qualifying change before a rebuild starts.
pub const DEBOUNCE: Duration = Duration::from_millis(250);

/// What happened to a watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Remove,
    Write,
    Chmod,
    Rename,
    Other,
}

impl From<&EventKind> for ChangeKind {
    fn from(kind: &EventKind) -> Self {
        match kind {
            EventKind::Create(_) => ChangeKind::Create,
            EventKind::Remove(_) => ChangeKind::Remove,
            EventKind::Modify(ModifyKind::Metadata(_)) => ChangeKind::Chmod,
            EventKind::Modify(ModifyKind::Name(_)) => ChangeKind::Rename,
            EventKind::Modify(_) => ChangeKind::Write,
            _ => ChangeKind::Other,
        }
    }
}

/// Whether a change to `path` should trigger a rebuild.
pub fn should_rebuild(path: &Path, kind: ChangeKind) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();

    // Finder metadata, Vim's write probe and Vim backups.
    if name == ".DS_Store" || name == "4913" || name.ends_with('~') {
        return false;
    }

    matches!(
        kind,
        ChangeKind::Create | ChangeKind::Remove | ChangeKind::Write
    )
}

/// Recursive watches over the site sources. Events stop when this is dropped.
pub struct SourceWatcher {
    _watcher: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<notify::Result<Event>>,
}

impl SourceWatcher {
    /// Watches every existing directory in `dirs`.
    pub fn new(dirs: &[PathBuf]) -> Result<Self> {
        let (tx, events) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        })
        .context("failed to create file watcher")?;

        for dir in dirs {
            if !dir.exists() {
                warn!("Not watching {}: no such directory", dir.display());
                continue;
            }
            watcher
                .watch(dir, RecursiveMode::Recursive)
                .with_context(|| format!("failed to watch {}", dir.display()))?;
            debug!("Watching {}", dir.display());
        }

        Ok(Self {
            _watcher: watcher,
            events,
        })
    }

    #[cfg(test)]
    fn from_channel(
        watcher: RecommendedWatcher,
        events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    ) -> Self {
        Self {
            _watcher: watcher,
            events,
        }
    }
}

/// Calls `rebuild` once changes have settled for [`DEBOUNCE`], until `token`
/// is cancelled or the watcher goes away.
///
/// Every qualifying event pushes the deadline back. Rebuilds run on the
/// blocking pool and are awaited, so they never overlap; events arriving
/// during a rebuild schedule the next one.
pub async fn debounce<F>(mut watcher: SourceWatcher, token: CancellationToken, rebuild: F)
where
    F: Fn() + Send + Sync + 'static,
{
    let rebuild = Arc::new(rebuild);
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            event = watcher.events.recv() => match event {
                None => break,
                Some(Err(e)) => warn!("Watch error: {e}"),
                Some(Ok(event)) => {
                    let kind = ChangeKind::from(&event.kind);
                    if let Some(path) = event.paths.iter().find(|p| should_rebuild(p, kind)) {
                        debug!("{kind:?} {}", path.display());
                        deadline = Some(Instant::now() + DEBOUNCE);
                    }
                }
            },
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                let rebuild = Arc::clone(&rebuild);
                if let Err(e) = tokio::task::spawn_blocking(move || (*rebuild)()).await {
                    error!("Rebuild task failed: {e}");
                }
            }
        }
    }
}
