use crate::error::Result;
use crate::resolver::TRACKED_FILES;
use crate::switcher::Switcher;
use notify::event::ModifyKind;
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Recursive watch over every workspace root, reporting changes to tracked files only.
pub struct WorkspaceWatcher {
    _watcher: RecommendedWatcher,
    changes: mpsc::UnboundedReceiver<PathBuf>,
}

impl WorkspaceWatcher {
    pub fn new(roots: &[PathBuf]) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let Ok(event) = res else { return };
                if let Some(path) = tracked_change(&event) {
                    let _ = tx.send(path);
                }
            },
            NotifyConfig::default(),
        )?;

        for root in roots {
            watcher.watch(root, RecursiveMode::Recursive)?;
            debug!("Watching {}", root.display());
        }

        Ok(Self {
            _watcher: watcher,
            changes: rx,
        })
    }

    /// Next changed tracked file, in arrival order.
    pub async fn next_change(&mut self) -> Option<PathBuf> {
        self.changes.recv().await
    }
}

pub fn is_tracked(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| TRACKED_FILES.contains(&name))
        .unwrap_or(false)
}

/// The tracked path touched by a create, content change or removal.
pub fn tracked_change(event: &Event) -> Option<PathBuf> {
    match event.kind {
        EventKind::Create(_) | EventKind::Remove(_) => {}
        EventKind::Modify(ModifyKind::Metadata(_)) => return None,
        EventKind::Modify(_) => {}
        _ => return None,
    }

    event.paths.iter().find(|p| is_tracked(p)).cloned()
}

/// Re-run the switch silently for every tracked change until Ctrl-C.
///
/// Changes are handled one at a time in arrival order; a burst of edits
/// produces one run per event.
pub async fn watch(switcher: &Switcher, roots: &[PathBuf], watcher: WorkspaceWatcher) {
    watch_until(switcher, roots, watcher, tokio::signal::ctrl_c()).await
}

/// The watch loop, stopping once `shutdown` completes.
///
/// `shutdown` is created once and polled across iterations, so a signal
/// that lands while a switch is running still ends the loop afterwards.
pub async fn watch_until<F>(
    switcher: &Switcher,
    roots: &[PathBuf],
    mut watcher: WorkspaceWatcher,
    shutdown: F,
) where
    F: Future,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            change = watcher.next_change() => {
                let Some(path) = change else { break };
                info!("{} changed", path.display());
                switcher.on_tracked_file_changed(roots).await;
            }
        }
    }
}
