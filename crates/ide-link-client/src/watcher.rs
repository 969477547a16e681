//! Filesystem observer for the editor's discovery file
//!
//! Publishes change/remove events for the metadata file on a channel so the
//! session manager can consume them serially; connection mutations therefore
//! never race the watcher's callback thread.

use ide_link_core::{LinkError, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use tokio::sync::mpsc;
use tracing::warn;

/// What happened to the metadata file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaFileEvent {
    /// Created or modified
    Changed,
    /// Deleted
    Removed,
}

/// Watches the project tree for the metadata file.
///
/// The watch is recursive from the project root because the metadata
/// directory itself may not exist yet when the session starts; events for
/// other paths are filtered out. Dropping the watcher stops it.
pub struct MetaFileWatcher {
    _watcher: RecommendedWatcher,
}

impl MetaFileWatcher {
    pub fn spawn(
        watch_root: &Path,
        meta_file_path: &Path,
    ) -> Result<(Self, mpsc::UnboundedReceiver<MetaFileEvent>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let meta_file_path = meta_file_path.to_path_buf();

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    warn!("Metadata watcher error: {e}");
                    return;
                }
            };
            if !event.paths.iter().any(|path| path == &meta_file_path) {
                return;
            }
            let mapped = match event.kind {
                EventKind::Create(_) | EventKind::Modify(_) => MetaFileEvent::Changed,
                EventKind::Remove(_) => MetaFileEvent::Removed,
                _ => return,
            };
            // The receiver going away just means the session was disposed.
            let _ = tx.send(mapped);
        })
        .map_err(|e| LinkError::Watch(e.to_string()))?;

        watcher
            .watch(watch_root, RecursiveMode::Recursive)
            .map_err(|e| LinkError::Watch(e.to_string()))?;

        Ok((Self { _watcher: watcher }, rx))
    }
}
