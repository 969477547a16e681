//! Session manager: discovery, connection lifecycle, reconnection
//!
//! A session watches the project's metadata file and keeps at most one live
//! [`Peer`] at a time. Metadata changes supersede whatever connection or
//! connection attempt is in flight; all lifecycle mutations go through the
//! session state mutex, and watcher events are consumed serially by one task.

use crate::handler::MessageHandler;
use crate::peer::Peer;
use crate::watcher::{MetaFileEvent, MetaFileWatcher};
use ide_link_core::{ConnectionMetadata, META_FILE_NAME, MessageContent, Result, metadata_dir};
use semver::Version;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Fixed number of connection tries per metadata change
const CONNECT_ATTEMPTS: u32 = 3;

/// Configuration for an editor session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Identity announced in our handshake line
    pub identity: String,
    /// Project root; the metadata directory lives beneath it
    pub project_dir: PathBuf,
    /// Editor version hint, which picks the metadata directory layout
    pub editor_version: Version,
    /// Timeout for each TCP connect try
    pub connect_timeout: Duration,
    /// Pause between connect tries (not before the first)
    pub retry_delay: Duration,
}

impl SessionConfig {
    pub fn new(
        identity: impl Into<String>,
        project_dir: impl Into<PathBuf>,
        editor_version: Version,
    ) -> Self {
        Self {
            identity: identity.into(),
            project_dir: project_dir.into(),
            editor_version,
            connect_timeout: Duration::from_secs(10),
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// Deduplicates redundant filesystem events by modification timestamp.
#[derive(Debug, Default)]
struct MtimeTracker {
    last: Option<SystemTime>,
}

impl MtimeTracker {
    /// True when the file's mtime differs from the last observed one (which
    /// is then recorded).
    fn changed(&mut self, path: &Path) -> std::io::Result<bool> {
        let mtime = std::fs::metadata(path)?.modified()?;
        if self.last == Some(mtime) {
            return Ok(false);
        }
        self.last = Some(mtime);
        Ok(true)
    }
}

#[derive(Default)]
struct SessionState {
    disposed: bool,
    metadata: Option<ConnectionMetadata>,
    mtime: MtimeTracker,
    peer: Option<Arc<Peer>>,
    watcher: Option<MetaFileWatcher>,
    event_task: Option<JoinHandle<()>>,
    connect_task: Option<JoinHandle<()>>,
    /// Bumped on every new connect trigger; a superseded attempt notices its
    /// stale generation and stands down instead of installing a second peer.
    generation: u64,
}

struct SessionInner {
    config: SessionConfig,
    meta_file_path: PathBuf,
    handler: Arc<dyn MessageHandler>,
    state: Mutex<SessionState>,
}

/// Owning handle for one editor session: create → [`start`](Session::start) →
/// [`dispose`](Session::dispose).
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    pub fn new(config: SessionConfig, handler: Arc<dyn MessageHandler>) -> Self {
        let meta_file_path =
            metadata_dir(&config.project_dir, &config.editor_version).join(META_FILE_NAME);
        Self {
            inner: Arc::new(SessionInner {
                config,
                meta_file_path,
                handler,
                state: Mutex::new(SessionState::default()),
            }),
        }
    }

    /// Where this session expects the editor's discovery file.
    pub fn meta_file_path(&self) -> &Path {
        &self.inner.meta_file_path
    }

    /// Begin watching the metadata file and connect if it already points at a
    /// running editor. A missing file is not an error; the watcher will fire
    /// once the editor writes it.
    pub async fn start(&self) -> Result<()> {
        {
            let mut state = self.inner.state.lock().await;
            if state.disposed || state.watcher.is_some() {
                return Ok(());
            }

            let (watcher, rx) =
                MetaFileWatcher::spawn(&self.inner.config.project_dir, &self.inner.meta_file_path)?;
            state.watcher = Some(watcher);
            state.event_task = Some(tokio::spawn(event_loop(self.inner.clone(), rx)));
        }

        if !self.inner.meta_file_path.exists() {
            info!("No editor instance is advertising itself yet");
            return Ok(());
        }

        on_meta_file_changed(&self.inner).await;
        Ok(())
    }

    /// True while a handshaken peer is alive.
    pub async fn is_connected(&self) -> bool {
        let state = self.inner.state.lock().await;
        !state.disposed && state.peer.as_ref().is_some_and(|peer| peer.is_connected())
    }

    /// Send a request through the current peer.
    ///
    /// `None` when disconnected, when the write fails, or when the connection
    /// drops before the response arrives.
    pub async fn send_request(&self, id: &str, body: &str) -> Option<MessageContent> {
        let peer = {
            let state = self.inner.state.lock().await;
            if state.disposed {
                return None;
            }
            state.peer.clone()?
        };
        if !peer.is_connected() {
            return None;
        }
        peer.send_request(id, body).await
    }

    /// Stop watching, abort any connect attempt, dispose the peer. Idempotent.
    pub async fn dispose(&self) {
        let (event_task, connect_task, peer) = {
            let mut state = self.inner.state.lock().await;
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.watcher = None;
            state.metadata = None;
            (
                state.event_task.take(),
                state.connect_task.take(),
                state.peer.take(),
            )
        };

        if let Some(task) = event_task {
            task.abort();
        }
        if let Some(task) = connect_task {
            task.abort();
        }
        if let Some(peer) = peer {
            peer.dispose().await;
        }
    }
}

/// Consumes watcher events one at a time so connection mutations never race.
async fn event_loop(inner: Arc<SessionInner>, mut rx: mpsc::UnboundedReceiver<MetaFileEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            MetaFileEvent::Changed => on_meta_file_changed(&inner).await,
            MetaFileEvent::Removed => on_meta_file_removed(&inner).await,
        }
    }
}

async fn on_meta_file_changed(inner: &Arc<SessionInner>) {
    let mut state = inner.state.lock().await;
    if state.disposed {
        return;
    }
    if !inner.meta_file_path.exists() {
        return;
    }
    // Filesystem watchers deliver duplicates; an unchanged mtime means the
    // file content cannot have changed either.
    match state.mtime.changed(&inner.meta_file_path) {
        Ok(true) => {}
        Ok(false) => {
            debug!("Metadata file unchanged since last observation");
            return;
        }
        Err(e) => {
            debug!("Metadata file vanished before it could be inspected: {e}");
            return;
        }
    }

    let Some(metadata) = read_metadata(&inner.meta_file_path) else {
        return;
    };
    if state.metadata.as_ref() == Some(&metadata) {
        debug!("Metadata content unchanged; keeping current connection state");
        return;
    }
    state.metadata = Some(metadata.clone());
    trigger_connect(inner, &mut state, metadata);
}

async fn on_meta_file_removed(inner: &Arc<SessionInner>) {
    let mut state = inner.state.lock().await;
    if state.disposed {
        return;
    }
    // A stale discovery file disappearing while connected is not actionable.
    if state.peer.as_ref().is_some_and(|peer| peer.is_connected()) {
        return;
    }
    if !inner.meta_file_path.exists() {
        return;
    }
    // The file came back (editor restart); reconnect even if the advertised
    // port happens to be the same as before.
    let Some(metadata) = read_metadata(&inner.meta_file_path) else {
        return;
    };
    state.metadata = Some(metadata.clone());
    trigger_connect(inner, &mut state, metadata);
}

fn read_metadata(path: &Path) -> Option<ConnectionMetadata> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Failed to read metadata file: {e}");
            return None;
        }
    };
    match ConnectionMetadata::parse(&content) {
        Ok(metadata) => Some(metadata),
        Err(e) => {
            warn!("Failed to parse metadata file: {e}");
            None
        }
    }
}

/// Supersede whatever is running and start a fresh connect attempt.
fn trigger_connect(
    inner: &Arc<SessionInner>,
    state: &mut SessionState,
    metadata: ConnectionMetadata,
) {
    state.generation += 1;
    let generation = state.generation;

    if let Some(task) = state.connect_task.take() {
        task.abort();
    }
    if let Some(peer) = state.peer.take() {
        tokio::spawn(async move { peer.dispose().await });
    }

    state.connect_task = Some(tokio::spawn(connect_with_retries(
        inner.clone(),
        metadata,
        generation,
    )));
}

async fn connect_with_retries(
    inner: Arc<SessionInner>,
    metadata: ConnectionMetadata,
    generation: u64,
) {
    let addr = format!("127.0.0.1:{}", metadata.port);

    for attempt in 0..CONNECT_ATTEMPTS {
        if attempt > 0 {
            info!(
                "Waiting {:?} before retrying ({} attempts left)",
                inner.config.retry_delay,
                CONNECT_ATTEMPTS - attempt
            );
            tokio::time::sleep(inner.config.retry_delay).await;
        }

        info!("Connecting to editor at {addr} (attempt {}/{CONNECT_ATTEMPTS})", attempt + 1);

        let stream = match tokio::time::timeout(
            inner.config.connect_timeout,
            TcpStream::connect(&addr),
        )
        .await
        {
            Err(_) => {
                error!("Connection timed out to {addr}");
                continue;
            }
            Ok(Err(e)) => {
                error!("Failed to connect to {addr}: {e}");
                continue;
            }
            Ok(Ok(stream)) => stream,
        };

        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {e}");
        }

        let peer = Arc::new(Peer::new(stream, inner.handler.clone()));
        if let Err(e) = peer.do_handshake(&inner.config.identity).await {
            error!("Handshake failed: {e}");
            peer.dispose().await;
            continue;
        }

        {
            let mut state = inner.state.lock().await;
            if state.disposed || state.generation != generation {
                // A newer trigger superseded this attempt while it was
                // handshaking; never leave two live peers.
                drop(state);
                peer.dispose().await;
                return;
            }
            state.peer = Some(peer.clone());
        }

        info!("Connection established with editor");
        let _ = peer.process().await;
        info!("Connection closed with editor");

        let mut state = inner.state.lock().await;
        if state.generation == generation {
            state.peer = None;
        }
        return;
    }

    error!("Failed to connect to editor after {CONNECT_ATTEMPTS} attempts");
}
