//! Connection peer: one live socket connection to an editor
//!
//! A peer owns its socket exclusively. The receive loop is the only reader;
//! outgoing writes share the write half behind a mutex. Responses are routed
//! back to waiting callers through per-id FIFO queues of oneshot channels:
//! the protocol has no per-call correlation token, so the oldest outstanding
//! request for an id gets the next response carrying that id.

use crate::handler::MessageHandler;
use ide_link_core::{
    ClientHandshake, LinkError, Message, MessageContent, MessageDecoder, MessageKind, Result,
    encode,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, Notify, oneshot};
use tracing::{debug, error, info};

/// How long to wait for the editor's handshake line
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(8);

type PendingQueues = HashMap<String, VecDeque<oneshot::Sender<MessageContent>>>;

/// One endpoint's live view of a single socket connection.
///
/// A peer is single-use: construct, [`do_handshake`](Peer::do_handshake), run
/// [`process`](Peer::process) until disconnection, then discard. Reconnecting
/// means building a new peer.
pub struct Peer {
    reader: Mutex<Option<BufReader<OwnedReadHalf>>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
    pending: std::sync::Mutex<PendingQueues>,
    connected: AtomicBool,
    disposed: AtomicBool,
    remote_identity: std::sync::Mutex<Option<String>>,
    handshake: ClientHandshake,
    handler: Arc<dyn MessageHandler>,
    shutdown: Notify,
}

impl Peer {
    pub fn new(stream: TcpStream, handler: Arc<dyn MessageHandler>) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: Mutex::new(Some(BufReader::new(read_half))),
            writer: Mutex::new(Some(write_half)),
            pending: std::sync::Mutex::new(HashMap::new()),
            connected: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            remote_identity: std::sync::Mutex::new(None),
            handshake: ClientHandshake::new(),
            handler,
            shutdown: Notify::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Identity announced by the editor during the handshake
    pub fn remote_identity(&self) -> Option<String> {
        self.remote_identity.lock().unwrap().clone()
    }

    /// Exchange handshake lines with the editor.
    ///
    /// Writes our line, then waits up to 8 seconds for the editor's. On
    /// success the peer is connected and the remote identity recorded; on
    /// failure the peer stays unconnected and must be disposed by the caller.
    pub async fn do_handshake(&self, identity: &str) -> Result<()> {
        let line = self.handshake.handshake_line(identity);
        {
            let mut guard = self.writer.lock().await;
            let writer = guard
                .as_mut()
                .ok_or_else(|| LinkError::Transport("socket already closed".into()))?;
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }

        let peer_line = {
            let mut guard = self.reader.lock().await;
            let reader = guard
                .as_mut()
                .ok_or_else(|| LinkError::Transport("receive loop already running".into()))?;
            match tokio::time::timeout(HANDSHAKE_TIMEOUT, read_line(reader)).await {
                Err(_) => {
                    return Err(LinkError::Handshake(
                        "timed out waiting for peer handshake".into(),
                    ));
                }
                Ok(Err(e)) => return Err(LinkError::Transport(e.to_string())),
                Ok(Ok(None)) => {
                    return Err(LinkError::Handshake(
                        "connection closed before peer handshake".into(),
                    ));
                }
                Ok(Ok(Some(line))) => line,
            }
        };

        let remote_identity = self.handshake.validate_peer_line(&peer_line)?;
        info!("Peer connection started (remote identity: {remote_identity})");
        *self.remote_identity.lock().unwrap() = Some(remote_identity);
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Receive loop: runs until end-of-stream or [`dispose`](Peer::dispose).
    ///
    /// Decoded requests are handed to the message handler and answered on the
    /// spot; decoded responses resolve the oldest pending request with the
    /// same id. Malformed frames and unmatched responses are logged and the
    /// loop continues.
    pub async fn process(&self) -> Result<()> {
        let mut reader = self
            .reader
            .lock()
            .await
            .take()
            .ok_or_else(|| LinkError::Transport("receive loop already running".into()))?;

        let mut decoder = MessageDecoder::new();

        loop {
            let line = tokio::select! {
                _ = self.shutdown.notified() => break,
                line = read_line(&mut reader) => line,
            };

            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => {
                    debug!("Editor closed the connection");
                    break;
                }
                Err(e) => {
                    error!("Read failed: {e}");
                    break;
                }
            };

            let message = match decoder.decode(&line) {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(_) => {
                    error!("Received message line with invalid format: {line}");
                    continue;
                }
            };

            debug!("Received message: {message}");

            match message.kind {
                MessageKind::Request => {
                    let response = self
                        .handler
                        .handle_request(&message.id, &message.content)
                        .await;
                    let reply = Message::response(message.id, response);
                    if let Err(e) = self.write_message(&reply).await {
                        error!("Failed to write response: {e}");
                        break;
                    }
                }
                MessageKind::Response => {
                    let waiter = {
                        let mut pending = self.pending.lock().unwrap();
                        pending.get_mut(&message.id).and_then(VecDeque::pop_front)
                    };
                    match waiter {
                        Some(tx) => {
                            // Receiver may have been dropped by a cancelled caller.
                            let _ = tx.send(message.content);
                        }
                        None => error!("Received unexpected response: {}", message.id),
                    }
                }
            }
        }

        self.connected.store(false, Ordering::SeqCst);
        self.fail_pending();
        Ok(())
    }

    /// Send a request and wait for the matching response.
    ///
    /// Returns `None` if the write fails or the connection goes away while
    /// waiting. There is no per-request timeout; callers needing a bound race
    /// this against their own timer.
    pub async fn send_request(&self, id: &str, body: &str) -> Option<MessageContent> {
        let message = Message::request(id, body);

        let rx = {
            // Holding the writer lock across enqueue + write keeps queue
            // order identical to wire order, which the FIFO-per-id
            // correlation depends on.
            let mut guard = self.writer.lock().await;
            let writer = guard.as_mut()?;

            debug!("Sending message: {message}");
            let (tx, rx) = oneshot::channel();
            self.pending
                .lock()
                .unwrap()
                .entry(id.to_owned())
                .or_default()
                .push_back(tx);

            if let Err(e) = write_encoded(writer, &message).await {
                error!("Failed to write request: {e}");
                let mut pending = self.pending.lock().unwrap();
                if let Some(queue) = pending.get_mut(id) {
                    queue.pop_back();
                }
                return None;
            }
            rx
        };

        rx.await.ok()
    }

    async fn write_message(&self, message: &Message) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| LinkError::Transport("socket closed".into()))?;
        debug!("Sending message: {message}");
        write_encoded(writer, message).await
    }

    /// Close the socket and fail all pending requests. Idempotent.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.connected.store(false, Ordering::SeqCst);
        self.shutdown.notify_one();
        {
            let mut guard = self.writer.lock().await;
            if let Some(mut writer) = guard.take() {
                let _ = writer.shutdown().await;
            }
        }
        self.fail_pending();
    }

    /// Drop every queued waiter so suspended callers resolve with `None`
    /// instead of hanging forever.
    fn fail_pending(&self) {
        let mut pending = self.pending.lock().unwrap();
        pending.clear();
    }
}

async fn write_encoded(writer: &mut OwnedWriteHalf, message: &Message) -> Result<()> {
    let encoded = encode(message);
    writer.write_all(encoded.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one `\n`-terminated line, tolerating a trailing `\r`. `None` at EOF.
pub(crate) async fn read_line(
    reader: &mut BufReader<OwnedReadHalf>,
) -> std::io::Result<Option<String>> {
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Ok(None);
    }
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    Ok(Some(line))
}
