//! Scripted editor side for integration-style tests: raw line I/O over an
//! accepted socket, reusing the codec to frame and deframe.

use crate::peer::read_line;
use ide_link_core::{Message, MessageDecoder, encode};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

pub(crate) struct ScriptedEditor {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    decoder: MessageDecoder,
}

impl ScriptedEditor {
    pub(crate) async fn accept(listener: &TcpListener) -> Self {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            decoder: MessageDecoder::new(),
        }
    }

    pub(crate) async fn read_raw_line(&mut self) -> String {
        read_line(&mut self.reader).await.unwrap().unwrap()
    }

    pub(crate) async fn write_raw_line(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Complete the handshake from the editor side, returning the client's
    /// handshake line.
    pub(crate) async fn handshake(&mut self, identity: &str) -> String {
        let client_line = self.read_raw_line().await;
        self.write_raw_line(&format!("GodotIdeServer,Version=1.1.0,{identity}"))
            .await;
        client_line
    }

    /// Read lines until they complete a framed message.
    pub(crate) async fn read_message(&mut self) -> Message {
        self.try_read_message().await.expect("connection closed")
    }

    /// Like [`read_message`](Self::read_message) but `None` once the peer
    /// hangs up.
    pub(crate) async fn try_read_message(&mut self) -> Option<Message> {
        loop {
            let line = match read_line(&mut self.reader).await {
                Ok(Some(line)) => line,
                Ok(None) | Err(_) => return None,
            };
            if let Some(message) = self.decoder.decode(&line).unwrap() {
                return Some(message);
            }
        }
    }

    pub(crate) async fn write_message(&mut self, message: &Message) {
        self.writer
            .write_all(encode(message).as_bytes())
            .await
            .unwrap();
        self.writer.flush().await.unwrap();
    }
}
