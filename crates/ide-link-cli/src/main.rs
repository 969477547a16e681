//! ide-link: talk to a running editor from the terminal
//!
//! Watches the given project for an editor advertising itself, connects, and
//! forwards stdin lines of the form `<request-id> [json-body]` as requests,
//! printing each response. Useful for poking at an editor without a full IDE
//! attached.

use anyhow::{Context, Result};
use ide_link_client::{RequestRegistry, Session, SessionConfig};
use ide_link_core::{MessageContent, MessageStatus};
use semver::Version;
use serde::Deserialize;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Payload of the editor's `OpenFile` request
#[derive(Debug, Deserialize)]
struct OpenFileRequest {
    #[serde(rename = "File")]
    file: String,
    #[serde(rename = "Line")]
    line: Option<u32>,
    #[serde(rename = "Column")]
    column: Option<u32>,
}

fn open_file_handler() -> RequestRegistry {
    let mut registry = RequestRegistry::new();
    registry.register("OpenFile", |content| async move {
        let request: OpenFileRequest = match serde_json::from_str(&content.body) {
            Ok(request) => request,
            Err(e) => {
                warn!("Malformed OpenFile request: {e}");
                return MessageContent::new(MessageStatus::InvalidRequestBody, "null");
            }
        };
        info!(
            "Editor asked to open {} (line {:?}, column {:?})",
            request.file, request.line, request.column
        );
        MessageContent::new(MessageStatus::Ok, "{}")
    });
    registry
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut args = std::env::args().skip(1);
    let project_dir: PathBuf = args
        .next()
        .context("usage: ide-link <project-dir> [identity] [editor-version]")?
        .into();
    let identity = args.next().unwrap_or_else(|| "IdeLinkCli".into());
    let editor_version = args
        .next()
        .map(|v| Version::parse(&v))
        .transpose()
        .context("invalid editor version")?
        .unwrap_or_else(|| Version::new(4, 0, 0));

    let config = SessionConfig::new(identity, project_dir, editor_version);
    let session = Session::new(config, std::sync::Arc::new(open_file_handler()));

    info!(
        "Watching for editor metadata at {}",
        session.meta_file_path().display()
    );
    session.start().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (id, body) = match line.split_once(' ') {
            Some((id, body)) => (id, body.trim()),
            None => (line, "{}"),
        };

        if !session.is_connected().await {
            warn!("Not connected to an editor; request not sent");
            continue;
        }

        match session.send_request(id, body).await {
            Some(response) => println!("{} {}", response.status, response.body),
            None => warn!("Request {id} failed (connection lost?)"),
        }
    }

    session.dispose().await;
    Ok(())
}
