//! Request handler seam between the link and the embedding application

use async_trait::async_trait;
use ide_link_core::{MessageContent, MessageStatus};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use tracing::error;

/// Handles requests arriving from the editor.
///
/// The handler may perform I/O; the peer's receive loop awaits it before
/// writing the response back, so one slow handler delays subsequent inbound
/// messages on that connection.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle_request(&self, id: &str, content: &MessageContent) -> MessageContent;
}

type HandlerFuture = Pin<Box<dyn Future<Output = MessageContent> + Send>>;
type BoxedHandler = Box<dyn Fn(MessageContent) -> HandlerFuture + Send + Sync>;

/// Name-keyed dispatcher for inbound requests.
///
/// Requests with no registered handler are answered with
/// `RequestNotSupported` and a `"null"` body; that is a reply to the editor,
/// not a local failure.
#[derive(Default)]
pub struct RequestRegistry {
    handlers: HashMap<String, BoxedHandler>,
}

impl RequestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an async handler for one request id.
    pub fn register<F, Fut>(&mut self, id: impl Into<String>, handler: F)
    where
        F: Fn(MessageContent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MessageContent> + Send + 'static,
    {
        self.handlers
            .insert(id.into(), Box::new(move |content| Box::pin(handler(content))));
    }
}

#[async_trait]
impl MessageHandler for RequestRegistry {
    async fn handle_request(&self, id: &str, content: &MessageContent) -> MessageContent {
        match self.handlers.get(id) {
            Some(handler) => handler(content.clone()).await,
            None => {
                error!("Received unknown request: {id}");
                MessageContent::new(MessageStatus::RequestNotSupported, "null")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_registered_handler_is_invoked() {
        let mut registry = RequestRegistry::new();
        registry.register("Ping", |content| async move {
            assert_eq!(content.body, "{}");
            MessageContent::new(MessageStatus::Ok, "{\"ok\":true}")
        });

        let request = MessageContent::new(MessageStatus::Ok, "{}");
        let response = registry.handle_request("Ping", &request).await;
        assert_eq!(response.status, MessageStatus::Ok);
        assert_eq!(response.body, "{\"ok\":true}");
    }

    #[tokio::test]
    async fn test_unknown_request_answers_not_supported() {
        let registry = RequestRegistry::new();
        let request = MessageContent::new(MessageStatus::Ok, "{}");
        let response = registry.handle_request("NoSuchThing", &request).await;
        assert_eq!(response.status, MessageStatus::RequestNotSupported);
        assert_eq!(response.body, "null");
    }
}
