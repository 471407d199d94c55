//! Uniform gateway over a local LLM inference server: token-streamed chat
//! and translation, synchronous vision OCR, and synchronous dense
//! embeddings. One trait behind an `Arc<dyn _>` so the monitor, report
//! builder, and clustering engine all depend on the capability set rather
//! than a concrete HTTP client.

mod local;
pub mod vision;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use local::LocalLlmGateway;

/// One increment of a streaming response.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Token(String),
    Complete(String),
    Error(String),
}

/// A cancellable token stream. Dropping or calling [`ChatStream::cancel`]
/// stops further delivery and releases the underlying HTTP call; the
/// producer task notices via the shared [`CancellationToken`] on its next
/// poll rather than immediately, matching an HTTP body that can only be
/// dropped between chunks.
pub struct ChatStream {
    rx: mpsc::Receiver<StreamEvent>,
    cancel: CancellationToken,
}

impl ChatStream {
    /// Wraps a receiver/cancellation pair as a `ChatStream`. Exposed (not
    /// just `pub(crate)`) so an `LlmGateway` fake outside this crate — e.g.
    /// in an integration test — can produce one without a real HTTP call.
    pub fn new(rx: mpsc::Receiver<StreamEvent>, cancel: CancellationToken) -> Self {
        Self { rx, cancel }
    }

    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Drains the stream into its assembled full text, following `onToken`
    /// until `onComplete`/`onError`. Used by callers (the report builder)
    /// that only care about the final text, not individual tokens.
    pub async fn collect(mut self) -> Result<String> {
        loop {
            match self.rx.recv().await {
                Some(StreamEvent::Token(_)) => continue,
                Some(StreamEvent::Complete(full)) => return Ok(full),
                Some(StreamEvent::Error(e)) => return Err(anyhow::anyhow!(e)),
                None => return Err(anyhow::anyhow!("stream closed without completing")),
            }
        }
    }
}

/// Capability set a local inference server backend must provide.
#[async_trait::async_trait]
pub trait LlmGateway: Send + Sync {
    /// Token-streamed chat. `scope` isolates conversation memory — a
    /// sliding window of the last 20 messages — across callers (typically
    /// one scope per investigation cluster id).
    async fn chat(&self, scope: &str, message: &str) -> Result<ChatStream>;

    /// Token-streamed translation; no persistent memory scope.
    async fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<ChatStream>;

    /// Synchronous vision/OCR over an image URL. Never fails outward: any
    /// fetch/decode/model error degrades to a stable diagnostic string
    /// instructing the downstream prompt not to hallucinate about the
    /// image's contents.
    async fn vision(&self, image_url: &str) -> String;

    /// Synchronous dense embedding of `text`.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Resolve a configured model name against the server's inventory: exact
/// match first, else the first inventory entry starting with
/// `family_prefix`. `None` means startup should abort (§7 fatal errors).
pub fn resolve_model(inventory: &[String], target: &str, family_prefix: &str) -> Option<String> {
    if inventory.iter().any(|m| m == target) {
        return Some(target.to_string());
    }
    inventory
        .iter()
        .find(|m| m.starts_with(family_prefix))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_model_prefers_exact_match() {
        let inventory = vec!["gemma3:4b".to_string(), "gemma3-custom".to_string()];
        assert_eq!(
            resolve_model(&inventory, "gemma3:4b", "gemma3"),
            Some("gemma3:4b".to_string())
        );
    }

    #[test]
    fn resolve_model_falls_back_to_family_prefix() {
        let inventory = vec!["gemma3-custom".to_string(), "llama3:8b".to_string()];
        assert_eq!(
            resolve_model(&inventory, "gemma3:4b", "gemma3"),
            Some("gemma3-custom".to_string())
        );
    }

    #[test]
    fn resolve_model_none_when_no_family_match() {
        let inventory = vec!["llama3:8b".to_string()];
        assert_eq!(resolve_model(&inventory, "gemma3:4b", "gemma3"), None);
    }
}
