//! The event bus's wire types and dispatcher.
//!
//! A single tagged enum carries every event in the catalog — log/status
//! plumbing, the streaming-headline UI contract, and the board-search
//! surface that is opaque to the core but still needs to be threaded
//! through. One enum plus pattern matching lets a subscriber react only
//! to the variants it cares about without reflection over annotated
//! handler methods.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Log severity, mirrored 1:1 onto `tracing::Level` at the point of emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl Default for Severity {
    fn default() -> Self {
        Self::Info
    }
}

/// Every event that crosses the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A log line for the UI's status/log panel.
    Log {
        message: String,
        #[serde(default)]
        severity: Severity,
    },

    /// Requests a one-shot analysis. `analyze-ref:` prefixed prompts
    /// address a stored investigation by `ID:{8-char id}` or by permalink.
    TriggerAgentAnalysis { prompt: String },

    /// The agent's power mode changed; the LLM gateway should reinitialize
    /// its model selection.
    PowerModeChanged { power_mode: bool },

    /// The user's display language changed; the i18n layer (external
    /// collaborator) should reload its resources.
    LanguageChanged { language: String },

    /// A streaming response is starting.
    AgentStreamStart {
        #[serde(default)]
        source: Option<String>,
        #[serde(default)]
        css_class: Option<String>,
    },
    /// One token of a streaming response.
    AgentToken { token: String },
    /// A streaming response completed; carries the full assembled text.
    AgentStreamEnd { full_text: String },
    /// A status line update (cleared immediately before the first token).
    AgentStatus { status: String },

    /// UI-side board search events — carried through, opaque to the core.
    Search { query: String },
    SearchNext,
    RedditSearchResults { has_results: bool },
    ToggleRedditPanel { visible: bool },
    ClearTerminal,
}

impl Event {
    /// Convenience constructor for the common `Log{Info}` case.
    pub fn log(message: impl Into<String>) -> Self {
        Self::Log {
            message: message.into(),
            severity: Severity::Info,
        }
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::Log {
            message: message.into(),
            severity: Severity::Warn,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Log {
            message: message.into(),
            severity: Severity::Error,
        }
    }

    /// The variant's simple name, used for the bus's own debug-log filter —
    /// high-frequency token events are omitted from the publish-level log.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Log { .. } => "Log",
            Self::TriggerAgentAnalysis { .. } => "TriggerAgentAnalysis",
            Self::PowerModeChanged { .. } => "PowerModeChanged",
            Self::LanguageChanged { .. } => "LanguageChanged",
            Self::AgentStreamStart { .. } => "AgentStreamStart",
            Self::AgentToken { .. } => "AgentToken",
            Self::AgentStreamEnd { .. } => "AgentStreamEnd",
            Self::AgentStatus { .. } => "AgentStatus",
            Self::Search { .. } => "Search",
            Self::SearchNext => "SearchNext",
            Self::RedditSearchResults { .. } => "RedditSearchResults",
            Self::ToggleRedditPanel { .. } => "ToggleRedditPanel",
            Self::ClearTerminal => "ClearTerminal",
        }
    }
}

/// The in-process synchronous publish-subscribe bus.
///
/// Backed by `tokio::sync::broadcast`: every subscription gets a fresh
/// receiver and sees every event posted after it subscribed, in posting
/// order. Posting never fails the caller — a lagging or absent receiver
/// simply drops events silently.
#[derive(Clone)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Publish an event. Also mirrors it into `tracing` so the file log and
    /// the bus see the same message, except for `AgentToken` — those are
    /// filtered from the debug trace to avoid drowning it in per-token noise.
    pub fn publish(&self, event: Event) {
        if !event.type_name().contains("AgentToken") {
            tracing::debug!(event = event.type_name(), "bus publish");
        }
        let _ = self.tx.send(event);
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn posting_with_no_subscribers_does_not_panic() {
        let bus = Bus::new(16);
        bus.publish(Event::log("hello"));
    }

    #[tokio::test]
    async fn subscriber_sees_events_in_posting_order() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        bus.publish(Event::log("first"));
        bus.publish(Event::log("second"));

        let Event::Log { message: m1, .. } = rx.recv().await.unwrap() else {
            panic!("expected Log");
        };
        let Event::Log { message: m2, .. } = rx.recv().await.unwrap() else {
            panic!("expected Log");
        };
        assert_eq!(m1, "first");
        assert_eq!(m2, "second");
    }

    #[test]
    fn type_name_matches_variant() {
        assert_eq!(Event::AgentToken { token: "x".into() }.type_name(), "AgentToken");
        assert_eq!(Event::ClearTerminal.type_name(), "ClearTerminal");
    }
}
