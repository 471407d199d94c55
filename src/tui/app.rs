//! TUI application state: a minimal terminal front-end over the event bus.
//!
//! The core's out-of-scope contract (spec §1) only requires that *a*
//! terminal shell can subscribe to the bus and render its log/status/
//! streaming-headline events; this is that shell, not a full product UI.

use std::collections::VecDeque;

use crate::config::Config;
use crate::events::Event;
use crate::logging::{LogBuffer, LogEntry, LogLevel};

const MAX_VISIBLE_LOGS: usize = 500;
const MAX_HEADLINES: usize = 50;

/// Active view in the TUI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum View {
    #[default]
    Logs,
    Headlines,
}

/// A completed headline stream, kept for the scrollback panel.
#[derive(Debug, Clone)]
pub struct HeadlineEntry {
    pub source: Option<String>,
    pub text: String,
}

pub struct App {
    pub config: Config,
    pub log_buffer: LogBuffer,
    pub view: View,
    pub status: String,
    /// Tokens accumulated for the stream currently in flight, if any.
    pub streaming: Option<String>,
    pub headlines: VecDeque<HeadlineEntry>,
    pub log_scroll: usize,
    pub should_quit: bool,
}

impl App {
    pub fn new(config: Config, log_buffer: LogBuffer) -> Self {
        Self {
            config,
            log_buffer,
            view: View::default(),
            status: String::new(),
            streaming: None,
            headlines: VecDeque::new(),
            log_scroll: 0,
            should_quit: false,
        }
    }

    /// Applies one bus event to UI state. Mirrors the monitor's streaming
    /// contract: a status-clear always precedes the first token.
    pub fn apply_event(&mut self, event: Event) {
        match event {
            Event::AgentStatus { status } => self.status = status,
            Event::AgentStreamStart { .. } => self.streaming = Some(String::new()),
            Event::AgentToken { token } => {
                self.streaming.get_or_insert_with(String::new).push_str(&token);
            }
            Event::AgentStreamEnd { full_text } => {
                self.streaming = None;
                self.headlines.push_front(HeadlineEntry { source: None, text: full_text });
                while self.headlines.len() > MAX_HEADLINES {
                    self.headlines.pop_back();
                }
            }
            _ => {}
        }
    }

    pub fn toggle_view(&mut self) {
        self.view = match self.view {
            View::Logs => View::Headlines,
            View::Headlines => View::Logs,
        };
    }

    pub fn scroll_logs(&mut self, delta: i32) {
        self.log_scroll = self.log_scroll.saturating_add_signed(delta as isize);
    }

    pub fn recent_logs(&self) -> Vec<LogEntry> {
        let all = self.log_buffer.get_all();
        let start = all.len().saturating_sub(MAX_VISIBLE_LOGS);
        all[start..].to_vec()
    }
}

pub fn level_label(level: LogLevel) -> &'static str {
    level.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::default()
    }

    #[test]
    fn stream_start_then_tokens_accumulate() {
        let mut app = App::new(config(), LogBuffer::new());
        app.apply_event(Event::AgentStreamStart { source: None, css_class: None });
        app.apply_event(Event::AgentToken { token: "Hello ".into() });
        app.apply_event(Event::AgentToken { token: "world".into() });
        assert_eq!(app.streaming.as_deref(), Some("Hello world"));
    }

    #[test]
    fn stream_end_moves_into_headline_history() {
        let mut app = App::new(config(), LogBuffer::new());
        app.apply_event(Event::AgentStreamStart { source: None, css_class: None });
        app.apply_event(Event::AgentStreamEnd { full_text: "Breaking news".into() });
        assert!(app.streaming.is_none());
        assert_eq!(app.headlines.front().unwrap().text, "Breaking news");
    }

    #[test]
    fn headline_history_is_bounded() {
        let mut app = App::new(config(), LogBuffer::new());
        for i in 0..(MAX_HEADLINES + 10) {
            app.apply_event(Event::AgentStreamEnd { full_text: format!("headline {i}") });
        }
        assert_eq!(app.headlines.len(), MAX_HEADLINES);
    }

    #[test]
    fn toggle_view_alternates() {
        let mut app = App::new(config(), LogBuffer::new());
        assert_eq!(app.view, View::Logs);
        app.toggle_view();
        assert_eq!(app.view, View::Headlines);
        app.toggle_view();
        assert_eq!(app.view, View::Logs);
    }
}
