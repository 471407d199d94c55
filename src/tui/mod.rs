// TUI module - Terminal User Interface
//
// A minimal terminal front-end over the event bus: a scrolling log panel,
// a status/streaming-headline panel, and a headline scrollback view.
// Toggle between views with Tab; quit with 'q' or Esc.

pub mod app;

use anyhow::{Context, Result};
use app::{App, View};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event as CEvent, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io;
use std::time::Duration;
use tokio::sync::broadcast;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::events::Event as BusEvent;
use crate::logging::{LogBuffer, LogLevel};

const TICK_RATE: Duration = Duration::from_millis(150);

/// Run the TUI: sets up the terminal, drives the event loop, and restores
/// the terminal on exit (including on error, via the `?`-propagating tail).
pub async fn run_tui(
    mut bus_rx: broadcast::Receiver<BusEvent>,
    log_buffer: LogBuffer,
    config: Config,
) -> Result<()> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture).context("failed to set up terminal")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal")?;

    let mut app = App::new(config, log_buffer);
    let result = run_event_loop(&mut terminal, &mut app, &mut bus_rx).await;

    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)
        .context("failed to restore terminal")?;
    terminal.show_cursor().context("failed to show cursor")?;

    result
}

async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    bus_rx: &mut broadcast::Receiver<BusEvent>,
) -> Result<()> {
    loop {
        terminal.draw(|f| render(f, app))?;

        tokio::select! {
            bus_event = bus_rx.recv() => {
                match bus_event {
                    Ok(event) => app.apply_event(event),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return Ok(()),
                }
            }
            _ = tokio::time::sleep(TICK_RATE) => {
                if poll_input(app)? {
                    return Ok(());
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

/// Non-blocking keyboard poll. Returns `true` if the app should quit.
fn poll_input(app: &mut App) -> Result<bool> {
    if !event::poll(Duration::from_millis(0))? {
        return Ok(false);
    }

    if let CEvent::Key(key) = event::read()? {
        if key.kind != KeyEventKind::Press {
            return Ok(false);
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
            KeyCode::Tab => app.toggle_view(),
            KeyCode::Up => app.scroll_logs(-1),
            KeyCode::Down => app.scroll_logs(1),
            KeyCode::Char('c') => copy_latest_headline(app),
            _ => {}
        }
    }

    Ok(false)
}

fn render(f: &mut Frame<'_>, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(5), Constraint::Length(1)])
        .split(f.area());

    match app.view {
        View::Logs => render_logs(f, app, chunks[0]),
        View::Headlines => render_headlines(f, app, chunks[0]),
    }
    render_status(f, app, chunks[1]);
    render_help(f, chunks[2]);
}

fn level_style(level: LogLevel) -> Style {
    match level {
        LogLevel::Error => Style::default().fg(Color::Red),
        LogLevel::Warn => Style::default().fg(Color::Yellow),
        LogLevel::Info => Style::default().fg(Color::Cyan),
        LogLevel::Debug | LogLevel::Trace => Style::default().fg(Color::DarkGray),
    }
}

/// Truncates `s` to at most `max_width` *display columns* (not bytes or
/// chars) so wide CJK glyphs and emoji don't overrun a single-line list row.
fn truncate_to_width(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }
    let mut out = String::new();
    let mut width = 0;
    for ch in s.chars() {
        let w = UnicodeWidthStr::width(ch.encode_utf8(&mut [0; 4]) as &str);
        if width + w > max_width.saturating_sub(1) {
            break;
        }
        width += w;
        out.push(ch);
    }
    out.push('…');
    out
}

fn render_logs(f: &mut Frame<'_>, app: &App, area: ratatui::layout::Rect) {
    let row_width = area.width.saturating_sub(4) as usize;
    let items: Vec<ListItem> = app
        .recent_logs()
        .iter()
        .map(|entry| {
            let line = Line::from(vec![
                Span::styled(
                    format!("{} ", entry.timestamp.format("%H:%M:%S")),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(format!("[{}] ", app::level_label(entry.level)), level_style(entry.level)),
                Span::raw(truncate_to_width(&entry.message, row_width)),
            ]);
            ListItem::new(line)
        })
        .collect();

    let title = format!("sentinel — logs ({} boards)", app.config.reddit.subreddits.len());
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(list, area);
}

fn render_headlines(f: &mut Frame<'_>, app: &App, area: ratatui::layout::Rect) {
    let items: Vec<ListItem> = app
        .headlines
        .iter()
        .map(|h| ListItem::new(Line::from(Span::raw(h.text.clone()))))
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("sentinel — headlines"));
    f.render_widget(list, area);
}

fn render_status(f: &mut Frame<'_>, app: &App, area: ratatui::layout::Rect) {
    let text = if let Some(streaming) = &app.streaming {
        streaming.clone()
    } else if !app.status.is_empty() {
        app.status.clone()
    } else {
        "idle".to_string()
    };

    let paragraph = Paragraph::new(text)
        .style(Style::default().add_modifier(Modifier::BOLD))
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("status"));
    f.render_widget(paragraph, area);
}

fn render_help(f: &mut Frame<'_>, area: ratatui::layout::Rect) {
    let help = Paragraph::new("Tab: switch view  ↑/↓: scroll  c: copy latest headline  q/Esc: quit")
        .style(Style::default().fg(Color::DarkGray));
    f.render_widget(help, area);
}

/// Copies the most recent completed headline (or the in-flight stream, if
/// nothing has completed yet) to the system clipboard. Clipboard access can
/// fail in headless/CI terminal environments; that failure is logged, not
/// surfaced to the UI.
fn copy_latest_headline(app: &App) {
    let Some(text) = app.headlines.front().map(|h| h.text.clone()).or_else(|| app.streaming.clone()) else {
        return;
    };

    match arboard::Clipboard::new() {
        Ok(mut clipboard) => {
            if let Err(e) = clipboard.set_text(text) {
                tracing::warn!("clipboard copy failed: {e}");
            }
        }
        Err(e) => tracing::warn!("clipboard unavailable: {e}"),
    }
}
