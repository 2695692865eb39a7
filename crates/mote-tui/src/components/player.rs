//! Player screen — now-playing view with transport keys.
//!
//! Layout:
//! ```text
//! ┌ art ─────────┐  title (bold)
//! │              │  host · playing state
//! │              │
//! └──────────────┘  [position bar]  0:42        3:00
//! ```
//! The position bar renders only while both position and duration are known;
//! an unknown value blanks its label instead of guessing.

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use mote_client::protocol::PlayerCommand;

use crate::action::Action;
use crate::app_state::AppState;
use crate::component::Component;
use crate::theme::{style_title, C_ART, C_MUTED, C_PANEL_BORDER, C_PLAYING, C_PRIMARY, C_SECONDARY};
use crate::widgets::progress_bar;

/// Relative seek step for the arrow keys, seconds.
const SEEK_STEP_SECS: f64 = 10.0;

pub struct PlayerScreen;

impl PlayerScreen {
    pub fn new() -> Self {
        Self
    }
}

impl Component for PlayerScreen {
    fn handle_key(&mut self, key: KeyEvent, _state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }
        match key.code {
            KeyCode::Char(' ') => vec![Action::Dispatch(PlayerCommand::PlayPause)],
            KeyCode::Char('x') => vec![Action::Dispatch(PlayerCommand::Play)],
            KeyCode::Char('c') => vec![Action::Dispatch(PlayerCommand::Pause)],
            KeyCode::Char('n') => vec![Action::Dispatch(PlayerCommand::PlayNext)],
            KeyCode::Char('b') => vec![Action::Dispatch(PlayerCommand::PlayPrev)],
            KeyCode::Left => vec![Action::SeekBy(-SEEK_STEP_SECS)],
            KeyCode::Right => vec![Action::SeekBy(SEEK_STEP_SECS)],
            KeyCode::Char('d') => vec![Action::Disconnect],
            KeyCode::Char('?') => vec![Action::ToggleHelp],
            KeyCode::Char('q') => vec![Action::Quit],
            _ => vec![],
        }
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, state: &AppState) {
        if area.width < 20 || area.height < 8 {
            return;
        }

        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(22), Constraint::Min(10)])
            .split(area);

        draw_art_panel(frame, cols[0], state);
        draw_now_playing(frame, cols[1], state);
    }
}

// ── art panel ─────────────────────────────────────────────────────────────────

fn draw_art_panel(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = Block::default()
        .title(" art ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(C_PANEL_BORDER));
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.height == 0 {
        return;
    }

    let snapshot = &state.snapshot;
    let mid = inner.y + inner.height / 2;

    if snapshot.use_fallback_art {
        // Placeholder: the art endpoint failed for this track.
        let line = Line::from(Span::styled("♪", Style::default().fg(C_MUTED)));
        frame.render_widget(
            Paragraph::new(line).centered(),
            Rect { y: mid, height: 1, ..inner },
        );
        return;
    }

    match &state.art {
        Some(art) if art.epoch == snapshot.art_epoch => {
            // No image decoding in a terminal; show a filled card with the
            // payload size so a track change is visibly a fresh fetch.
            for y in inner.y..inner.y + inner.height {
                let fill = Line::from(Span::styled(
                    "▒".repeat(inner.width as usize),
                    Style::default().fg(C_ART),
                ));
                frame.render_widget(Paragraph::new(fill), Rect { y, height: 1, ..inner });
            }
            let kb = (art.data.len() as f64 / 1024.0).max(0.1);
            let label = format!(" cover {:.0} KB ", kb);
            frame.render_widget(
                Paragraph::new(Line::from(Span::styled(
                    label,
                    Style::default().fg(C_PRIMARY),
                )))
                .centered(),
                Rect { y: mid, height: 1, ..inner },
            );
        }
        _ => {
            let line = Line::from(Span::styled("…", Style::default().fg(C_MUTED)));
            frame.render_widget(
                Paragraph::new(line).centered(),
                Rect { y: mid, height: 1, ..inner },
            );
        }
    }
}

// ── now-playing column ────────────────────────────────────────────────────────

fn draw_now_playing(frame: &mut Frame, area: Rect, state: &AppState) {
    let snapshot = &state.snapshot;

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    // Title
    let title = if snapshot.title.is_empty() {
        Span::styled("(no title)", Style::default().fg(C_MUTED))
    } else {
        Span::styled(
            truncate_to_width(&snapshot.title, area.width.saturating_sub(2) as usize),
            style_title(),
        )
    };
    frame.render_widget(Paragraph::new(Line::from(vec![Span::raw(" "), title])), rows[0]);

    // Host + playing state
    let (icon, icon_color) = if snapshot.is_playing {
        ("▶", C_PLAYING)
    } else {
        ("⏸", C_SECONDARY)
    };
    let host = state.host.as_deref().unwrap_or("?");
    let line = Line::from(vec![
        Span::raw(" "),
        Span::styled(icon, Style::default().fg(icon_color)),
        Span::styled(format!("  {}", host), Style::default().fg(C_SECONDARY)),
    ]);
    frame.render_widget(Paragraph::new(line), rows[1]);

    // Position bar, only when both ends are known.
    if let (Some(pos), Some(dur)) = (snapshot.position_secs, snapshot.duration_secs) {
        if dur > 0.0 {
            let bar_area = Rect {
                x: rows[4].x + 1,
                width: rows[4].width.saturating_sub(2),
                ..rows[4]
            };
            progress_bar::draw_progress(
                frame,
                bar_area,
                (pos / dur).clamp(0.0, 1.0),
                Some(pos),
                Some(dur),
            );
        }
    }
}

fn truncate_to_width(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = UnicodeWidthStr::width(ch.to_string().as_str());
        if used + w + 1 > max {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}
