//! Status bar — bottom line with connection state and keybindings.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use mote_client::snapshot::LinkState;

use crate::theme::{C_ACCENT, C_MUTED, C_PLAYING, C_PROBING, C_SECONDARY, C_SEPARATOR};

/// Draw a horizontal separator line.
pub fn draw_separator(frame: &mut Frame, area: Rect) {
    let line = Line::from(Span::styled(
        "─".repeat(area.width as usize),
        Style::default().fg(C_SEPARATOR),
    ));
    frame.render_widget(Paragraph::new(line), area);
}

/// Draw the keybindings footer bar (one row).
pub fn draw_keys_bar(frame: &mut Frame, area: Rect, link: LinkState, suspended: bool) {
    let (dot, dot_color, label) = match link {
        LinkState::Connected if suspended => ("●", C_PROBING, "PAUSED"),
        LinkState::Connected => ("●", C_PLAYING, "LINKED"),
        LinkState::Probing => ("◌", C_PROBING, "PROBE"),
        LinkState::Disconnected => ("○", C_ACCENT, "NO LINK"),
    };

    let keys = match link {
        LinkState::Connected => {
            " Space play/pause  x play  c pause  n/b next/prev  ←→ seek ±10s  d disconnect  ? help  q quit"
        }
        LinkState::Probing => " probing host…",
        LinkState::Disconnected => " type address  Enter connect  Esc clear  Ctrl-C quit",
    };

    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", dot),
            Style::default().fg(dot_color).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("{} ", label),
            Style::default()
                .fg(C_SECONDARY)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(keys, Style::default().fg(C_MUTED)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}
