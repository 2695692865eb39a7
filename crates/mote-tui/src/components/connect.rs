//! Connect screen — address entry while the session is down.
//!
//! Shown in both Disconnected and Probing states; during a probe the field is
//! read-only and the App renders a spinner toast on top.

use ratatui::crossterm::event::{KeyEvent, KeyEventKind};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use mote_client::snapshot::LinkState;

use crate::action::Action;
use crate::app_state::AppState;
use crate::component::Component;
use crate::theme::{style_muted, style_secondary, C_PANEL_BORDER};
use crate::widgets::address_input::{AddressAction, AddressInput};

pub struct ConnectScreen {
    input: AddressInput,
}

impl ConnectScreen {
    pub fn new(last_host: Option<String>) -> Self {
        let mut input = AddressInput::default();
        if let Some(host) = last_host {
            input.set_value(&host);
        }
        Self { input }
    }

    /// Put a failed host back into the field so the user can retry
    /// without retyping.
    pub fn restore_host(&mut self, host: &str) {
        self.input.set_value(host);
    }
}

impl Component for ConnectScreen {
    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }
        // Ignore typing while a probe is in flight.
        if state.link == LinkState::Probing {
            return vec![];
        }
        match self.input.handle_key(key) {
            AddressAction::Submitted(host) => vec![Action::ConnectTo(host)],
            AddressAction::Cancelled => vec![Action::Quit],
            AddressAction::None => vec![],
        }
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, _state: &AppState) {
        let box_w = area.width.clamp(24, 48);
        let panel = centered_rect(box_w, 6, area);

        let block = Block::default()
            .title(" player address ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(C_PANEL_BORDER));
        let inner = block.inner(panel);
        frame.render_widget(block, panel);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(inner);

        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                "enter the device running the control server",
                style_secondary(),
            ))),
            rows[0],
        );

        self.input.draw(frame, rows[2]);

        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                format!(
                    "port {} · Enter to connect",
                    mote_client::protocol::CONTROL_PORT
                ),
                style_muted(),
            ))),
            rows[3],
        );
    }
}

/// A centered `width` x `height` rect inside `area`.
fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect {
        x,
        y,
        width: width.min(area.width),
        height: height.min(area.height),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mote_client::snapshot::PlaybackSnapshot;
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};

    fn state(link: LinkState) -> AppState {
        AppState {
            snapshot: PlaybackSnapshot::default(),
            link,
            host: None,
            art: None,
            suspended: false,
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_restored_host_submits_without_retyping() {
        let mut screen = ConnectScreen::new(None);
        screen.restore_host("192.168.1.20");

        let actions = screen.handle_key(key(KeyCode::Enter), &state(LinkState::Disconnected));
        assert_eq!(actions, vec![Action::ConnectTo("192.168.1.20".to_string())]);
    }

    #[test]
    fn test_blank_submit_is_ignored() {
        let mut screen = ConnectScreen::new(None);
        let actions = screen.handle_key(key(KeyCode::Enter), &state(LinkState::Disconnected));
        assert!(actions.is_empty());
    }

    #[test]
    fn test_keys_ignored_while_probing() {
        let mut screen = ConnectScreen::new(Some("10.0.0.5".to_string()));
        let actions = screen.handle_key(key(KeyCode::Enter), &state(LinkState::Probing));
        assert!(actions.is_empty());
    }
}
