//! AddressInput — wraps tui-input for the host address entry field.

use ratatui::crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use tui_input::{backend::crossterm::EventHandler, Input};

use crate::theme::{C_INPUT_BG, C_INPUT_FG, C_MUTED};

pub enum AddressAction {
    /// Enter pressed with a non-blank value.
    Submitted(String),
    /// Esc pressed on an already-empty field.
    Cancelled,
    None,
}

pub struct AddressInput {
    input: Input,
    placeholder: String,
}

impl AddressInput {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            input: Input::default(),
            placeholder: placeholder.into(),
        }
    }

    pub fn set_value(&mut self, value: &str) {
        self.input = Input::new(value.to_string());
    }

    pub fn text(&self) -> &str {
        self.input.value()
    }

    /// Handle a key event. Returns what happened.
    ///
    /// Esc behaviour:
    ///   - If the input has text: clear the text
    ///   - If the input is already empty: emit `Cancelled`
    pub fn handle_key(&mut self, key: KeyEvent) -> AddressAction {
        match key.code {
            KeyCode::Esc => {
                if !self.input.value().is_empty() {
                    self.input = Input::default();
                    AddressAction::None
                } else {
                    AddressAction::Cancelled
                }
            }
            KeyCode::Enter => {
                let value = self.input.value().trim().to_string();
                if value.is_empty() {
                    AddressAction::None
                } else {
                    AddressAction::Submitted(value)
                }
            }
            _ => {
                self.input
                    .handle_event(&ratatui::crossterm::event::Event::Key(key));
                AddressAction::None
            }
        }
    }

    /// Render the input field into `area`.
    pub fn draw(&self, frame: &mut Frame, area: Rect) {
        let scroll = self
            .input
            .visual_scroll(area.width.saturating_sub(4) as usize);
        let value = self.input.value();
        let display = if value.is_empty() {
            Span::styled(
                format!("› {}", self.placeholder),
                Style::default().fg(C_MUTED),
            )
        } else {
            Span::styled(
                format!("› {}", &value[scroll..]),
                Style::default().fg(C_INPUT_FG),
            )
        };

        let paragraph =
            Paragraph::new(Line::from(vec![display])).style(Style::default().bg(C_INPUT_BG));
        frame.render_widget(paragraph, area);

        let cursor_x = area.x + 2 + (self.input.visual_cursor() - scroll) as u16;
        frame.set_cursor_position((cursor_x.min(area.x + area.width.saturating_sub(1)), area.y));
    }
}

impl Default for AddressInput {
    fn default() -> Self {
        Self::new("192.168.1.20")
    }
}
