//! SearchInput: the artist search box, built on tui-input.

use ratatui::crossterm::event::{Event, KeyCode, KeyEvent};
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use tui_input::{backend::crossterm::EventHandler, Input};

use crate::theme::{style_border, C_INPUT_BG, C_INPUT_FG, C_MUTED};

#[derive(Debug, PartialEq, Eq)]
pub enum SearchAction {
    /// Enter pressed: search for this text (possibly empty).
    Submit(String),
    /// Esc pressed: leave the box.
    Leave,
    None,
}

pub struct SearchInput {
    input: Input,
    placeholder: String,
}

impl SearchInput {
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

    pub fn handle_key(&mut self, key: KeyEvent) -> SearchAction {
        match key.code {
            KeyCode::Enter => SearchAction::Submit(self.input.value().to_string()),
            KeyCode::Esc => SearchAction::Leave,
            _ => {
                self.input.handle_event(&Event::Key(key));
                SearchAction::None
            }
        }
    }

    pub fn draw(&self, frame: &mut Frame, area: Rect, focused: bool) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(style_border(focused))
            .title(" Artist ");
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let scroll = self.input.visual_scroll(inner.width.saturating_sub(1) as usize);
        let value = self.input.value();
        let span = if value.is_empty() && !focused {
            Span::styled(self.placeholder.as_str(), Style::default().fg(C_MUTED))
        } else {
            Span::styled(
                value.chars().skip(scroll).collect::<String>(),
                Style::default().fg(C_INPUT_FG),
            )
        };
        frame.render_widget(
            Paragraph::new(Line::from(span)).style(Style::default().bg(C_INPUT_BG)),
            inner,
        );

        if focused && inner.width > 0 {
            let cursor_x = inner.x + (self.input.visual_cursor().saturating_sub(scroll)) as u16;
            frame.set_cursor_position((cursor_x.min(inner.x + inner.width - 1), inner.y));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_typing_then_enter_submits() {
        let mut input = SearchInput::new("search");
        for c in "Air".chars() {
            assert_eq!(input.handle_key(key(KeyCode::Char(c))), SearchAction::None);
        }
        assert_eq!(
            input.handle_key(key(KeyCode::Enter)),
            SearchAction::Submit("Air".to_string())
        );
        assert_eq!(input.text(), "Air");
    }

    #[test]
    fn test_empty_submit_is_allowed() {
        let mut input = SearchInput::new("search");
        assert_eq!(
            input.handle_key(key(KeyCode::Enter)),
            SearchAction::Submit(String::new())
        );
    }

    #[test]
    fn test_prefill() {
        let mut input = SearchInput::new("search");
        input.set_value("Justice");
        input.handle_key(key(KeyCode::Backspace));
        assert_eq!(input.text(), "Justic");
    }
}
