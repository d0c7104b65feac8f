//! Toast notifications: the terminal stand-in for message boxes.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use preview_proto::protocol::{Notice, Severity};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Clear, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::theme::{C_TOAST_ERROR, C_TOAST_INFO, C_TOAST_WARNING};

struct Toast {
    message: String,
    severity: Severity,
    expires: Instant,
}

const SPINNER_FRAMES: &[&str] = &["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"];

pub struct ToastManager {
    toasts: VecDeque<Toast>,
    /// Busy indicator label and animation frame.
    spinner: Option<(String, usize)>,
    max_visible: usize,
}

impl ToastManager {
    pub fn new() -> Self {
        Self {
            toasts: VecDeque::new(),
            spinner: None,
            max_visible: 4,
        }
    }

    pub fn push(&mut self, message: impl Into<String>, severity: Severity, duration: Duration) {
        let msg = message.into();
        self.toasts.retain(|t| t.message != msg);
        self.toasts.push_back(Toast {
            message: msg,
            severity,
            expires: Instant::now() + duration,
        });
        while self.toasts.len() > self.max_visible * 2 {
            self.toasts.pop_front();
        }
    }

    pub fn notice(&mut self, notice: &Notice) {
        let duration = match notice.severity {
            Severity::Info => Duration::from_secs(3),
            Severity::Warning => Duration::from_secs(4),
            Severity::Error => Duration::from_secs(6),
        };
        self.push(
            format!("{}: {}", notice.title, notice.message),
            notice.severity,
            duration,
        );
    }

    /// Show or hide the spinner.  Keeps the animation frame while shown.
    pub fn set_busy(&mut self, busy: bool, message: &str) {
        if !busy {
            self.spinner = None;
        } else if let Some((label, _)) = self.spinner.as_mut() {
            *label = message.to_string();
        } else {
            self.spinner = Some((message.to_string(), 0));
        }
    }

    /// Remove expired toasts and advance the spinner frame. Call each tick.
    pub fn tick(&mut self) {
        let now = Instant::now();
        self.toasts.retain(|t| t.expires > now);
        if let Some((_, frame)) = self.spinner.as_mut() {
            *frame = (*frame + 1) % SPINNER_FRAMES.len();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty() && self.spinner.is_none()
    }

    pub fn len(&self) -> usize {
        self.toasts.len()
    }

    /// Render toasts in the top-right corner of `area`, spinner first.
    pub fn draw(&self, frame: &mut Frame, area: Rect) {
        if self.is_empty() {
            return;
        }
        let max_width = (area.width / 2).clamp(30, 60);
        let mut y = area.y + 1;

        let spinner = self.spinner.as_ref().map(|(label, f)| {
            (
                format!(" {} {} ", SPINNER_FRAMES[*f % SPINNER_FRAMES.len()], label),
                C_TOAST_INFO,
            )
        });
        let toasts = self.toasts.iter().rev().take(self.max_visible).map(|t| {
            let (icon, color) = match t.severity {
                Severity::Info => ("·", C_TOAST_INFO),
                Severity::Warning => ("!", C_TOAST_WARNING),
                Severity::Error => ("✗", C_TOAST_ERROR),
            };
            (format!(" {} {} ", icon, t.message), color)
        });

        for (text, color) in spinner.into_iter().chain(toasts) {
            if y >= area.y + area.height {
                break;
            }
            let w = (text.width() as u16).min(max_width).min(area.width);
            let toast_area = Rect {
                x: area.x + area.width.saturating_sub(w + 1),
                y,
                width: w,
                height: 1,
            };
            frame.render_widget(Clear, toast_area);
            frame.render_widget(
                Paragraph::new(Line::from(Span::styled(
                    text,
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                ))),
                toast_area,
            );
            y += 1;
        }
    }
}

impl Default for ToastManager {
    fn default() -> Self {
        Self::new()
    }
}
