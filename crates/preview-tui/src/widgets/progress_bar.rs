//! Playback position slider with time labels.

use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::theme::{C_MUTED, C_PLAYING, C_SECONDARY};

const BLOCKS: [char; 9] = [' ', '▏', '▎', '▍', '▌', '▋', '▊', '▉', '█'];

/// Render the slider in `area`.  Nothing but an empty track is drawn until
/// the engine has reported a duration.
pub fn draw_progress(frame: &mut Frame, area: Rect, position_ms: u64, max_ms: u64) {
    if area.width < 4 || area.height == 0 {
        return;
    }

    let left_label = fmt_time(position_ms);
    let right_label = fmt_time(max_ms);
    let label_w = (left_label.len() + right_label.len() + 2) as u16;
    let bar_w = area.width.saturating_sub(label_w).max(4) as usize;

    let mut spans = vec![Span::styled(
        format!("{} ", left_label),
        Style::default().fg(C_SECONDARY),
    )];
    spans.push(Span::styled(
        bar(fraction(position_ms, max_ms), bar_w),
        Style::default().fg(C_PLAYING),
    ));
    spans.push(Span::styled(
        format!(" {}", right_label),
        Style::default().fg(C_MUTED),
    ));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn fraction(position_ms: u64, max_ms: u64) -> f64 {
    if max_ms == 0 {
        return 0.0;
    }
    (position_ms as f64 / max_ms as f64).clamp(0.0, 1.0)
}

/// Smooth fill: eight sub-steps per cell.
fn bar(progress: f64, width: usize) -> String {
    let eighths = (progress * width as f64 * 8.0) as usize;
    let full_blocks = (eighths / 8).min(width);
    let partial = eighths % 8;

    let mut bar = String::with_capacity(width * 3);
    bar.extend(std::iter::repeat('█').take(full_blocks));
    if full_blocks < width {
        bar.push(BLOCKS[partial]);
        bar.extend(std::iter::repeat(' ').take(width - full_blocks - 1));
    }
    bar
}

fn fmt_time(ms: u64) -> String {
    let s = ms / 1000;
    format!("{}:{:02}", s / 60, s % 60)
}
