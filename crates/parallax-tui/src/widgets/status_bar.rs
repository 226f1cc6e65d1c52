use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::app::App;

pub struct StatusBarWidget;

impl StatusBarWidget {
    pub fn render(frame: &mut Frame, area: Rect, app: &App) {
        let theme = &app.theme;
        let mode_str = if app.paused { "PAUSED" } else { "LIVE" };
        let snapshot = app.snapshot();

        let status_text = if let Some(msg) = &app.status_message {
            format!(" {} | {}", mode_str, msg)
        } else {
            format!(
                " {} | {:.0}/{:.0}px | progress {:.1}% | frame {}",
                mode_str,
                app.offset(),
                app.max_offset(),
                snapshot.progress * 100.0,
                snapshot.frame
            )
        };

        let help_hint = " q:quit j/k:scroll gg/G:ends p:pause .:step r:replay i:inspector ";
        let padding_len = area
            .width
            .saturating_sub(status_text.chars().count() as u16 + help_hint.len() as u16)
            as usize;

        let line = Line::from(vec![
            Span::styled(status_text, Style::default().fg(theme.fg0).bg(theme.bg2)),
            Span::styled(" ".repeat(padding_len), Style::default().bg(theme.bg2)),
            Span::styled(help_hint, Style::default().fg(theme.grey2).bg(theme.bg2)),
        ]);

        frame.render_widget(Paragraph::new(line), area);
    }
}
