use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::app::App;

const BAR_WIDTH: usize = 16;

pub struct InspectorWidget;

impl InspectorWidget {
    pub fn render(frame: &mut Frame, area: Rect, app: &App) {
        let theme = &app.theme;
        let snapshot = app.snapshot();
        let heading = Style::default()
            .fg(theme.yellow)
            .add_modifier(Modifier::BOLD);
        let label = Style::default().fg(theme.grey2);
        let value = Style::default().fg(theme.fg0);

        let mut lines = vec![
            Line::from(vec![
                Span::styled("progress ", label),
                Span::styled(bar(snapshot.progress, BAR_WIDTH), Style::default().fg(theme.aqua)),
                Span::styled(format!(" {:.3}", snapshot.progress), value),
            ]),
            Line::from(vec![
                Span::styled("smoothed ", label),
                Span::styled(bar(snapshot.smoothed, BAR_WIDTH), Style::default().fg(theme.blue)),
                Span::styled(format!(" {:.3}", snapshot.smoothed), value),
            ]),
            Line::from(Span::styled(
                format!("frame {}  t={:.2}s", snapshot.frame, snapshot.time),
                label,
            )),
            Line::default(),
            Line::from(Span::styled("Channels", heading)),
        ];

        for channel in app.root().channels() {
            let current = snapshot.value(&channel.id).unwrap_or(0.0);
            lines.push(Line::from(vec![
                Span::styled(format!("  {:<16}", channel.id), label),
                Span::styled(channel.unit.format(current), value),
            ]));
        }

        let mut loops = app.root().loops().peekable();
        if loops.peek().is_some() {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled("Loops", heading)));
        }
        for animation in loops {
            let current = snapshot.loop_value(&animation.id).unwrap_or(0.0);
            lines.push(Line::from(vec![
                Span::styled(format!("  {:<16}", animation.id), label),
                Span::styled(animation.unit.format(current), value),
                Span::styled(format!("  /{}s", animation.duration), label),
            ]));
        }

        lines.push(Line::default());
        lines.push(Line::from(Span::styled("Reveals", heading)));
        for (id, revealed) in &snapshot.reveal_flags {
            let (marker, color) = if *revealed {
                ("●", theme.revealed)
            } else {
                ("○", theme.pending)
            };
            let mut spans = vec![
                Span::styled(format!("  {} ", marker), Style::default().fg(color)),
                Span::styled(format!("{:<14}", id), value),
                Span::styled(
                    format!("{:>4.0}%", snapshot.transition(id.as_str()) * 100.0),
                    label,
                ),
            ];
            if let Some(delay) = snapshot.stagger_delays.get(id) {
                spans.push(Span::styled(
                    format!("  +{:.2}s", delay),
                    Style::default().fg(theme.purple),
                ));
            }
            if snapshot.just_revealed.contains(id) {
                spans.push(Span::styled("  new", Style::default().fg(theme.orange)));
            }
            lines.push(Line::from(spans));
        }

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
            Block::default()
                .title(" Inspector ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.grey0))
                .style(Style::default().bg(theme.bg1)),
        );
        frame.render_widget(paragraph, area);
    }
}

/// Text progress bar for a value in [0, 1]
fn bar(value: f64, width: usize) -> String {
    let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
    let filled = (value * width as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}
