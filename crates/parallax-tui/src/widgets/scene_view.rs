use ratatui::{
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::{App, ElementPose, RevealState};

/// Pixels an element sits below its resting place before its entrance plays
const ENTRANCE_OFFSET_PX: f64 = 40.0;

/// Columns stagger children are indented inside their parent
const CHILD_INDENT: u16 = 4;

pub struct SceneViewWidget;

impl SceneViewWidget {
    pub fn render(frame: &mut Frame, area: Rect, app: &App) {
        let theme = &app.theme;
        let block = Block::default()
            .title(format!(" {} ", app.scene.name))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.grey0))
            .style(Style::default().bg(theme.bg0));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let px_per_row = app.px_per_row();
        let offset = app.offset();

        for element in &app.scene.elements {
            let pose = app.element_pose(element);
            let is_child = app
                .scene
                .groups
                .iter()
                .any(|g| g.children.contains(&element.id));
            let indent = if is_child { CHILD_INDENT } else { 0 };

            let top = element.top + pose.shift_px + (1.0 - pose.entrance) * ENTRANCE_OFFSET_PX
                - offset;
            let height = element.height * pose.scale;
            let Some(rect) = project(top, height, px_per_row, inner, indent, pose.scale) else {
                continue;
            };

            let border_color = match pose.reveal {
                RevealState::Static => theme.idle,
                RevealState::Waiting => theme.pending,
                RevealState::Revealed => theme.revealed,
            };
            let mut text_style = Style::default().fg(theme.fg1);
            if is_faded(&pose) {
                text_style = text_style.fg(theme.grey0).add_modifier(Modifier::DIM);
            }

            let mut title = format!(" {} ", element.label());
            if pose.rotate_deg != 0.0 {
                title.push_str(&format!("↻{:.0}° ", pose.rotate_deg.rem_euclid(360.0)));
            }

            let body = match pose.reveal {
                RevealState::Waiting => Line::from(Span::styled(
                    format!("waiting · {:.0}%", pose.entrance * 100.0),
                    Style::default().fg(theme.grey1),
                )),
                _ => Line::from(Span::styled(element.id.to_string(), text_style)),
            };

            let widget = Paragraph::new(body).alignment(Alignment::Center).block(
                Block::default()
                    .title(Span::styled(title, text_style))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(border_color)),
            );
            frame.render_widget(widget, rect);
        }
    }
}

fn is_faded(pose: &ElementPose) -> bool {
    pose.opacity < 0.35 || pose.entrance < 0.5
}

/// Place a block `top_px` below the top of the viewport, clipped to `area`
fn project(
    top_px: f64,
    height_px: f64,
    px_per_row: f64,
    area: Rect,
    indent: u16,
    scale: f64,
) -> Option<Rect> {
    if !top_px.is_finite() || !height_px.is_finite() || px_per_row <= 0.0 {
        return None;
    }

    let y0 = area.y as i64 + (top_px / px_per_row).round() as i64;
    let rows = ((height_px / px_per_row).round() as i64).max(1);
    let y1 = y0 + rows;

    let top = y0.max(area.y as i64);
    let bottom = y1.min(area.bottom() as i64);
    if bottom <= top {
        return None;
    }

    let available = area.width.saturating_sub(indent * 2);
    let width = ((available as f64 * scale.clamp(0.0, 1.0)).round() as u16).max(1);
    let x = area.x + indent + (available.saturating_sub(width)) / 2;

    Some(Rect::new(x, top as u16, width, (bottom - top) as u16))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area() -> Rect {
        Rect::new(0, 1, 80, 40)
    }

    #[test]
    fn test_project_inside() {
        let rect = project(200.0, 100.0, 20.0, area(), 0, 1.0).unwrap();
        assert_eq!(rect, Rect::new(0, 11, 80, 5));
    }

    #[test]
    fn test_project_clips_top_and_bottom() {
        let rect = project(-100.0, 200.0, 20.0, area(), 0, 1.0).unwrap();
        assert_eq!(rect.y, 1);
        assert_eq!(rect.height, 5);

        let rect = project(780.0, 200.0, 20.0, area(), 0, 1.0).unwrap();
        assert_eq!(rect.bottom(), area().bottom());
        assert_eq!(rect.height, 1);
    }

    #[test]
    fn test_project_outside() {
        assert!(project(900.0, 100.0, 20.0, area(), 0, 1.0).is_none());
        assert!(project(-300.0, 100.0, 20.0, area(), 0, 1.0).is_none());
    }

    #[test]
    fn test_project_scale_and_indent() {
        let rect = project(0.0, 100.0, 20.0, area(), 4, 0.5).unwrap();
        assert_eq!(rect.width, 36);
        assert_eq!(rect.x, 4 + 18);
    }
}
