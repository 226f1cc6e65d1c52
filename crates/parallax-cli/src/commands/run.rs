use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen, SetTitle},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    Terminal,
};

use parallax_core::AppConfig;
use parallax_tui::{
    event::{AppEvent, EventHandler},
    input::{apply_action, handle_key_event},
    widgets::{InspectorWidget, SceneViewWidget, StatusBarWidget},
    App,
};

pub fn run(config: AppConfig, scene: Option<&Path>) -> Result<()> {
    let scene = super::load_scene(scene)?;
    let config = Arc::new(config);

    // Build before touching the terminal so scene errors print normally
    let mut app = App::new(config.clone(), scene)?;
    tracing::info!("Previewing scene '{}'", app.scene.name);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, SetTitle("parallax"))?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = main_loop(&mut terminal, &mut app, &config);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn main_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    config: &AppConfig,
) -> Result<()> {
    let event_handler = EventHandler::new(config.preview.tick_rate_ms, config.frame.fps);
    let mut last_frame = Instant::now();

    loop {
        let now = Instant::now();
        app.advance(now.duration_since(last_frame).as_secs_f64());
        last_frame = now;

        // Draw UI
        terminal.draw(|frame| {
            let size = frame.area();

            // Main layout: content + status bar
            let main_layout = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(1), Constraint::Length(1)])
                .split(size);

            let page_area = if app.show_inspector {
                let columns = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([Constraint::Ratio(3, 5), Constraint::Ratio(2, 5)])
                    .split(main_layout[0]);
                InspectorWidget::render(frame, columns[1], app);
                columns[0]
            } else {
                main_layout[0]
            };

            // Page rows exclude the block border
            app.set_viewport_rows(page_area.height.saturating_sub(2));
            SceneViewWidget::render(frame, page_area, app);
            StatusBarWidget::render(frame, main_layout[1], app);
        })?;

        // Use the animation frame rate while anything is moving
        let event = if app.is_animating() {
            event_handler.next_animation()?
        } else {
            event_handler.next()?
        };

        if let Some(event) = event {
            match event {
                AppEvent::Key(key) => {
                    app.clear_status();
                    let action = handle_key_event(key, app);
                    if let Err(e) = apply_action(app, action) {
                        tracing::error!("Action failed: {}", e);
                        app.set_status(format!("Error: {}", e));
                    }
                }
                AppEvent::Resize(_, _) => {
                    // Layout is recomputed on the next draw
                }
                AppEvent::Tick => {}
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
