use std::path::Path;

use anyhow::{bail, Result};

use parallax_core::motion::{FrameSnapshot, HostEvent};
use parallax_core::AppConfig;

use crate::OutputFormat;

/// Scroll offsets fed to the engine, one per frame
#[derive(Debug, Clone, Copy)]
pub struct ScrollPlan {
    pub from: f64,
    pub to: f64,
    pub ramp: u32,
    pub frames: u32,
    pub every: u32,
}

impl ScrollPlan {
    /// Offset for frame `frame` (1-based)
    pub fn offset_at(&self, frame: u32) -> f64 {
        if self.ramp == 0 || frame >= self.ramp {
            return self.to;
        }
        let t = frame as f64 / self.ramp as f64;
        self.from + (self.to - self.from) * t
    }

    fn should_print(&self, frame: u32) -> bool {
        frame == self.frames || (self.every > 0 && frame % self.every == 0)
    }
}

pub fn run(
    config: &AppConfig,
    scene: Option<&Path>,
    plan: ScrollPlan,
    format: OutputFormat,
) -> Result<()> {
    if !plan.from.is_finite() || !plan.to.is_finite() {
        bail!("Scroll offsets must be finite");
    }

    let scene = super::load_scene(scene)?;
    let bus = scene.host();
    bus.dispatch(HostEvent::Scroll { offset: plan.from });
    let mut root = scene.build(&bus, config)?;
    let dt = config.frame.step_secs();

    tracing::info!(
        "Simulating '{}' for {} frames at {} fps",
        scene.name,
        plan.frames,
        config.frame.fps
    );

    if format == OutputFormat::Table {
        let snapshot = root.snapshot();
        let columns: Vec<String> = snapshot
            .derived_values
            .keys()
            .chain(snapshot.loop_values.keys())
            .cloned()
            .collect();
        print_header(&columns);
    }

    for frame in 1..=plan.frames {
        let offset = plan.offset_at(frame);
        if offset != bus.viewport().offset {
            bus.dispatch(HostEvent::Scroll { offset });
        }
        let snapshot = root.tick(dt);

        if plan.should_print(frame) {
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string(snapshot)?),
                OutputFormat::Table => print_row(snapshot),
            }
        }
    }

    Ok(())
}

fn print_header(channels: &[String]) {
    let mut header = format!("{:>6} {:>8} {:>9} {:>9}", "frame", "time", "progress", "smoothed");
    for channel in channels {
        header.push_str(&format!(" {:>14}", channel));
    }
    header.push_str("  revealed");
    println!("{}", header);
}

fn print_row(snapshot: &FrameSnapshot) {
    let mut row = format!(
        "{:>6} {:>8.3} {:>9.4} {:>9.4}",
        snapshot.frame, snapshot.time, snapshot.progress, snapshot.smoothed
    );
    for value in snapshot
        .derived_values
        .values()
        .chain(snapshot.loop_values.values())
    {
        row.push_str(&format!(" {:>14.3}", value));
    }

    let revealed: Vec<String> = snapshot
        .reveal_flags
        .iter()
        .filter(|(_, visible)| **visible)
        .map(|(id, _)| {
            if snapshot.just_revealed.contains(id) {
                format!("{}*", id)
            } else {
                id.to_string()
            }
        })
        .collect();
    row.push_str("  ");
    row.push_str(&revealed.join(","));
    println!("{}", row);
}
