use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use parallax_core::AppConfig;

mod commands;

#[derive(Parser)]
#[command(name = "parallax")]
#[command(author, version, about = "Preview and simulate scroll-linked landing page motion")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Use this config file instead of ~/.config/parallax/config.toml
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Preview a scene in the terminal
    Run {
        /// Scene file (.toml or .json); the built-in landing page when omitted
        scene: Option<PathBuf>,
    },
    /// Run a scene headless and print frame snapshots
    Simulate {
        /// Scene file (.toml or .json); the built-in landing page when omitted
        scene: Option<PathBuf>,
        /// Scroll offset at the first frame
        #[arg(long, default_value_t = 0.0)]
        from: f64,
        /// Scroll offset to end on
        #[arg(long)]
        to: f64,
        /// Frames over which the scroll moves from `from` to `to` (0 jumps)
        #[arg(long, default_value_t = 0)]
        ramp: u32,
        /// Total frames to simulate
        #[arg(short = 'n', long, default_value_t = 120)]
        frames: u32,
        /// Print every Nth frame (the last frame is always printed)
        #[arg(long, default_value_t = 10)]
        every: u32,
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Check that a scene registers without configuration errors
    Validate {
        scene: PathBuf,
    },
    /// Print the delay of each child in a stagger plan
    Stagger {
        /// Number of children
        #[arg(allow_negative_numbers = true)]
        count: i64,
        /// Delay of the first child in seconds (config `stagger.base_delay` when omitted)
        #[arg(short, long)]
        base: Option<f64>,
        /// Extra delay per child in seconds (config `stagger.increment` when omitted)
        #[arg(short, long)]
        increment: Option<f64>,
    },
    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write the default configuration if no config file exists
    Init,
    /// Print the config file location
    Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.clone().unwrap_or_else(AppConfig::config_path);
    let config = AppConfig::load_from(&config_path)?;

    // The preview owns the terminal, so its logs go to a file
    let log_to_file = matches!(cli.command, Some(Commands::Run { .. }) | None);
    init_logging(&config, log_to_file)?;

    match cli.command {
        Some(Commands::Run { scene }) => commands::run::run(config, scene.as_deref()),
        None => commands::run::run(config, None),
        Some(Commands::Simulate {
            scene,
            from,
            to,
            ramp,
            frames,
            every,
            format,
        }) => commands::simulate::run(
            &config,
            scene.as_deref(),
            commands::simulate::ScrollPlan {
                from,
                to,
                ramp,
                frames,
                every,
            },
            format,
        ),
        Some(Commands::Validate { scene }) => commands::validate::run(&config, &scene),
        Some(Commands::Stagger {
            count,
            base,
            increment,
        }) => commands::stagger::run(
            count,
            base.unwrap_or(config.stagger.base_delay),
            increment.unwrap_or(config.stagger.increment),
        ),
        Some(Commands::Config { action }) => match action {
            ConfigAction::Show => commands::config::show(&config),
            ConfigAction::Init => commands::config::init(&config_path),
            ConfigAction::Path => commands::config::path(&config_path),
        },
    }
}

/// Initialize tracing from RUST_LOG, falling back to `general.log_level`
fn init_logging(config: &AppConfig, to_file: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
    );

    if to_file {
        let log_path = config.log_path();
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    Ok(())
}
