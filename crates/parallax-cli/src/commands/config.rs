use std::path::Path;

use anyhow::Result;

use parallax_core::AppConfig;

pub fn show(config: &AppConfig) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    println!("{}", content);
    Ok(())
}

pub fn init(path: &Path) -> Result<()> {
    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }

    AppConfig::default().save(path)?;
    tracing::info!("Wrote default config to {}", path.display());
    println!("Created {}", path.display());
    Ok(())
}

pub fn path(path: &Path) -> Result<()> {
    println!("{}", path.display());
    Ok(())
}
