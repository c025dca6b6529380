//! Configuration view and validation commands: `swiftflow config`.

use std::path::Path;

use anyhow::{Context, Result};

use super::super::ConfigCommands;
use swiftflow::config::{AppConfig, DEFAULT_CONFIG_FILE};

pub fn cmd_config(
    config: &AppConfig,
    config_path: Option<&Path>,
    command: Option<ConfigCommands>,
) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            print!("{}", config.to_toml()?);
        }
        Some(ConfigCommands::Validate) => {
            // Resolving the layers already validated every value.
            println!("Configuration is valid.");
        }
        Some(ConfigCommands::Init) => cmd_config_init(config_path)?,
    }
    Ok(())
}

/// Write the default configuration, refusing to overwrite an existing file.
pub fn cmd_config_init(config_path: Option<&Path>) -> Result<()> {
    let path = config_path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
    if path.exists() {
        println!("{} already exists.", path.display());
        println!("Delete it first if you want to recreate it.");
        return Ok(());
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, AppConfig::default().to_toml()?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Created {}", path.display());
    Ok(())
}
