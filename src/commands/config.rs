//! Config command implementations

use std::fs;
use std::path::{Path, PathBuf};

use r31jp_core::config::{user_config_path, Config, CONFIG_TEMPLATE};

use super::{CommandError, CommandResult};

/// Print the effective configuration as TOML
pub fn cmd_show(config: &Config, loaded_from: Option<&Path>) -> CommandResult {
    match loaded_from {
        Some(path) => println!("# Loaded from {}", path.display()),
        None => println!("# Built-in defaults"),
    }
    print!("{}", config.to_toml_string()?);
    Ok(())
}

/// Write the commented default configuration
pub fn cmd_init(path: Option<&Path>, force: bool) -> CommandResult {
    let path: PathBuf = match path {
        Some(path) => path.to_path_buf(),
        None => user_config_path().ok_or(CommandError::NoConfigDir)?,
    };
    if path.exists() && !force {
        return Err(CommandError::ConfigExists(path).into());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, CONFIG_TEMPLATE)?;
    println!("Wrote configuration to {}", path.display());
    Ok(())
}
