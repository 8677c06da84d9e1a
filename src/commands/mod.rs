//! CLI command implementations
//!
//! Every command receives the effective
//! [`Config`](r31jp_core::config::Config), after `--port` and
//! `--baud` have been applied.
//!
//! ## Board commands
//!
//! `send` and `term` start a [`r31jp_serial::SerialLink`] through
//! [`crate::ports::AppConnector`], so they work the same against a real
//! board and the emulated one.
//!
//! ## Offline commands
//!
//! `assemble`, `clean`, `config` and `ports` never open a port.

pub mod assemble;
pub mod clean;
pub mod config;
pub mod ports;
pub mod send;
pub mod term;

use std::path::{Path, PathBuf};
use std::time::Duration;

use r31jp_core::session::Session;
use thiserror::Error;

/// Result type shared by the commands
pub type CommandResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Failures reported by the commands themselves
#[derive(Debug, Error)]
pub enum CommandError {
    /// The assembler reported errors; they have been printed already
    #[error("Assembly failed with {0} error(s)")]
    AssemblyFailed(usize),

    /// No board answered on any port
    #[error("No board found within {0:?}")]
    NoBoard(Duration),

    /// `config init` would overwrite a file
    #[error("{} already exists (use --force to overwrite)", .0.display())]
    ConfigExists(PathBuf),

    /// The platform has no per-user directories
    #[error("Could not determine the user configuration directory")]
    NoConfigDir,
}

/// Pick the source file for `assemble` and `send`
///
/// An explicit path is remembered for the next run. Session file problems
/// are logged and otherwise ignored.
pub fn resolve_source(explicit: Option<&Path>) -> CommandResult<PathBuf> {
    let session_path = Session::default_path();
    let mut session = match &session_path {
        Some(path) => Session::load_from(path).unwrap_or_else(|e| {
            log::warn!("Ignoring session file: {}", e);
            Session::default()
        }),
        None => Session::default(),
    };

    let source = session.resolve_source(explicit)?;
    if !source.is_file() {
        return Err(format!("Source file not found: {}", source.display()).into());
    }

    session.remember(&source);
    if let Some(path) = &session_path {
        if let Err(e) = session.save_to(path) {
            log::warn!("Could not save session to {}: {}", path.display(), e);
        }
    }
    Ok(source)
}
