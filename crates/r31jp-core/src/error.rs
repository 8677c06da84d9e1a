//! Error types for r31jp-core

use std::path::PathBuf;

use thiserror::Error;

use crate::hex::HexError;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error while reading or writing a file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration or session file could not be parsed
    #[error("Failed to parse {path}: {source}")]
    Parse {
        /// File that failed to parse
        path: PathBuf,
        /// Underlying TOML error
        #[source]
        source: toml::de::Error,
    },

    /// A configuration value is out of range
    #[error("Invalid value for {key}: {reason}")]
    InvalidSetting {
        /// Dotted key, e.g. `serial.read_timeout_ms`
        key: &'static str,
        /// Why the value was refused
        reason: &'static str,
    },

    /// Configuration could not be serialized
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The assembler program could not be started
    #[error("Could not run assembler '{program}': {source}")]
    AssemblerNotFound {
        /// Program that was invoked
        program: String,
        /// Error returned by the OS
        #[source]
        source: std::io::Error,
    },

    /// The assembler reported success but did not produce its output
    #[error("Assembler produced no output file {}", .0.display())]
    MissingOutput(PathBuf),

    /// The source path has no usable file name
    #[error("Not an assembly source file: {}", .0.display())]
    InvalidSourcePath(PathBuf),

    /// A line of the Intel HEX image is malformed
    #[error("Invalid HEX record on line {line}: {reason}")]
    InvalidHex {
        /// 1-based line number inside the HEX file
        line: usize,
        /// What was wrong with the record
        reason: HexError,
    },

    /// No source file given and none remembered from an earlier run
    #[error("No source file given and no previously used file remembered")]
    NoSourceFile,
}

/// Result type for core operations
pub type Result<T> = core::result::Result<T, Error>;
