//! Configuration file handling
//!
//! The configuration is a TOML file with INI-style sections:
//!
//! ```toml
//! [serial]
//! ports = ["/dev/tty.usbserial", "COM1"]
//! baud_rate = 9600
//! read_timeout_ms = 100
//!
//! [assembler]
//! program = "as31"
//! args = ["-l"]
//! ```
//!
//! Every key is optional. A missing file means "use the defaults".

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// File name looked up in the current directory
pub const LOCAL_CONFIG_FILE: &str = "r31jp.toml";

/// Commented configuration written by `r31jp config init`
pub const CONFIG_TEMPLATE: &str = r#"# r31jp configuration

[serial]
# Ports tried in order when searching for the board.
ports = ["/dev/tty.usbserial", "/dev/ttyUSB0", "COM1"]
# Also try every port the operating system reports.
scan_system_ports = false
baud_rate = 9600
# How long a single read waits for the board. Queued writes are picked up
# between reads, so this is also the worst-case keystroke latency.
read_timeout_ms = 100
# Pause between two scans while no board is attached.
reconnect_interval_ms = 1000
# How long `send` waits for the board to show up.
connect_timeout_ms = 10000

[assembler]
program = "as31"
args = ["-l"]

[download]
# Time allowed for pressing RESET on the board in MON mode.
prompt_timeout_ms = 30000
# Longest silence tolerated while the monitor acknowledges records.
ack_timeout_ms = 5000

[terminal]
# Print typed characters locally as well as sending them.
echo = false

[source]
# Number of spaces a tab expands to.
tab_length = 4
"#;

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Serial port discovery and I/O
    pub serial: SerialConfig,
    /// Assembler invocation
    pub assembler: AssemblerConfig,
    /// Monitor download protocol
    pub download: DownloadConfig,
    /// Terminal behaviour
    pub terminal: TerminalConfig,
    /// Source text handling
    pub source: SourceConfig,
}

/// Serial port settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SerialConfig {
    /// Port names tried in order
    pub ports: Vec<String>,
    /// Append OS-enumerated ports to the scan list
    pub scan_system_ports: bool,
    /// Baud rate
    pub baud_rate: u32,
    /// Timeout of a single read from the board
    pub read_timeout_ms: u64,
    /// Delay between scans while disconnected
    pub reconnect_interval_ms: u64,
    /// How long to wait for a connection before giving up
    pub connect_timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            ports: vec![
                "/dev/tty.usbserial".to_string(),
                "/dev/ttyUSB0".to_string(),
                "COM1".to_string(),
            ],
            scan_system_ports: false,
            baud_rate: 9600,
            read_timeout_ms: 100,
            reconnect_interval_ms: 1000,
            connect_timeout_ms: 10_000,
        }
    }
}

impl SerialConfig {
    /// Read timeout as a [`Duration`]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Reconnect interval as a [`Duration`]
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    /// Connect timeout as a [`Duration`]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Assembler settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssemblerConfig {
    /// Program to run
    pub program: String,
    /// Arguments placed before the source file name
    pub args: Vec<String>,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            program: "as31".to_string(),
            args: vec!["-l".to_string()],
        }
    }
}

/// Download protocol timeouts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DownloadConfig {
    /// Wait for the monitor prompt (user presses RESET)
    pub prompt_timeout_ms: u64,
    /// Wait for each acknowledgement from the monitor
    pub ack_timeout_ms: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            prompt_timeout_ms: 30_000,
            ack_timeout_ms: 5_000,
        }
    }
}

impl DownloadConfig {
    /// Prompt timeout as a [`Duration`]
    pub fn prompt_timeout(&self) -> Duration {
        Duration::from_millis(self.prompt_timeout_ms)
    }

    /// Acknowledgement timeout as a [`Duration`]
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }
}

/// Terminal settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TerminalConfig {
    /// Echo typed characters locally
    pub echo: bool,
}

/// Source handling settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    /// Spaces per tab
    pub tab_length: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self { tab_length: 4 }
    }
}

impl Config {
    /// Load a configuration from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|source| Error::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the serial worker cannot run with
    ///
    /// A zero read timeout or reconnect interval would make the worker
    /// loop without ever blocking.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("serial.baud_rate", u64::from(self.serial.baud_rate)),
            ("serial.read_timeout_ms", self.serial.read_timeout_ms),
            ("serial.reconnect_interval_ms", self.serial.reconnect_interval_ms),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(Error::InvalidSetting {
                    key,
                    reason: "must be greater than zero",
                });
            }
        }
        Ok(())
    }

    /// Parse a configuration from a TOML string
    pub fn from_toml_str(content: &str) -> core::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Convert the configuration to a TOML string
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load the effective configuration
    ///
    /// An explicit path must exist. Otherwise `./r31jp.toml` and the per-user
    /// configuration file are tried in that order, falling back to defaults.
    /// Returns the file that was used, if any.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            let config = Self::from_toml_file(path)?;
            log::debug!("Loaded configuration from {}", path.display());
            return Ok((config, Some(path.to_path_buf())));
        }

        let candidates = [Some(PathBuf::from(LOCAL_CONFIG_FILE)), user_config_path()];
        for path in candidates.into_iter().flatten() {
            if path.is_file() {
                let config = Self::from_toml_file(&path)?;
                log::debug!("Loaded configuration from {}", path.display());
                return Ok((config, Some(path)));
            }
        }

        log::debug!("No configuration file found, using defaults");
        Ok((Self::default(), None))
    }
}

/// Per-user configuration file location
pub fn user_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "r31jp").map(|dirs| dirs.config_dir().join("config.toml"))
}
