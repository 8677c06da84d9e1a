//! Port registration and dispatch
//!
//! Real serial devices go through [`SerialConnector`]. Builds with the
//! `dummy` feature also answer to the port name `dummy` with an emulated
//! board, so the whole tool can be tried without hardware.

use r31jp_core::config::Config;
use r31jp_serial::{
    BoxedTransport, Connector, DownloadTimeouts, LinkSettings, PortSettings, Result,
    SerialConnector,
};

#[cfg(feature = "dummy")]
use r31jp_dummy::{DummyBoard, DummyConnector, DUMMY_PORT};

/// Information about a pseudo port built into the binary
pub struct VirtualPort {
    /// Name accepted by `--port`
    pub name: &'static str,
    /// Short description
    pub description: &'static str,
}

/// Pseudo ports enabled at compile time
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn virtual_ports() -> Vec<VirtualPort> {
    let mut ports = Vec::new();

    #[cfg(feature = "dummy")]
    ports.push(VirtualPort {
        name: DUMMY_PORT,
        description: "Emulated R-31JP monitor for testing",
    });

    ports
}

/// Help text for the `--port` argument
pub fn port_help() -> String {
    let mut help = String::from("Serial port to use instead of scanning the configured list");
    let names: Vec<&str> = virtual_ports().iter().map(|p| p.name).collect();
    if !names.is_empty() {
        help.push_str(&format!(" [also: {}]", names.join(", ")));
    }
    help
}

/// Connector used by the CLI
///
/// The emulated board lives as long as the connector, so reconnecting finds
/// the same board again.
pub struct AppConnector {
    serial: SerialConnector,
    #[cfg(feature = "dummy")]
    dummy: DummyConnector,
}

impl Default for AppConnector {
    fn default() -> Self {
        Self {
            serial: SerialConnector,
            #[cfg(feature = "dummy")]
            dummy: DummyConnector::new(DummyBoard::new_default()),
        }
    }
}

impl Connector for AppConnector {
    fn open(&self, name: &str, settings: &PortSettings) -> Result<BoxedTransport> {
        #[cfg(feature = "dummy")]
        if name == DUMMY_PORT {
            return self.dummy.open(name, settings);
        }
        self.serial.open(name, settings)
    }

    fn system_ports(&self) -> Vec<String> {
        self.serial.system_ports()
    }
}

/// Worker settings from the effective configuration
pub fn link_settings(config: &Config) -> LinkSettings {
    LinkSettings {
        ports: config.serial.ports.clone(),
        scan_system_ports: config.serial.scan_system_ports,
        port: PortSettings {
            baud_rate: config.serial.baud_rate,
            read_timeout: config.serial.read_timeout(),
        },
        reconnect_interval: config.serial.reconnect_interval(),
        download: DownloadTimeouts {
            prompt: config.download.prompt_timeout(),
            ack: config.download.ack_timeout(),
        },
    }
}
