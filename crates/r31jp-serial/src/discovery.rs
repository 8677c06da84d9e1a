//! Port discovery
//!
//! The board is found by trying a list of port names in order; the first one
//! that opens wins. [`Connector`] is the seam where the real serial ports
//! (or an emulator) plug in.

use std::time::Duration;

use crate::error::Result;
use crate::transport::serial::SerialTransport;
use crate::transport::Transport;

/// Boxed transport as handed out by a [`Connector`]
pub type BoxedTransport = Box<dyn Transport>;

/// Port parameters applied when opening
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSettings {
    /// Baud rate
    pub baud_rate: u32,
    /// Initial read timeout
    pub read_timeout: Duration,
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            read_timeout: Duration::from_millis(100),
        }
    }
}

/// Opens transports by port name
pub trait Connector: Send {
    /// Open the named port
    fn open(&self, name: &str, settings: &PortSettings) -> Result<BoxedTransport>;

    /// Ports reported by the system, used when system scanning is enabled
    fn system_ports(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Connector for real serial ports
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialConnector;

impl Connector for SerialConnector {
    fn open(&self, name: &str, settings: &PortSettings) -> Result<BoxedTransport> {
        let transport = SerialTransport::open(name, settings.baud_rate, settings.read_timeout)?;
        Ok(Box::new(transport))
    }

    fn system_ports(&self) -> Vec<String> {
        list_ports()
            .map(|ports| ports.into_iter().map(|p| p.name).collect())
            .unwrap_or_default()
    }
}

/// A serial port reported by the operating system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDescription {
    /// Port name (device path or COM name)
    pub name: String,
    /// Human readable description of the port type
    pub kind: String,
}

/// Enumerate the serial ports known to the operating system
pub fn list_ports() -> Result<Vec<PortDescription>> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|port| {
            let kind = match port.port_type {
                serialport::SerialPortType::UsbPort(usb) => {
                    let mut kind = format!("USB {:04x}:{:04x}", usb.vid, usb.pid);
                    if let Some(product) = usb.product {
                        kind.push(' ');
                        kind.push_str(&product);
                    }
                    kind
                }
                serialport::SerialPortType::PciPort => "PCI".to_string(),
                serialport::SerialPortType::BluetoothPort => "Bluetooth".to_string(),
                serialport::SerialPortType::Unknown => "unknown".to_string(),
            };
            PortDescription {
                name: port.port_name,
                kind,
            }
        })
        .collect())
}

/// Tries candidate ports in order
pub struct PortScanner<C> {
    connector: C,
    ports: Vec<String>,
    scan_system_ports: bool,
    settings: PortSettings,
}

impl<C: Connector> PortScanner<C> {
    /// Create a scanner over the given port names
    pub fn new(connector: C, ports: Vec<String>, settings: PortSettings) -> Self {
        Self {
            connector,
            ports,
            scan_system_ports: false,
            settings,
        }
    }

    /// Also try ports enumerated by the system, after the configured ones
    pub fn with_system_ports(mut self, enabled: bool) -> Self {
        self.scan_system_ports = enabled;
        self
    }

    /// Settings used when opening a port
    pub fn settings(&self) -> &PortSettings {
        &self.settings
    }

    /// Candidate names in scan order, without duplicates
    pub fn candidates(&self) -> Vec<String> {
        let mut names = self.ports.clone();
        if self.scan_system_ports {
            for name in self.connector.system_ports() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Open the first candidate that works
    pub fn scan(&self) -> Option<(String, BoxedTransport)> {
        for name in self.candidates() {
            match self.connector.open(&name, &self.settings) {
                Ok(transport) => return Some((name, transport)),
                Err(e) => log::trace!("Port {} unavailable: {}", name, e),
            }
        }
        None
    }
}
