//! r31jp-serial - Serial link to the R-31JP board
//!
//! This crate finds the board on one of a list of serial ports, keeps the
//! connection alive across unplugging, queues terminal traffic, and speaks
//! the monitor's download protocol.
//!
//! # Layers
//!
//! - [`transport`] - byte pipe abstraction and the `serialport` backend
//! - [`discovery`] - trying port names until one opens
//! - [`monitor`] - the `*` / `DD` / `>` / `.` download exchange
//! - [`worker`] - one thread owning the port, fed by a FIFO request queue
//!
//! # Example
//!
//! ```no_run
//! use r31jp_serial::{LinkEvent, LinkSettings, SerialConnector, SerialLink};
//! use std::time::Duration;
//!
//! let settings = LinkSettings {
//!     ports: vec!["/dev/ttyUSB0".into(), "COM1".into()],
//!     ..LinkSettings::default()
//! };
//! let mut link = SerialLink::spawn(SerialConnector, settings)?;
//! let events = link.take_events().unwrap();
//!
//! if link.wait_connected(Duration::from_secs(5)) {
//!     link.write(b"D".to_vec())?;
//! }
//! while let Ok(event) = events.recv_timeout(Duration::from_millis(500)) {
//!     if let LinkEvent::Received(data) = event {
//!         print!("{}", String::from_utf8_lossy(&data));
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]

pub mod discovery;
pub mod error;
pub mod monitor;
pub mod transport;
pub mod worker;

// Re-exports
pub use discovery::{
    list_ports, BoxedTransport, Connector, PortDescription, PortScanner, PortSettings,
    SerialConnector,
};
pub use error::{Result, SerialError};
pub use monitor::{DownloadObserver, DownloadReport, DownloadStage, DownloadTimeouts};
pub use transport::serial::SerialTransport;
pub use transport::Transport;
pub use worker::{LinkEvent, LinkSettings, SerialLink};
