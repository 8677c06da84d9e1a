//! Ports command implementation

use r31jp_core::config::Config;
use r31jp_serial::list_ports;

use super::CommandResult;
use crate::ports::virtual_ports;

/// List serial ports and the configured scan order
pub fn run_ports(config: &Config) -> CommandResult {
    let ports = list_ports()?;

    println!("Serial ports:");
    println!();
    if ports.is_empty() {
        println!("  (none found)");
    }
    for port in &ports {
        println!("  {:<24} {}", port.name, port.kind);
    }
    for port in virtual_ports() {
        println!("  {:<24} {}", port.name, port.description);
    }

    println!();
    println!("Scan order: {}", config.serial.ports.join(", "));
    if config.serial.scan_system_ports {
        println!("            followed by every port listed above");
    }
    Ok(())
}
