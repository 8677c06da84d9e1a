//! CLI argument parsing

use crate::ports;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "r31jp")]
#[command(author, version, about = "Assembler front end and serial terminal for the R-31JP 8051 board", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file
    /// Defaults to ./r31jp.toml, then the per-user config.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = ports::port_help())]
    pub port: Option<String>,

    /// Baud rate
    #[arg(short, long, global = true)]
    pub baud: Option<u32>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Assemble a source file with as31
    Assemble {
        /// Source file (defaults to the last file used)
        file: Option<PathBuf>,

        /// Copy the HEX output here
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the assembler listing
        #[arg(short, long)]
        listing: bool,
    },

    /// Assemble a source file and download it to the board
    Send {
        /// Source file (defaults to the last file used)
        file: Option<PathBuf>,

        /// Stay in the terminal after downloading
        #[arg(short, long)]
        term: bool,
    },

    /// Talk to the board over the serial port (Ctrl-] exits)
    Term,

    /// List serial ports reported by the system
    Ports,

    /// Tidy up whitespace in a source file
    Clean {
        /// Source file
        file: PathBuf,

        /// Rewrite the file instead of printing the result
        #[arg(short, long)]
        write: bool,
    },

    /// Configuration file operations
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Write a commented default configuration file
    Init {
        /// Where to write it (defaults to the per-user config.toml)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
