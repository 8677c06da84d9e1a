//! r31jp - Assembler front end and serial terminal for the R-31JP
//!
//! Writes 8051 programs onto an R-31JP board running the MON monitor.
//!
//! # Architecture
//!
//! - `r31jp-core` runs `as31` in a private build directory, maps its error
//!   messages back to source lines and validates the Intel HEX output
//! - `r31jp-serial` finds the board on a list of ports, keeps reconnecting,
//!   and owns the port from a single worker thread fed by a request queue
//! - this binary wires them into `assemble`, `send` and `term` commands
//!
//! `send` is the whole round trip: assemble, check the HEX, wait for RESET
//! in MON mode, download, and optionally stay in the terminal.

mod cli;
mod commands;
mod ports;

use std::process::ExitCode;

use clap::Parser;
use cli::{Cli, Commands, ConfigCommands};
use r31jp_core::config::Config;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if std::env::var_os("RUST_LOG").is_none() {
        logger.filter_level(match cli.verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        });
    }
    logger.init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> commands::CommandResult {
    let (mut config, loaded_from) = Config::load(cli.config.as_deref())?;

    // Command line overrides
    if let Some(port) = cli.port {
        config.serial.ports = vec![port];
        config.serial.scan_system_ports = false;
    }
    if let Some(baud) = cli.baud {
        config.serial.baud_rate = baud;
    }
    config.validate()?;

    match cli.command {
        Commands::Assemble {
            file,
            output,
            listing,
        } => commands::assemble::run_assemble(
            &config,
            file.as_deref(),
            output.as_deref(),
            listing,
        ),
        Commands::Send { file, term } => commands::send::run_send(&config, file.as_deref(), term),
        Commands::Term => commands::term::run_term(&config),
        Commands::Ports => commands::ports::run_ports(&config),
        Commands::Clean { file, write } => commands::clean::run_clean(&config, &file, write),
        Commands::Config(subcmd) => match subcmd {
            ConfigCommands::Show => commands::config::cmd_show(&config, loaded_from.as_deref()),
            ConfigCommands::Init { path, force } => {
                commands::config::cmd_init(path.as_deref(), force)
            }
        },
    }
}
