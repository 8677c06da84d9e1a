//! r31jp-core - Host-side building blocks for R-31JP development
//!
//! This crate holds everything that does not touch the serial port:
//!
//! - [`config`] - the TOML configuration file (serial ports, timeouts,
//!   assembler command line)
//! - [`source`] - normalisation of 8051 assembly source text
//! - [`assembler`] - running `as31` in a private build directory
//! - [`diagnostics`] - mapping assembler error output back to source lines
//! - [`hex`] - validation of the Intel HEX image sent to the monitor
//! - [`session`] - remembering the last source file that was used
//!
//! # Example
//!
//! ```ignore
//! use r31jp_core::assembler::{AssembleOutcome, Assembler};
//! use r31jp_core::config::Config;
//!
//! let config = Config::default();
//! let assembler = Assembler::new(&config.assembler, config.source.tab_length)?;
//! match assembler.assemble_file("code/lab.asm".as_ref())? {
//!     AssembleOutcome::Success(artifacts) => println!("{} bytes of HEX", artifacts.hex.len()),
//!     AssembleOutcome::Failed { diagnostics, .. } => {
//!         for diag in diagnostics {
//!             println!("{}", diag);
//!         }
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod assembler;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod hex;
pub mod session;
pub mod source;

pub use error::{Error, Result};
