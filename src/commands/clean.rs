//! Clean command implementation

use std::fs;
use std::path::Path;

use r31jp_core::config::Config;
use r31jp_core::source;

use super::CommandResult;

/// Normalise whitespace in a source file
///
/// Prints the result unless `write` is set, in which case the file is
/// rewritten in place when anything changed.
pub fn run_clean(config: &Config, file: &Path, write: bool) -> CommandResult {
    let code = fs::read_to_string(file)?;
    let cleaned = source::clean(&code, config.source.tab_length);

    if !write {
        print!("{}", cleaned);
    } else if cleaned == code {
        println!("{:?} is already clean", file);
    } else {
        fs::write(file, &cleaned)?;
        println!("Cleaned {:?}", file);
    }
    Ok(())
}
