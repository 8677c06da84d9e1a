//! Assemble command implementation

use std::fs;
use std::path::Path;

use colored::Colorize;
use r31jp_core::assembler::{Artifacts, AssembleOutcome, Assembler};
use r31jp_core::config::Config;
use r31jp_core::diagnostics::{self, Diagnostic};
use r31jp_core::hex::HexImage;
use r31jp_core::source;

use super::{resolve_source, CommandError, CommandResult};

/// Source lines shown around each error
const CONTEXT_LINES: usize = 1;

/// Run the assemble command
pub fn run_assemble(
    config: &Config,
    file: Option<&Path>,
    output: Option<&Path>,
    listing: bool,
) -> CommandResult {
    let source_path = resolve_source(file)?;
    let assembler = Assembler::new(&config.assembler, config.source.tab_length)?;
    let artifacts = assemble_checked(&assembler, &source_path, config.source.tab_length)?;

    let image = HexImage::parse(&artifacts.hex)?;
    describe_image(&image);

    if listing {
        match &artifacts.listing {
            Some(text) => print!("{}", text),
            None => log::warn!("The assembler produced no listing"),
        }
    }

    if let Some(output) = output {
        fs::write(output, &artifacts.hex)?;
        println!("Wrote {} bytes to {:?}", artifacts.hex.len(), output);
    }

    Ok(())
}

/// Assemble `path`, printing the erroneous lines if it fails
pub fn assemble_checked(
    assembler: &Assembler,
    path: &Path,
    tab_length: usize,
) -> CommandResult<Artifacts> {
    match assembler.assemble_file(path)? {
        AssembleOutcome::Success(artifacts) => {
            println!("{}", "Code assembled successfully.".blue());
            Ok(artifacts)
        }
        AssembleOutcome::Failed { diagnostics, .. } => {
            // Same text the assembler saw, so line numbers agree
            let code = source::prepare(&fs::read_to_string(path)?, tab_length);
            print_diagnostics(&code, &diagnostics);
            Err(CommandError::AssemblyFailed(diagnostics.len()).into())
        }
    }
}

/// Log a one-line summary of a HEX image
pub fn describe_image(image: &HexImage) {
    match image.address_range() {
        Some((start, end)) => log::info!(
            "{} bytes in {} records at 0x{:04X}-0x{:04X}",
            image.data_len(),
            image.data_records(),
            start,
            end
        ),
        None => log::warn!("The HEX image contains no data"),
    }
}

/// Print an excerpt of the source with erroneous lines highlighted
fn print_diagnostics(code: &str, diagnostics: &[Diagnostic]) {
    println!("{}", "Error assembling code:".red().bold());

    for entry in diagnostics::excerpt(code, diagnostics, CONTEXT_LINES) {
        let Some(line) = entry else {
            println!("{:>6}", "...");
            continue;
        };
        let text = format!("{:>5} | {}", line.number, line.text);
        if line.is_error() {
            println!("{}", text.white().on_red());
            for message in &line.messages {
                println!("      {} {}", "^".red(), message);
            }
        } else {
            println!("{}", text);
        }
    }

    // Messages without a line in the file
    let last_line = code.lines().count();
    for diagnostic in diagnostics {
        if !matches!(diagnostic.line, Some(n) if n <= last_line) {
            println!("{}", diagnostic.message.red());
        }
    }
}
