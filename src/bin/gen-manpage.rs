//! Man page generator for r31jp
//!
//! Usage: cargo run --bin gen-manpage -- [output-dir]

use clap::CommandFactory;
use std::fs;
use std::path::PathBuf;

#[path = "../cli.rs"]
mod cli;

// cli.rs builds the --port help from the port registry
#[allow(dead_code)]
#[path = "../ports.rs"]
mod ports;

fn main() -> std::io::Result<()> {
    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("man"));

    fs::create_dir_all(&output_dir)?;

    let cmd = cli::Cli::command();
    let name = cmd.get_name().to_string();

    // One page for the tool and one per subcommand
    let mut pages = vec![(name.clone(), cmd.clone())];
    for sub in cmd.get_subcommands() {
        pages.push((format!("{}-{}", name, sub.get_name()), sub.clone()));
    }

    for (page, command) in pages {
        let mut buffer = Vec::new();
        clap_mangen::Man::new(command)
            .title(page.clone())
            .render(&mut buffer)?;
        let output_path = output_dir.join(format!("{}.1", page));
        fs::write(&output_path, buffer)?;
        println!("Man page generated at: {}", output_path.display());
    }

    println!("\nTo view the main page:");
    println!("  man -l {}", output_dir.join(format!("{}.1", name)).display());

    Ok(())
}
