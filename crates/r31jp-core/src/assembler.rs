//! as31 invocation
//!
//! Sources are copied into a private build directory before assembly so the
//! user's tree never collects `.hex`/`.lst` files, and so the text handed to
//! the assembler is always normalised (see [`crate::source::prepare`]). The
//! build directory is removed when the [`Assembler`] is dropped.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use crate::config::AssemblerConfig;
use crate::diagnostics::{self, Diagnostic};
use crate::error::{Error, Result};
use crate::source;

/// Files produced by a successful assembly
#[derive(Debug, Clone)]
pub struct Artifacts {
    /// Intel HEX output
    pub hex: Vec<u8>,
    /// Location of the HEX file inside the build directory
    pub hex_path: PathBuf,
    /// Listing, when the assembler was asked for one
    pub listing: Option<String>,
    /// Location of the listing file inside the build directory
    pub listing_path: PathBuf,
}

/// Result of running the assembler on a source file
#[derive(Debug, Clone)]
pub enum AssembleOutcome {
    /// Source assembled cleanly
    Success(Artifacts),
    /// The assembler reported errors
    Failed {
        /// Parsed error lines
        diagnostics: Vec<Diagnostic>,
        /// Raw stderr output
        stderr: String,
    },
}

impl AssembleOutcome {
    /// Whether the assembly succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, AssembleOutcome::Success(_))
    }
}

/// Runs the configured assembler in a temporary build directory
#[derive(Debug)]
pub struct Assembler {
    program: String,
    args: Vec<String>,
    tab_length: usize,
    build_dir: TempDir,
}

impl Assembler {
    /// Create an assembler with a fresh build directory
    pub fn new(config: &AssemblerConfig, tab_length: usize) -> Result<Self> {
        let build_dir = tempfile::Builder::new().prefix("r31jp-").tempdir()?;
        log::debug!("Build directory is {}", build_dir.path().display());
        Ok(Self {
            program: config.program.clone(),
            args: config.args.clone(),
            tab_length,
            build_dir,
        })
    }

    /// Directory holding the assembler's input and output files
    pub fn build_dir(&self) -> &Path {
        self.build_dir.path()
    }

    /// Assemble a source file
    pub fn assemble_file(&self, path: &Path) -> Result<AssembleOutcome> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::InvalidSourcePath(path.to_path_buf()))?;
        let code = fs::read_to_string(path)?;
        log::info!("Assembling {}", path.display());
        self.assemble_source(stem, &code)
    }

    /// Assemble source text under the given file stem
    pub fn assemble_source(&self, stem: &str, code: &str) -> Result<AssembleOutcome> {
        let asm_path = self.build_dir().join(format!("{}.asm", stem));
        let hex_path = self.build_dir().join(format!("{}.hex", stem));
        let listing_path = self.build_dir().join(format!("{}.lst", stem));

        // Stale outputs from an earlier run must not pass for fresh ones
        for stale in [&hex_path, &listing_path] {
            if stale.exists() {
                fs::remove_file(stale)?;
            }
        }
        fs::write(&asm_path, source::prepare(code, self.tab_length))?;

        log::debug!("Running {} {:?} {}", self.program, self.args, asm_path.display());
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&asm_path)
            .current_dir(self.build_dir())
            .output()
            .map_err(|source| Error::AssemblerNotFound {
                program: self.program.clone(),
                source,
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            log::debug!("{} stdout:\n{}", self.program, stdout.trim_end());
        }

        let mut diagnostics = diagnostics::parse_diagnostics(&stderr);
        if diagnostics.is_empty() && !output.status.success() {
            diagnostics.push(Diagnostic {
                line: None,
                message: format!("{} exited with {}", self.program, output.status),
            });
        }
        if !diagnostics.is_empty() {
            log::debug!("Assembler reported {} error line(s)", diagnostics.len());
            return Ok(AssembleOutcome::Failed {
                diagnostics,
                stderr,
            });
        }

        let hex = fs::read(&hex_path).map_err(|_| Error::MissingOutput(hex_path.clone()))?;
        let listing = fs::read_to_string(&listing_path).ok();

        Ok(AssembleOutcome::Success(Artifacts {
            hex,
            hex_path,
            listing,
            listing_path,
        }))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    /// Shell stand-in for as31: fails on any line containing BAD
    const FAKE_AS31: &str = r#"#!/bin/sh
for src; do :; done
base="${src%.asm}"
echo "Begin Pass #1" >&2
grep -n BAD "$src" | while IFS=: read -r num rest; do
    echo "$src: line $num: Undefined symbol" >&2
done
echo "Begin Pass #2" >&2
if grep -q BAD "$src"; then exit 1; fi
printf ':03000000020100FA\n:00000001FF\n' > "$base.hex"
cp "$src" "$base.lst"
"#;

    fn fake_assembler(dir: &Path) -> AssemblerConfig {
        let script = dir.join("as31.sh");
        fs::write(&script, FAKE_AS31).unwrap();
        AssemblerConfig {
            program: "sh".to_string(),
            args: vec![script.to_string_lossy().into_owned(), "-l".to_string()],
        }
    }

    #[test]
    fn test_successful_assembly() {
        let dir = tempfile::tempdir().unwrap();
        let assembler = Assembler::new(&fake_assembler(dir.path()), 4).unwrap();
        match assembler.assemble_source("lab", "\tnop").unwrap() {
            AssembleOutcome::Success(artifacts) => {
                assert_eq!(artifacts.hex, b":03000000020100FA\n:00000001FF\n");
                assert!(artifacts.hex_path.starts_with(assembler.build_dir()));
                // The listing is a copy of the normalised input
                assert_eq!(artifacts.listing.as_deref(), Some("    nop\n"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_errors_map_to_lines() {
        let dir = tempfile::tempdir().unwrap();
        let assembler = Assembler::new(&fake_assembler(dir.path()), 4).unwrap();
        let outcome = assembler
            .assemble_source("lab", "start:\n  mov a, BAD\n  sjmp start\n  djnz BAD\n")
            .unwrap();
        match outcome {
            AssembleOutcome::Failed { diagnostics, .. } => {
                assert_eq!(diagnostics::error_lines(&diagnostics), vec![2, 4]);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_stale_hex_is_not_reused() {
        let dir = tempfile::tempdir().unwrap();
        let assembler = Assembler::new(&fake_assembler(dir.path()), 4).unwrap();
        assert!(assembler.assemble_source("lab", "nop").unwrap().is_success());
        assert!(!assembler.assemble_source("lab", "BAD").unwrap().is_success());
        assert!(!assembler.build_dir().join("lab.hex").exists());
    }

    #[test]
    fn test_missing_program() {
        let config = AssemblerConfig {
            program: "/nonexistent/as31".to_string(),
            args: Vec::new(),
        };
        let assembler = Assembler::new(&config, 4).unwrap();
        assert!(matches!(
            assembler.assemble_source("lab", "nop"),
            Err(Error::AssemblerNotFound { .. })
        ));
    }

    #[test]
    fn test_assemble_file_uses_stem() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("blink.asm");
        fs::write(&src, "nop\n").unwrap();
        let assembler = Assembler::new(&fake_assembler(dir.path()), 4).unwrap();
        match assembler.assemble_file(&src).unwrap() {
            AssembleOutcome::Success(artifacts) => {
                assert_eq!(artifacts.hex_path, assembler.build_dir().join("blink.hex"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
