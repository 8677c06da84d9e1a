use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Shell stand-in for as31: fails on any line containing BAD
#[cfg(unix)]
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

/// Isolated home and working directory for one test
struct TestEnv {
    _tmp: TempDir,
    home: PathBuf,
    work: PathBuf,
}

impl TestEnv {
    fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let home = tmp.path().join("home");
        let work = tmp.path().join("work");
        fs::create_dir_all(&home).expect("create isolated home");
        fs::create_dir_all(&work).expect("create work dir");
        Self {
            _tmp: tmp,
            home,
            work,
        }
    }

    /// Environment with the fake assembler and fast serial timings in ./r31jp.toml
    #[cfg(unix)]
    fn with_fake_assembler() -> Self {
        let env = Self::new();
        let script = env.work.join("as31.sh");
        fs::write(&script, FAKE_AS31).expect("write fake assembler");
        let config = format!(
            r#"[serial]
read_timeout_ms = 10
reconnect_interval_ms = 20
connect_timeout_ms = 2000

[assembler]
program = "sh"
args = ["{}", "-l"]

[download]
prompt_timeout_ms = 2000
ack_timeout_ms = 2000
"#,
            script.display()
        );
        fs::write(env.work.join("r31jp.toml"), config).expect("write config");
        env
    }

    fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("r31jp");
        cmd.current_dir(&self.work)
            .env("HOME", &self.home)
            .env("XDG_CONFIG_HOME", self.home.join(".config"))
            .env("XDG_DATA_HOME", self.home.join(".local/share"))
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG");
        cmd
    }

    fn write_source(&self, name: &str, code: &str) -> PathBuf {
        let path = self.work.join(name);
        fs::write(&path, code).expect("write source");
        path
    }

    fn path(&self, name: &str) -> PathBuf {
        self.work.join(name)
    }
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).expect("read file")
}

#[test]
fn config_show_defaults() {
    let env = TestEnv::new();
    env.cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(contains("# Built-in defaults"))
        .stdout(contains("baud_rate = 9600"))
        .stdout(contains("program = \"as31\""));
}

#[test]
fn verbose_flag_enables_debug_logs() {
    let env = TestEnv::new();
    env.cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stderr(contains("No configuration file found").not());
    env.cmd()
        .args(["-v", "config", "show"])
        .assert()
        .success()
        .stderr(contains("No configuration file found"));
}

#[cfg(feature = "dummy")]
#[test]
fn port_help_lists_dummy_board() {
    let env = TestEnv::new();
    env.cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("[also: dummy]"));
}

#[test]
fn config_init_then_show() {
    let env = TestEnv::new();
    let path = env.path("custom.toml");

    env.cmd()
        .args(["config", "init"])
        .arg(&path)
        .assert()
        .success()
        .stdout(contains("Wrote configuration"));
    assert!(read(&path).contains("[serial]"));

    env.cmd()
        .args(["config", "init"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(contains("already exists"));

    env.cmd()
        .args(["config", "init", "--force"])
        .arg(&path)
        .assert()
        .success();

    env.cmd()
        .arg("--config")
        .arg(&path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(contains("# Loaded from"))
        .stdout(contains("tab_length = 4"));
}

#[test]
fn config_init_defaults_to_user_dir() {
    let env = TestEnv::new();
    env.cmd().args(["config", "init"]).assert().success();
    env.cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(contains("# Loaded from"));
}

#[test]
fn port_and_baud_override_config() {
    let env = TestEnv::new();
    env.cmd()
        .args(["--port", "COM9", "--baud", "19200", "config", "show"])
        .assert()
        .success()
        .stdout(contains("\"COM9\""))
        .stdout(contains("baud_rate = 19200"));
}

#[test]
fn unknown_config_key_is_rejected() {
    let env = TestEnv::new();
    fs::write(env.path("r31jp.toml"), "[serial]\nspeed = 9600\n").unwrap();
    env.cmd()
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(contains("Failed to parse"));
}

#[test]
fn zero_read_timeout_is_rejected() {
    let env = TestEnv::new();
    fs::write(env.path("r31jp.toml"), "[serial]\nread_timeout_ms = 0\n").unwrap();
    env.cmd()
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(contains("serial.read_timeout_ms"));

    let env = TestEnv::new();
    env.cmd()
        .args(["--baud", "0", "config", "show"])
        .assert()
        .failure()
        .stderr(contains("serial.baud_rate"));
}

#[test]
fn clean_prints_tidy_source() {
    let env = TestEnv::new();
    let src = env.write_source("lab.asm", "start:\tnop   \r\n\r\n\r\n\r\n\tsjmp start");
    env.cmd()
        .arg("clean")
        .arg(&src)
        .assert()
        .success()
        .stdout("start:    nop\n\n    sjmp start\n");
    // Printing leaves the file alone
    assert!(read(&src).contains('\t'));
}

#[test]
fn clean_write_rewrites_file() {
    let env = TestEnv::new();
    let src = env.write_source("lab.asm", "nop  \n\n\n\nnop");
    env.cmd()
        .args(["clean", "--write"])
        .arg(&src)
        .assert()
        .success()
        .stdout(contains("Cleaned"));
    assert_eq!(read(&src), "nop\n\nnop\n");

    env.cmd()
        .args(["clean", "--write"])
        .arg(&src)
        .assert()
        .success()
        .stdout(contains("already clean"));
}

#[test]
fn assemble_without_any_file_fails() {
    let env = TestEnv::new();
    env.cmd()
        .arg("assemble")
        .assert()
        .failure()
        .stderr(contains("No source file given"));
}

#[test]
fn missing_assembler_is_reported() {
    let env = TestEnv::new();
    fs::write(
        env.path("r31jp.toml"),
        "[assembler]\nprogram = \"/nonexistent/as31\"\n",
    )
    .unwrap();
    let src = env.write_source("lab.asm", "nop\n");
    env.cmd()
        .arg("assemble")
        .arg(&src)
        .assert()
        .failure()
        .stderr(contains("Could not run assembler"));
}

#[cfg(unix)]
#[test]
fn assemble_success_writes_hex() {
    let env = TestEnv::with_fake_assembler();
    let src = env.write_source("lab.asm", "start:\tnop\n\tsjmp start\n");
    let out = env.path("out.hex");

    env.cmd()
        .arg("assemble")
        .arg(&src)
        .arg("--output")
        .arg(&out)
        .arg("--listing")
        .assert()
        .success()
        .stdout(contains("Code assembled successfully."))
        .stdout(contains("    sjmp start"));
    assert_eq!(read(&out), ":03000000020100FA\n:00000001FF\n");
}

#[cfg(unix)]
#[test]
fn assemble_failure_highlights_lines() {
    let env = TestEnv::with_fake_assembler();
    let src = env.write_source("lab.asm", "start:\n  mov a, BAD\n  sjmp start\n  nop\n  nop\n");

    env.cmd()
        .arg("assemble")
        .arg(&src)
        .assert()
        .failure()
        .stdout(contains("    2 |   mov a, BAD"))
        .stdout(contains("    1 | start:"))
        .stdout(contains("line 2: Undefined symbol"))
        .stderr(contains("Assembly failed with 1 error(s)"));
}

#[cfg(unix)]
#[test]
fn assemble_remembers_last_file() {
    let env = TestEnv::with_fake_assembler();
    let src = env.write_source("lab.asm", "nop\n");

    env.cmd().arg("assemble").arg(&src).assert().success();
    env.cmd()
        .arg("assemble")
        .assert()
        .success()
        .stderr(contains("Using last file"));
}

#[cfg(all(unix, feature = "dummy"))]
#[test]
fn send_to_dummy_board() {
    let env = TestEnv::with_fake_assembler();
    let src = env.write_source("lab.asm", "start:\tnop\n");

    env.cmd()
        .args(["--port", "dummy", "send"])
        .arg(&src)
        .assert()
        .success()
        .stdout(contains("Code assembled successfully."))
        .stdout(contains("Data sent successfully."));
}

#[cfg(unix)]
#[test]
fn send_without_board_gives_up() {
    let env = TestEnv::with_fake_assembler();
    let src = env.write_source("lab.asm", "nop\n");

    env.cmd()
        .args(["--port", "/nonexistent/ttyR31JP", "send"])
        .arg(&src)
        .assert()
        .failure()
        .stderr(contains("No board found"));
}
