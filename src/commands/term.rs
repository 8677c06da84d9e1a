//! Serial terminal
//!
//! Keystrokes go to the board one write request per key; whatever the board
//! prints is copied to stdout unchanged. The terminal runs in raw mode so
//! the monitor sees every key as it is typed.

use std::io::{self, Write};
use std::sync::mpsc::Receiver;
use std::time::Duration;

use colored::Colorize;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use r31jp_core::config::Config;
use r31jp_serial::{LinkEvent, SerialError, SerialLink};

use super::CommandResult;
use crate::ports::{link_settings, AppConnector};

/// How long to wait for a key before checking the board again
const KEY_POLL: Duration = Duration::from_millis(20);

/// Run the term command
pub fn run_term(config: &Config) -> CommandResult {
    let mut link = SerialLink::spawn(AppConnector::default(), link_settings(config))?;
    let events = link.take_events().ok_or("serial events already taken")?;
    run_terminal(&link, &events, config.terminal.echo)?;
    link.close();
    Ok(())
}

/// Raw mode for as long as the guard lives
struct RawMode;

impl RawMode {
    fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Interactive session on an already running link; returns on Ctrl-]
pub fn run_terminal(link: &SerialLink, events: &Receiver<LinkEvent>, echo: bool) -> CommandResult {
    println!("{}", "Terminal ready. Press Ctrl-] to exit.".blue());
    let _raw = RawMode::enter()?;
    let mut stdout = io::stdout();

    loop {
        while let Ok(event) = events.try_recv() {
            show_event(&mut stdout, event)?;
        }

        if !event::poll(KEY_POLL)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind == KeyEventKind::Release {
            continue;
        }
        if is_exit_key(&key) {
            break;
        }
        let Some(bytes) = key_bytes(&key) else {
            continue;
        };

        match link.write(bytes.clone()) {
            Ok(()) => {
                if echo {
                    stdout.write_all(&bytes)?;
                    stdout.flush()?;
                }
            }
            Err(SerialError::NotConnected) => status(&mut stdout, "No open connection.".red())?,
            Err(e) => return Err(e.into()),
        }
    }

    write!(stdout, "\r\n")?;
    stdout.flush()?;
    Ok(())
}

/// Print a status line; raw mode needs an explicit carriage return
fn status(out: &mut impl Write, message: colored::ColoredString) -> io::Result<()> {
    write!(out, "\r\n{}\r\n", message)?;
    out.flush()
}

fn show_event(out: &mut impl Write, event: LinkEvent) -> io::Result<()> {
    match event {
        LinkEvent::Received(data) => {
            out.write_all(&data)?;
            out.flush()
        }
        LinkEvent::Searching => status(out, "Searching for serial device...".blue()),
        LinkEvent::Connected { port } => {
            status(out, format!("Device connected on {}.", port).blue())
        }
        LinkEvent::Disconnected { .. } => {
            status(out, "Connection appears to have been lost.".red())
        }
        LinkEvent::Sent(_) | LinkEvent::Download(_) => Ok(()),
    }
}

/// Ctrl-] leaves the terminal; some terminals report it as Ctrl-5
fn is_exit_key(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char(']') | KeyCode::Char('5'))
}

/// Bytes sent to the board for a key press
fn key_bytes(key: &KeyEvent) -> Option<Vec<u8>> {
    let bytes = match key.code {
        KeyCode::Char(c) if key.modifiers.contains(KeyModifiers::CONTROL) => {
            if !c.is_ascii_alphabetic() {
                return None;
            }
            vec![c.to_ascii_uppercase() as u8 - b'@']
        }
        KeyCode::Char(c) => c.to_string().into_bytes(),
        KeyCode::Enter => vec![b'\r'],
        KeyCode::Backspace => vec![0x08],
        KeyCode::Tab => vec![b'\t'],
        KeyCode::Esc => vec![0x1B],
        _ => return None,
    };
    Some(bytes)
}
