//! r31jp-dummy - Emulated R-31JP monitor for testing
//!
//! This crate provides a board that behaves like the MON monitor ROM on the
//! serial side: it prints a prompt, echoes typed characters, accepts a `DD`
//! download of Intel HEX records into a 64 KiB code memory and acknowledges
//! each record with a `.`. It can also be "unplugged" to exercise the
//! reconnect logic.
//!
//! [`DummyBoard`] is a cheap handle; clones share the same board, so a test
//! can keep one while the serial worker owns another.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use r31jp_core::hex::{Record, RecordKind, CODE_SPACE};
use r31jp_serial::{BoxedTransport, Connector, PortSettings, Result, SerialError, Transport};

/// Banner printed when the board comes out of reset
pub const BANNER: &[u8] = b"\r\nR31JP MON\r\n*";

/// Port name the dummy connector answers to by default
pub const DUMMY_PORT: &str = "dummy";

/// Configuration for the dummy board
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Echo characters typed at the monitor prompt
    pub echo: bool,
    /// Print the banner as soon as the port is opened
    pub prompt_on_open: bool,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            echo: true,
            prompt_on_open: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// At the `*` prompt
    Monitor,
    /// Saw one `D`
    Command,
    /// Receiving HEX records
    Download,
}

#[derive(Debug)]
struct BoardState {
    config: DummyConfig,
    mode: Mode,
    outgoing: VecDeque<u8>,
    line: Vec<u8>,
    code: Vec<u8>,
    received: Vec<u8>,
    records_loaded: usize,
    downloads: usize,
    plugged: bool,
}

impl BoardState {
    fn reset(&mut self) {
        self.mode = Mode::Monitor;
        self.line.clear();
        self.outgoing.extend(BANNER.iter().copied());
    }

    fn prompt(&mut self) {
        self.outgoing.extend(b"\r\n*".iter().copied());
    }

    fn input(&mut self, byte: u8) {
        match self.mode {
            Mode::Monitor | Mode::Command => {
                if self.config.echo {
                    self.outgoing.push_back(byte);
                }
                self.mode = match (self.mode, byte.to_ascii_uppercase()) {
                    (Mode::Monitor, b'D') => Mode::Command,
                    (Mode::Command, b'D') => {
                        self.line.clear();
                        self.outgoing.extend(b"\r\n>".iter().copied());
                        Mode::Download
                    }
                    (_, b'\r') | (_, b'\n') => {
                        self.prompt();
                        Mode::Monitor
                    }
                    _ => Mode::Monitor,
                };
            }
            Mode::Download => {
                if byte == b'\n' || byte == b'\r' {
                    let line = std::mem::take(&mut self.line);
                    self.load_line(&line);
                } else {
                    self.line.push(byte);
                }
            }
        }
    }

    fn load_line(&mut self, line: &[u8]) {
        let Ok(text) = std::str::from_utf8(line) else {
            self.abort_download();
            return;
        };
        if text.trim().is_empty() {
            return;
        }
        match Record::parse(text) {
            Ok(record) => {
                self.outgoing.push_back(b'.');
                match record.kind {
                    RecordKind::Data => {
                        let start = record.address as usize;
                        self.code[start..start + record.data.len()].copy_from_slice(&record.data);
                        self.records_loaded += 1;
                    }
                    RecordKind::EndOfFile => {
                        self.downloads += 1;
                        self.mode = Mode::Monitor;
                        self.prompt();
                    }
                }
            }
            Err(e) => {
                log::debug!("dummy: rejecting record {:?}: {}", text, e);
                self.abort_download();
            }
        }
    }

    fn abort_download(&mut self) {
        self.outgoing.extend(b"\r\nERROR".iter().copied());
        self.mode = Mode::Monitor;
        self.prompt();
    }
}

/// Emulated board
#[derive(Debug, Clone)]
pub struct DummyBoard {
    state: Arc<Mutex<BoardState>>,
}

impl DummyBoard {
    /// Create a board with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let mut state = BoardState {
            config,
            mode: Mode::Monitor,
            outgoing: VecDeque::new(),
            line: Vec::new(),
            code: vec![0xFF; CODE_SPACE as usize],
            received: Vec::new(),
            records_loaded: 0,
            downloads: 0,
            plugged: true,
        };
        if state.config.prompt_on_open {
            state.reset();
        }
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Create a board with default configuration
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        // A panicking test thread must not wedge the others
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Simulate pressing RESET in MON mode
    pub fn press_reset(&self) {
        self.lock().reset();
    }

    /// Make the board print something, as a running program would
    pub fn emit(&self, data: &[u8]) {
        self.lock().outgoing.extend(data.iter().copied());
    }

    /// Pull the cable: every transport operation fails until replugged
    pub fn unplug(&self) {
        self.lock().plugged = false;
    }

    /// Reconnect the cable
    pub fn replug(&self) {
        self.lock().plugged = true;
    }

    /// Whether the cable is connected
    pub fn is_plugged(&self) -> bool {
        self.lock().plugged
    }

    /// Every byte the host has written, in order
    pub fn received(&self) -> Vec<u8> {
        self.lock().received.clone()
    }

    /// Copy of a region of code memory
    pub fn code(&self, start: u16, len: usize) -> Vec<u8> {
        let state = self.lock();
        let start = start as usize;
        let end = (start + len).min(state.code.len());
        state.code[start..end].to_vec()
    }

    /// Number of completed downloads
    pub fn downloads(&self) -> usize {
        self.lock().downloads
    }

    /// Data records loaded over all downloads
    pub fn records_loaded(&self) -> usize {
        self.lock().records_loaded
    }
}

impl Transport for DummyBoard {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.lock();
        if !state.plugged {
            return Err(SerialError::ConnectionLost("dummy board unplugged".into()));
        }
        state.received.extend_from_slice(data);
        for &byte in data {
            state.input(byte);
        }
        Ok(())
    }

    fn read_available(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        {
            let mut state = self.lock();
            if !state.plugged {
                return Err(SerialError::ConnectionLost("dummy board unplugged".into()));
            }
            if !state.outgoing.is_empty() {
                let n = buf.len().min(state.outgoing.len());
                for (slot, byte) in buf.iter_mut().zip(state.outgoing.drain(..n)) {
                    *slot = byte;
                }
                return Ok(n);
            }
        }
        // Nothing to say; behave like a quiet line without stalling tests
        thread::sleep(timeout.min(Duration::from_millis(2)));
        Ok(0)
    }

    fn flush(&mut self) -> Result<()> {
        if self.is_plugged() {
            Ok(())
        } else {
            Err(SerialError::ConnectionLost("dummy board unplugged".into()))
        }
    }
}

/// Connector that hands out a shared [`DummyBoard`]
///
/// Opening fails while the board is unplugged, like a missing device node.
#[derive(Debug, Clone)]
pub struct DummyConnector {
    board: DummyBoard,
    names: Vec<String>,
}

impl DummyConnector {
    /// Connector answering to [`DUMMY_PORT`]
    pub fn new(board: DummyBoard) -> Self {
        Self::with_names(board, vec![DUMMY_PORT.to_string()])
    }

    /// Connector answering to the given port names
    pub fn with_names(board: DummyBoard, names: Vec<String>) -> Self {
        Self { board, names }
    }

    /// The board behind this connector
    pub fn board(&self) -> &DummyBoard {
        &self.board
    }
}

impl Connector for DummyConnector {
    fn open(&self, name: &str, settings: &PortSettings) -> Result<BoxedTransport> {
        if !self.names.iter().any(|n| n == name) {
            return Err(SerialError::ConnectionLost(format!("no dummy board on {}", name)));
        }
        if !self.board.is_plugged() {
            return Err(SerialError::ConnectionLost("dummy board unplugged".into()));
        }
        log::info!("Opened dummy board on {} ({} baud)", name, settings.baud_rate);
        Ok(Box::new(self.board.clone()))
    }
}
