//! Queued serial I/O
//!
//! A single background thread owns the port. Callers talk to it through a
//! FIFO request queue and observe it through an event channel:
//!
//! ```text
//!  SerialLink::write ──┐                         ┌──> LinkEvent::Received
//!  SerialLink::download┼──> requests ──> worker ─┼──> LinkEvent::Connected
//!  SerialLink::close ──┘       (FIFO)     │      └──> ...
//!                                         └── Transport
//! ```
//!
//! While no board is attached the worker rescans the configured ports every
//! reconnect interval. A failed read or write drops the port and scanning
//! resumes.
//!
//! The worker remembers whether the board's output last ended at the monitor
//! prompt, so a download can skip the RESET step when MON is already waiting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::discovery::{BoxedTransport, Connector, PortScanner, PortSettings};
use crate::error::{Result, SerialError};
use crate::monitor::{self, DownloadObserver, DownloadReport, DownloadStage, DownloadTimeouts};

/// Something that happened on the link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Looking for a board
    Searching,
    /// A port was opened
    Connected {
        /// Port name
        port: String,
    },
    /// The port was lost
    Disconnected {
        /// What went wrong
        reason: String,
    },
    /// Bytes from the board
    Received(Vec<u8>),
    /// Bytes written to the board
    Sent(Vec<u8>),
    /// Download progress
    Download(DownloadStage),
}

/// Worker configuration
#[derive(Debug, Clone)]
pub struct LinkSettings {
    /// Port names tried in order
    pub ports: Vec<String>,
    /// Also try ports enumerated by the system
    pub scan_system_ports: bool,
    /// Port parameters; the read timeout is also the idle read interval
    pub port: PortSettings,
    /// Pause between scans while disconnected
    pub reconnect_interval: Duration,
    /// Download exchange timeouts
    pub download: DownloadTimeouts,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            ports: Vec::new(),
            scan_system_ports: false,
            port: PortSettings::default(),
            reconnect_interval: Duration::from_secs(1),
            download: DownloadTimeouts::default(),
        }
    }
}

enum Request {
    Write(Vec<u8>),
    Download {
        image: Vec<u8>,
        records: usize,
        reply: Sender<Result<DownloadReport>>,
    },
    Close,
}

/// Handle to the serial worker thread
///
/// Dropping the handle stops the worker and closes the port.
pub struct SerialLink {
    requests: Sender<Request>,
    events: Option<Receiver<LinkEvent>>,
    connected: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl SerialLink {
    /// Start the worker; it begins searching immediately
    pub fn spawn<C: Connector + 'static>(connector: C, settings: LinkSettings) -> Result<Self> {
        let (request_tx, request_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let connected = Arc::new(AtomicBool::new(false));

        let scanner = PortScanner::new(connector, settings.ports.clone(), settings.port)
            .with_system_ports(settings.scan_system_ports);
        let worker = Worker {
            scanner,
            settings,
            requests: request_rx,
            events: event_tx,
            connected: connected.clone(),
            port: None,
            last_byte: None,
        };
        let handle = thread::Builder::new()
            .name("r31jp-serial".to_string())
            .spawn(move || worker.run())?;

        Ok(Self {
            requests: request_tx,
            events: Some(event_rx),
            connected,
            worker: Some(handle),
        })
    }

    /// Take the event receiver; returns `None` after the first call
    pub fn take_events(&mut self) -> Option<Receiver<LinkEvent>> {
        self.events.take()
    }

    /// Whether a board is currently connected
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Block until connected or `timeout` expires
    pub fn wait_connected(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_connected() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
        true
    }

    /// Queue bytes for the board
    ///
    /// Queued writes are sent in submission order, interleaved with idle
    /// reads.
    pub fn write(&self, data: impl Into<Vec<u8>>) -> Result<()> {
        if !self.is_connected() {
            return Err(SerialError::NotConnected);
        }
        self.requests
            .send(Request::Write(data.into()))
            .map_err(|_| SerialError::WorkerStopped)
    }

    /// Download a HEX image and wait for the result
    pub fn download(&self, image: impl Into<Vec<u8>>, records: usize) -> Result<DownloadReport> {
        if !self.is_connected() {
            return Err(SerialError::NotConnected);
        }
        let (reply, result) = mpsc::channel();
        self.requests
            .send(Request::Download {
                image: image.into(),
                records,
                reply,
            })
            .map_err(|_| SerialError::WorkerStopped)?;
        result.recv().map_err(|_| SerialError::WorkerStopped)?
    }

    /// Stop the worker and close the port
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(handle) = self.worker.take() {
            let _ = self.requests.send(Request::Close);
            if handle.join().is_err() {
                log::error!("Serial worker panicked");
            }
        }
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.shutdown();
    }
}

enum Flow {
    Continue,
    Stop,
}

struct Worker<C> {
    scanner: PortScanner<C>,
    settings: LinkSettings,
    requests: Receiver<Request>,
    events: Sender<LinkEvent>,
    connected: Arc<AtomicBool>,
    port: Option<BoxedTransport>,
    /// Last byte the board sent on the current connection
    last_byte: Option<u8>,
}

impl<C: Connector> Worker<C> {
    fn run(mut self) {
        log::debug!("Serial worker started");
        let mut announced = false;
        loop {
            let flow = if self.port.is_some() {
                announced = false;
                self.step_connected()
            } else {
                if !announced {
                    self.emit(LinkEvent::Searching);
                    log::info!("Searching for serial device...");
                    announced = true;
                }
                self.step_searching()
            };
            if let Flow::Stop = flow {
                break;
            }
        }
        self.port = None;
        self.connected.store(false, Ordering::Release);
        log::debug!("Serial worker stopped");
    }

    fn emit(&self, event: LinkEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }

    fn step_searching(&mut self) -> Flow {
        if let Some((name, transport)) = self.scanner.scan() {
            log::info!("Device connected on {}", name);
            self.port = Some(transport);
            self.last_byte = None;
            self.connected.store(true, Ordering::Release);
            self.emit(LinkEvent::Connected { port: name });
            return Flow::Continue;
        }

        match self.requests.recv_timeout(self.settings.reconnect_interval) {
            Ok(request) => self.handle(request),
            Err(RecvTimeoutError::Timeout) => Flow::Continue,
            Err(RecvTimeoutError::Disconnected) => Flow::Stop,
        }
    }

    fn step_connected(&mut self) -> Flow {
        match self.requests.try_recv() {
            Ok(request) => self.handle(request),
            Err(TryRecvError::Empty) => {
                self.poll_read();
                Flow::Continue
            }
            Err(TryRecvError::Disconnected) => Flow::Stop,
        }
    }

    fn handle(&mut self, request: Request) -> Flow {
        match request {
            Request::Close => return Flow::Stop,
            Request::Write(data) => {
                let result = match self.port.as_mut() {
                    Some(port) => port.write(&data).and_then(|()| port.flush()),
                    None => Err(SerialError::NotConnected),
                };
                match result {
                    Ok(()) => self.emit(LinkEvent::Sent(data)),
                    Err(SerialError::NotConnected) => {
                        log::warn!("Dropping {} queued byte(s): no open connection", data.len());
                    }
                    Err(e) => self.lost(&e),
                }
            }
            Request::Download {
                image,
                records,
                reply,
            } => {
                let result = self.download(&image, records);
                if let Err(e) = &result {
                    if e.is_disconnect() {
                        self.lost(e);
                    }
                }
                let _ = reply.send(result);
            }
        }
        Flow::Continue
    }

    fn download(&mut self, image: &[u8], records: usize) -> Result<DownloadReport> {
        let timeouts = self.settings.download;
        let port = self.port.as_mut().ok_or(SerialError::NotConnected)?;
        let at_prompt = self.last_byte == Some(monitor::PROMPT);
        log::debug!(
            "Downloading {} bytes, board {}at the prompt",
            image.len(),
            if at_prompt { "" } else { "not " }
        );
        let mut observer = EventObserver {
            events: &self.events,
            last_byte: &mut self.last_byte,
        };
        monitor::download(port, image, records, &timeouts, at_prompt, &mut observer)
    }

    fn poll_read(&mut self) {
        let Some(port) = self.port.as_mut() else {
            return;
        };
        let mut buf = [0u8; 256];
        match port.read_available(&mut buf, self.settings.port.read_timeout) {
            Ok(0) => {}
            Ok(n) => {
                self.last_byte = Some(buf[n - 1]);
                self.emit(LinkEvent::Received(buf[..n].to_vec()));
            }
            Err(e) => self.lost(&e),
        }
    }

    fn lost(&mut self, error: &SerialError) {
        log::error!("Connection appears to have been lost: {}", error);
        self.port = None;
        self.connected.store(false, Ordering::Release);
        self.emit(LinkEvent::Disconnected {
            reason: error.to_string(),
        });
    }
}

/// Forwards download progress to the event channel
struct EventObserver<'a> {
    events: &'a Sender<LinkEvent>,
    last_byte: &'a mut Option<u8>,
}

impl DownloadObserver for EventObserver<'_> {
    fn stage(&mut self, stage: DownloadStage) {
        let _ = self.events.send(LinkEvent::Download(stage));
    }

    fn received(&mut self, data: &[u8]) {
        if let Some(&last) = data.last() {
            *self.last_byte = Some(last);
        }
        let _ = self.events.send(LinkEvent::Received(data.to_vec()));
    }
}
