//! R-31JP monitor (MON) download protocol
//!
//! The exchange, as driven from the host:
//!
//! ```text
//! host                         board
//!      <-------------------  '*'      prompt, after RESET in MON mode
//!  "DD" ------------------>
//!      <-------------------  '>'      ready for HEX records
//!  HEX ------------------->
//!      <-------------------  '.'      one per record received
//!      <-------------------  other    download finished
//! ```
//!
//! Every wait is bounded. The prompt timeout is long because the user has to
//! press RESET on the board. When the board is already known to sit at the
//! prompt, `DD` is sent straight away; if that goes unanswered the exchange
//! falls back to waiting for RESET.

use std::time::{Duration, Instant};

use crate::error::{Result, SerialError};
use crate::transport::Transport;

/// Monitor prompt
pub const PROMPT: u8 = b'*';
/// Command that starts a download
pub const DOWNLOAD_COMMAND: &[u8] = b"DD";
/// Monitor is ready for HEX records
pub const READY: u8 = b'>';
/// Acknowledgement of one HEX record
pub const RECORD_ACK: u8 = b'.';

/// Upper bound for a single read so a wait never overshoots its deadline
const READ_SLICE: Duration = Duration::from_millis(100);

/// Timeouts of the download exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadTimeouts {
    /// Wait for the monitor prompt
    pub prompt: Duration,
    /// Wait for `>` and between record acknowledgements
    pub ack: Duration,
}

impl Default for DownloadTimeouts {
    fn default() -> Self {
        Self {
            prompt: Duration::from_secs(30),
            ack: Duration::from_secs(5),
        }
    }
}

/// Progress of a download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStage {
    /// Waiting for the user to press RESET
    WaitingForPrompt,
    /// `DD` sent, waiting for the monitor
    Requested,
    /// HEX text is being sent
    Sending {
        /// Bytes in the image
        bytes: usize,
        /// Records in the image, end-of-file record included
        records: usize,
    },
    /// Records acknowledged so far
    Progress {
        /// Number of `.` received
        acked: usize,
    },
    /// The monitor signalled the end of the download
    Complete,
}

/// Summary of a finished download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadReport {
    /// Bytes sent
    pub bytes: usize,
    /// Records acknowledged by the monitor
    pub acked: usize,
    /// Time from the start of the exchange to the end of the transfer
    pub elapsed: Duration,
}

/// Receives progress and board output during a download
pub trait DownloadObserver {
    /// Called when the download moves on
    fn stage(&mut self, stage: DownloadStage);

    /// Called with every chunk read from the board
    fn received(&mut self, _data: &[u8]) {}
}

impl DownloadObserver for () {
    fn stage(&mut self, _stage: DownloadStage) {}
}

/// Download a HEX image to the monitor
///
/// `records` is the number of records in `image`, end-of-file record
/// included, used for progress reporting only. `at_prompt` tells whether the last thing the board
/// printed was the monitor prompt.
pub fn download<T: Transport + ?Sized>(
    transport: &mut T,
    image: &[u8],
    records: usize,
    timeouts: &DownloadTimeouts,
    at_prompt: bool,
    observer: &mut dyn DownloadObserver,
) -> Result<DownloadReport> {
    let started = Instant::now();
    let requested = if at_prompt {
        match request(transport, timeouts, observer) {
            Ok(()) => true,
            Err(SerialError::Timeout(_)) => {
                log::debug!("Monitor did not answer, waiting for RESET");
                false
            }
            Err(e) => return Err(e),
        }
    } else {
        false
    };
    if !requested {
        observer.stage(DownloadStage::WaitingForPrompt);
        wait_for(transport, PROMPT, timeouts.prompt, observer, "the monitor prompt")?;
        request(transport, timeouts, observer)?;
    }

    observer.stage(DownloadStage::Sending {
        bytes: image.len(),
        records,
    });
    transport.write(image)?;
    transport.flush()?;

    let acked = wait_for_acks(transport, timeouts.ack, observer)?;
    observer.stage(DownloadStage::Complete);

    let report = DownloadReport {
        bytes: image.len(),
        acked,
        elapsed: started.elapsed(),
    };
    log::debug!(
        "Download finished: {} bytes, {} records acknowledged in {:?}",
        report.bytes,
        report.acked,
        report.elapsed
    );
    Ok(report)
}

/// Send `DD` and wait for the monitor to accept records
fn request<T: Transport + ?Sized>(
    transport: &mut T,
    timeouts: &DownloadTimeouts,
    observer: &mut dyn DownloadObserver,
) -> Result<()> {
    transport.write(DOWNLOAD_COMMAND)?;
    transport.flush()?;
    observer.stage(DownloadStage::Requested);
    wait_for(transport, READY, timeouts.ack, observer, "the download prompt")
}

/// Read until `target` shows up
fn wait_for<T: Transport + ?Sized>(
    transport: &mut T,
    target: u8,
    timeout: Duration,
    observer: &mut dyn DownloadObserver,
    what: &'static str,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    let mut buf = [0u8; 64];
    loop {
        let now = Instant::now();
        if now >= deadline {
            return Err(SerialError::Timeout(what));
        }
        let n = transport.read_available(&mut buf, (deadline - now).min(READ_SLICE))?;
        if n > 0 {
            observer.received(&buf[..n]);
            if buf[..n].contains(&target) {
                return Ok(());
            }
        }
    }
}

/// Count record acknowledgements until the monitor sends anything else
///
/// Line breaks between the dots are ignored.
fn wait_for_acks<T: Transport + ?Sized>(
    transport: &mut T,
    timeout: Duration,
    observer: &mut dyn DownloadObserver,
) -> Result<usize> {
    let mut acked = 0;
    let mut deadline = Instant::now() + timeout;
    let mut buf = [0u8; 64];
    loop {
        let now = Instant::now();
        if now >= deadline {
            return Err(SerialError::Timeout("record acknowledgements"));
        }
        let n = transport.read_available(&mut buf, (deadline - now).min(READ_SLICE))?;
        if n == 0 {
            continue;
        }
        observer.received(&buf[..n]);
        for &byte in &buf[..n] {
            match byte {
                RECORD_ACK => {
                    acked += 1;
                    deadline = Instant::now() + timeout;
                    observer.stage(DownloadStage::Progress { acked });
                }
                b'\r' | b'\n' => {}
                _ => return Ok(acked),
            }
        }
    }
}
