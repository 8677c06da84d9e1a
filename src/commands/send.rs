//! Send command implementation
//!
//! Assemble, validate the HEX output, then download it through the serial
//! worker while a progress bar follows the monitor's acknowledgements.

use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use r31jp_core::assembler::Assembler;
use r31jp_core::config::Config;
use r31jp_core::hex::HexImage;
use r31jp_serial::{DownloadStage, LinkEvent, SerialLink};

use super::assemble::{assemble_checked, describe_image};
use super::{resolve_source, term, CommandError, CommandResult};
use crate::ports::{link_settings, AppConnector};

/// Run the send command
pub fn run_send(config: &Config, file: Option<&Path>, stay_in_terminal: bool) -> CommandResult {
    let source_path = resolve_source(file)?;
    let assembler = Assembler::new(&config.assembler, config.source.tab_length)?;
    let artifacts = assemble_checked(&assembler, &source_path, config.source.tab_length)?;
    let image = HexImage::parse(&artifacts.hex)?;
    describe_image(&image);

    let mut link = SerialLink::spawn(AppConnector::default(), link_settings(config))?;
    let events = link.take_events().ok_or("serial events already taken")?;

    let connect_timeout = config.serial.connect_timeout();
    if !link.wait_connected(connect_timeout) {
        return Err(CommandError::NoBoard(connect_timeout).into());
    }

    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} records ({eta})")?
        .progress_chars("#>-");
    let done = Arc::new(AtomicBool::new(false));
    let progress = {
        let done = done.clone();
        thread::spawn(move || follow_download(events, style, &done, &mut std::io::stdout()))
    };

    // The EOF record is acknowledged too
    let result = link.download(image.as_bytes(), image.records().len());
    done.store(true, Ordering::Release);
    let events = progress
        .join()
        .map_err(|_| "download progress display panicked")?;

    let report = result?;
    println!("{}", "Data sent successfully.".blue());
    log::info!(
        "{} bytes, {} records acknowledged in {:.1?}",
        report.bytes,
        report.acked,
        report.elapsed
    );

    if stay_in_terminal {
        term::run_terminal(&link, &events, config.terminal.echo)?;
    }
    link.close();
    Ok(())
}

/// Show download progress until `done` is set and the queue is drained
///
/// Board output is printed as it arrives, above the bar once records are
/// being sent. The receiver is handed back so the terminal can carry on
/// with it.
fn follow_download<W: Write>(
    events: Receiver<LinkEvent>,
    style: ProgressStyle,
    done: &AtomicBool,
    out: &mut W,
) -> Receiver<LinkEvent> {
    let mut view = DownloadView {
        style,
        bar: None,
        out,
    };
    while !done.load(Ordering::Acquire) {
        match events.recv_timeout(Duration::from_millis(50)) {
            Ok(event) => view.show(event),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    // Whatever the worker queued before the download returned
    for event in events.try_iter() {
        view.show(event);
    }
    view.finish();
    events
}

struct DownloadView<'a, W: Write> {
    style: ProgressStyle,
    bar: Option<ProgressBar>,
    out: &'a mut W,
}

impl<W: Write> DownloadView<'_, W> {
    fn show(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Download(DownloadStage::WaitingForPrompt) => {
                let _ = writeln!(
                    self.out,
                    "{}",
                    "Hit RESET in MON mode to download file...".blue()
                );
            }
            LinkEvent::Download(DownloadStage::Sending { records, .. }) => {
                let pb = ProgressBar::new(records as u64);
                pb.set_style(self.style.clone());
                self.bar = Some(pb);
            }
            LinkEvent::Download(DownloadStage::Progress { acked }) => {
                if let Some(pb) = &self.bar {
                    pb.set_position(acked as u64);
                }
            }
            LinkEvent::Download(DownloadStage::Complete) => {
                if let Some(pb) = &self.bar {
                    pb.finish_with_message("Download complete");
                }
            }
            LinkEvent::Received(data) => {
                let out = &mut self.out;
                let mut print = || {
                    let _ = out.write_all(&data);
                    let _ = out.flush();
                };
                match &self.bar {
                    Some(pb) if !pb.is_finished() => pb.suspend(print),
                    _ => print(),
                }
            }
            event => log::trace!("{:?}", event),
        }
    }

    fn finish(self) {
        if let Some(pb) = self.bar {
            if !pb.is_finished() {
                pb.abandon();
            }
        }
        let _ = writeln!(self.out);
    }
}
