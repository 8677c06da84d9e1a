//! Serial worker against the emulated board

use std::sync::mpsc::Receiver;
use std::thread;
use std::time::{Duration, Instant};

use r31jp_core::hex::HexImage;
use r31jp_dummy::{DummyBoard, DummyConnector, DUMMY_PORT};
use r31jp_serial::{
    DownloadStage, DownloadTimeouts, LinkEvent, LinkSettings, PortSettings, SerialError, SerialLink,
};

const IMAGE: &[u8] = b":03000000020100FA\n:020100000000FD\n:00000001FF\n";

fn settings(ports: &[&str]) -> LinkSettings {
    LinkSettings {
        ports: ports.iter().map(|p| p.to_string()).collect(),
        scan_system_ports: false,
        port: PortSettings {
            baud_rate: 9600,
            read_timeout: Duration::from_millis(10),
        },
        reconnect_interval: Duration::from_millis(20),
        download: DownloadTimeouts {
            prompt: Duration::from_secs(2),
            ack: Duration::from_secs(2),
        },
    }
}

/// Collect events until one matches or the timeout expires
fn wait_for(
    events: &Receiver<LinkEvent>,
    timeout: Duration,
    mut pred: impl FnMut(&LinkEvent) -> bool,
) -> Vec<LinkEvent> {
    let deadline = Instant::now() + timeout;
    let mut seen = Vec::new();
    while let Some(left) = deadline.checked_duration_since(Instant::now()) {
        match events.recv_timeout(left) {
            Ok(event) => {
                let done = pred(&event);
                seen.push(event);
                if done {
                    return seen;
                }
            }
            Err(_) => break,
        }
    }
    panic!("event not seen within {:?}; got {:?}", timeout, seen);
}

#[test]
fn test_download_through_link() {
    let board = DummyBoard::new_default();
    let mut link = SerialLink::spawn(DummyConnector::new(board.clone()), settings(&[DUMMY_PORT]))
        .unwrap();
    let events = link.take_events().unwrap();
    assert!(link.wait_connected(Duration::from_secs(2)));

    let image = HexImage::parse(IMAGE).unwrap();
    let report = link
        .download(image.as_bytes(), image.records().len())
        .unwrap();

    assert_eq!(report.bytes, IMAGE.len());
    assert_eq!(report.acked, 3);
    assert_eq!(board.downloads(), 1);
    assert_eq!(board.code(0, 3), vec![0x02, 0x01, 0x00]);

    let seen = wait_for(&events, Duration::from_secs(2), |e| {
        *e == LinkEvent::Download(DownloadStage::Complete)
    });
    assert!(seen.iter().any(|e| matches!(e, LinkEvent::Connected { port } if port == DUMMY_PORT)));
    assert!(seen.contains(&LinkEvent::Download(DownloadStage::Requested)));
    assert!(seen.contains(&LinkEvent::Download(DownloadStage::Sending {
        bytes: IMAGE.len(),
        records: 3,
    })));

    // The board is back at the prompt, so a second download needs no RESET
    let again = link
        .download(image.as_bytes(), image.records().len())
        .unwrap();
    assert_eq!(again.acked, 3);
    assert_eq!(board.downloads(), 2);

    link.close();
}

#[test]
fn test_queued_writes_keep_order() {
    let board = DummyBoard::new_default();
    let link = SerialLink::spawn(DummyConnector::new(board.clone()), settings(&[DUMMY_PORT]))
        .unwrap();
    assert!(link.wait_connected(Duration::from_secs(2)));

    for chunk in ["ab", "c", "def", "g", "hi"] {
        link.write(chunk.as_bytes()).unwrap();
    }

    let deadline = Instant::now() + Duration::from_secs(2);
    while board.received().len() < 9 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(board.received(), b"abcdefghi");
}

#[test]
fn test_board_output_is_forwarded() {
    let board = DummyBoard::new_default();
    let mut link = SerialLink::spawn(DummyConnector::new(board.clone()), settings(&[DUMMY_PORT]))
        .unwrap();
    let events = link.take_events().unwrap();
    assert!(link.wait_connected(Duration::from_secs(2)));

    board.emit(b"hello from the 8051");
    let mut text = Vec::new();
    wait_for(&events, Duration::from_secs(2), |e| {
        if let LinkEvent::Received(data) = e {
            text.extend_from_slice(data);
        }
        text.ends_with(b"8051")
    });
    assert!(text.starts_with(b"\r\nR31JP MON"));
}

#[test]
fn test_reconnects_after_unplug() {
    let board = DummyBoard::new_default();
    let mut link = SerialLink::spawn(DummyConnector::new(board.clone()), settings(&[DUMMY_PORT]))
        .unwrap();
    let events = link.take_events().unwrap();
    wait_for(&events, Duration::from_secs(2), |e| {
        matches!(e, LinkEvent::Connected { .. })
    });

    board.unplug();
    wait_for(&events, Duration::from_secs(2), |e| {
        matches!(e, LinkEvent::Disconnected { .. })
    });
    wait_for(&events, Duration::from_secs(2), |e| *e == LinkEvent::Searching);
    assert!(!link.is_connected());
    assert!(matches!(link.write(b"x".to_vec()), Err(SerialError::NotConnected)));

    board.replug();
    wait_for(&events, Duration::from_secs(2), |e| {
        matches!(e, LinkEvent::Connected { .. })
    });
    assert!(link.is_connected());
}

#[test]
fn test_unplug_during_download() {
    let board = DummyBoard::new(r31jp_dummy::DummyConfig {
        echo: true,
        prompt_on_open: false,
    });
    let mut link = SerialLink::spawn(DummyConnector::new(board.clone()), settings(&[DUMMY_PORT]))
        .unwrap();
    let events = link.take_events().unwrap();
    assert!(link.wait_connected(Duration::from_secs(2)));

    let cable = {
        let board = board.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            board.unplug();
        })
    };
    let err = link.download(IMAGE, 3).unwrap_err();
    cable.join().unwrap();

    assert!(matches!(err, SerialError::ConnectionLost(_)));
    assert_eq!(err.to_string(), "Connection lost: dummy board unplugged");
    wait_for(&events, Duration::from_secs(2), |e| {
        matches!(e, LinkEvent::Disconnected { .. })
    });
    assert!(!link.is_connected());

    board.replug();
    wait_for(&events, Duration::from_secs(2), |e| {
        matches!(e, LinkEvent::Connected { .. })
    });
    assert!(link.is_connected());
}

#[test]
fn test_requests_without_board_are_rejected() {
    let board = DummyBoard::new_default();
    let connector = DummyConnector::with_names(board, vec!["COM7".to_string()]);
    let link = SerialLink::spawn(connector, settings(&["/dev/ttyUSB0", "COM1"])).unwrap();

    assert!(!link.wait_connected(Duration::from_millis(100)));
    assert!(matches!(link.write(b"x".to_vec()), Err(SerialError::NotConnected)));
    assert!(matches!(link.download(IMAGE, 3), Err(SerialError::NotConnected)));
}

#[test]
fn test_download_times_out_without_prompt() {
    let board = DummyBoard::new(r31jp_dummy::DummyConfig {
        echo: true,
        prompt_on_open: false,
    });
    let mut link_settings = settings(&[DUMMY_PORT]);
    link_settings.download.prompt = Duration::from_millis(100);
    let link = SerialLink::spawn(DummyConnector::new(board.clone()), link_settings).unwrap();
    assert!(link.wait_connected(Duration::from_secs(2)));

    let err = link.download(IMAGE, 3).unwrap_err();
    assert!(matches!(err, SerialError::Timeout(_)));
    // A timeout leaves the connection usable
    assert!(link.is_connected());

    board.press_reset();
    assert_eq!(link.download(IMAGE, 3).unwrap().acked, 3);
}
