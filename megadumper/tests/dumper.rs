use megadumper::mock::MockTransport;
use megadumper::{
    worker, Command, Dumper, DumperConfig, Error, Operation, Payload, Progress, ReturnCode, Wait,
};
use std::sync::mpsc::channel;
use std::time::{Duration, Instant};

fn fast_config() -> DumperConfig {
    DumperConfig {
        version_timeout: Duration::from_millis(50),
        header_timeout: Duration::from_millis(100),
        dump_wait: Wait::Idle(Duration::from_millis(100)),
        ..DumperConfig::default()
    }
}

/// Contents of the 0x80..0x100 header window: start 0, end 0x3FF (a 1 KiB cartridge).
fn header_window() -> Vec<u8> {
    let mut header = vec![0_u8; 0x100];
    header[0..4].copy_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    header[4..8].copy_from_slice(&[0x00, 0x00, 0x03, 0xFF]);
    header
}

/// Fake cartridge: answers header window requests with `header`, any other range with a
/// counting pattern of `(to - from) * 2` bytes.
fn cartridge(header: Vec<u8>) -> impl FnMut(Command) -> Option<Vec<u8>> + Send {
    move |command| match command {
        Command::Version => Some(b"GENDUMPER v1.2\r\n".to_vec()),
        Command::Header => Some(header.clone()),
        Command::Dump { from: 0x80, to: 0x100 } => Some(header.clone()),
        Command::Dump { from, to } => Some(
            (0..(to - from) * 2).map(|i| i as u8).collect(),
        ),
    }
}

#[test]
fn version_of_selected_port() {
    let mock = MockTransport::new().port("ttyUSB0", cartridge(header_window()));
    let mut dumper = Dumper::with_config(mock, fast_config());
    dumper.set_port("ttyUSB0");

    assert_eq!(dumper.get_version(), "GENDUMPER v1.2\r\n");
}

#[test]
fn version_swallows_failures() {
    let mock = MockTransport::new()
        .absent_port("COM1")
        .port("COM2", |_| None);
    let mut dumper = Dumper::with_config(mock, fast_config());

    assert_eq!(dumper.get_version(), "");
    dumper.set_port("COM1");
    assert_eq!(dumper.get_version(), "");
    dumper.set_port("COM2");
    assert_eq!(dumper.get_version(), "");
}

#[test]
fn header_is_returned_raw() {
    let mock = MockTransport::new()
        .port("ttyUSB0", cartridge(header_window()))
        .chunk_size(7);
    let mut dumper = Dumper::with_config(mock, fast_config());
    dumper.set_port("ttyUSB0");

    assert_eq!(dumper.get_header().unwrap(), header_window());
}

#[test]
fn header_timeout_is_an_error() {
    let mock = MockTransport::new().port("ttyUSB0", |_| None);
    let mut dumper = Dumper::with_config(mock, fast_config());
    dumper.set_port("ttyUSB0");

    match dumper.get_header() {
        Err(Error::Timeout(_)) => {}
        other => panic!("expected timeout, got {:?}", other),
    }
}

#[test]
fn unavailable_port_is_surfaced() {
    let mock = MockTransport::new().absent_port("COM3");
    let mut dumper = Dumper::with_config(mock, fast_config());
    dumper.set_port("COM3");

    match dumper.dump(0x1000, 0x2000) {
        Err(Error::PortUnavailable { port, .. }) => assert_eq!(port, "COM3"),
        other => panic!("expected unavailable port, got {:?}", other),
    }
}

#[test]
fn explicit_range_skips_header_phase() {
    let mock = MockTransport::new().port("ttyUSB0", cartridge(header_window()));
    let log = mock.log();
    let mut dumper = Dumper::with_config(mock, fast_config());
    dumper.set_port("ttyUSB0");

    let dump = dumper.dump(0x1000, 0x2000).unwrap();

    assert_eq!(dump.data.len(), 0x2000);
    assert_eq!(dump.header, None);
    assert_eq!((dump.from, dump.to), (0x1000, 0x2000));
    assert!(dump.started <= dump.finished);
    assert_eq!(
        log.lock().unwrap().commands,
        vec![(
            "ttyUSB0".to_string(),
            Command::Dump {
                from: 0x1000,
                to: 0x2000
            }
        )]
    );
}

#[test]
fn full_dump_reads_header_first() {
    let mock = MockTransport::new()
        .port("ttyUSB0", cartridge(header_window()))
        .chunk_size(100);
    let log = mock.log();
    let mut dumper = Dumper::with_config(mock, fast_config());
    dumper.set_port("ttyUSB0");

    let dump = dumper.dump(0, 0).unwrap();

    let commands: Vec<Command> = log
        .lock()
        .unwrap()
        .commands
        .iter()
        .map(|(_, c)| *c)
        .collect();
    assert_eq!(
        commands,
        vec![
            Command::Dump {
                from: 0x80,
                to: 0x100
            },
            Command::Dump {
                from: 0,
                to: 0x3FF >> 1
            },
        ]
    );
    assert_eq!(dump.header, Some(header_window()));
    assert_eq!(dump.data.len(), (0x3FF >> 1) * 2);
    assert_eq!(log.lock().unwrap().opened.len(), 2);
}

#[test]
fn full_dump_reports_progress_per_phase() {
    let mock = MockTransport::new()
        .port("ttyUSB0", cartridge(header_window()))
        .chunk_size(32);
    let mut dumper = Dumper::with_config(mock, fast_config());
    dumper.set_port("ttyUSB0");
    let (tx, rx) = channel();
    dumper.set_progress(Some(tx));

    dumper.dump(0, 0).unwrap();
    dumper.set_progress(None);

    let events: Vec<Progress> = rx.iter().collect();
    let checkpoint = events
        .iter()
        .position(|e| matches!(e, Progress::Header { .. }))
        .expect("header checkpoint");

    match &events[checkpoint] {
        Progress::Header { start, end, header } => {
            assert_eq!((*start, *end), (0, 0x1FF));
            assert_eq!(header, &header_window());
        }
        _ => unreachable!(),
    }

    for phase in [&events[..checkpoint], &events[checkpoint + 1..]].iter() {
        let percents: Vec<u8> = phase
            .iter()
            .map(|e| match e {
                Progress::Percent(p) => *p,
                other => panic!("unexpected {:?}", other),
            })
            .collect();

        assert_eq!(percents.first(), Some(&0));
        assert_eq!(percents.last(), Some(&100));
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    }
}

#[test]
fn full_dump_with_custom_layout() {
    let mock = MockTransport::new().port("ttyUSB0", cartridge(vec![0xEE; 0x100]));
    let log = mock.log();
    let mut dumper = Dumper::with_config(mock, fast_config())
        .with_layout(|_: &[u8]| -> megadumper::Result<(u32, u32)> { Ok((0x40, 0x100)) });
    dumper.set_port("ttyUSB0");

    let dump = dumper.dump(0, 0).unwrap();

    assert_eq!((dump.from, dump.to), (0x40, 0x80));
    assert_eq!(
        log.lock().unwrap().commands.last().map(|(_, c)| *c),
        Some(Command::Dump {
            from: 0x40,
            to: 0x80
        })
    );
}

#[test]
fn inverted_range_is_rejected_before_sending() {
    let mock = MockTransport::new().port("ttyUSB0", cartridge(header_window()));
    let log = mock.log();
    let mut dumper = Dumper::with_config(mock, fast_config());
    dumper.set_port("ttyUSB0");

    match dumper.dump(0x2000, 0x1000) {
        Err(Error::InvalidRange { from, to }) => assert_eq!((from, to), (0x2000, 0x1000)),
        other => panic!("expected invalid range, got {:?}", other),
    }
    assert!(log.lock().unwrap().commands.is_empty());
}

#[test]
fn silent_dump_is_a_timeout() {
    let mock = MockTransport::new().port("ttyUSB0", |command| match command {
        Command::Dump { .. } => None,
        _ => Some(b"GENDUMPER".to_vec()),
    });
    let mut dumper = Dumper::with_config(mock, fast_config());
    dumper.set_port("ttyUSB0");

    match dumper.dump(0x10, 0x20) {
        Err(Error::Timeout(_)) => {}
        other => panic!("expected timeout, got {:?}", other),
    }
}

#[test]
fn stalled_dump_is_not_a_success() {
    // announces 0x20 bytes, delivers 0x10
    let mock = MockTransport::new()
        .port("ttyUSB0", cartridge(header_window()))
        .stall_after(4 + 0x10);
    let mut dumper = Dumper::with_config(mock, fast_config());
    dumper.set_port("ttyUSB0");

    match dumper.dump(0x10, 0x20) {
        Err(Error::ProtocolViolation(_)) => {}
        other => panic!("expected protocol violation, got {:?}", other),
    }

    let full = dumper.run(Operation::Dump { from: 0, to: 0 });
    assert_eq!(full.code, ReturnCode::Error);
    assert_eq!(full.payload, Payload::None);
}

#[test]
fn dump_without_port() {
    let mut dumper = Dumper::new(MockTransport::new());

    match dumper.dump(1, 2) {
        Err(Error::NoPort) => {}
        other => panic!("expected missing port, got {:?}", other),
    }
}

#[test]
fn autodetect_stops_at_first_dumper() {
    let mock = MockTransport::new()
        .port("X", |_| Some(b"ARDUINO".to_vec()))
        .port("Y", cartridge(header_window()))
        .port("Z", cartridge(header_window()));
    let log = mock.log();
    let mut dumper = Dumper::with_config(mock, fast_config());

    assert_eq!(dumper.autodetect().unwrap(), "Y");
    assert_eq!(dumper.port(), Some("Y"));
    assert_eq!(
        log.lock().unwrap().opened,
        vec!["X".to_string(), "Y".to_string()]
    );
}

#[test]
fn autodetect_skips_dead_ports() {
    let mock = MockTransport::new()
        .absent_port("COM1")
        .port("COM2", |_| None)
        .port("COM3", cartridge(header_window()));
    let mut dumper = Dumper::with_config(mock, fast_config());

    assert_eq!(dumper.autodetect().unwrap(), "COM3");
}

#[test]
fn autodetect_not_found() {
    let mock = MockTransport::new()
        .absent_port("X")
        .port("Y", |_| Some(b"hello".to_vec()))
        .port("Z", |_| None);
    let mut dumper = Dumper::with_config(mock, fast_config());
    dumper.set_port("manual");

    match dumper.autodetect() {
        Err(Error::NotFound) => {}
        other => panic!("expected not found, got {:?}", other),
    }
    assert_eq!(dumper.port(), Some("manual"));
}

#[test]
fn autodetect_reports_no_progress() {
    let mock = MockTransport::new()
        .port("X", |_| Some(b"nope".to_vec()))
        .port("Y", cartridge(header_window()))
        .chunk_size(2);
    let mut dumper = Dumper::with_config(mock, fast_config());
    let (tx, rx) = channel();
    dumper.set_progress(Some(tx));

    dumper.autodetect().unwrap();
    dumper.set_progress(None);

    assert_eq!(rx.iter().count(), 0);
}

#[test]
fn run_folds_outcomes() {
    let mock = MockTransport::new().port("Y", cartridge(header_window()));
    let mut dumper = Dumper::with_config(mock, fast_config());

    let found = dumper.run(Operation::Autodetect);
    assert_eq!(found.code, ReturnCode::Ok);
    assert_eq!(found.payload, Payload::Port("Y".into()));
    assert!(found.started <= found.finished);

    let dump = dumper.run(Operation::Dump { from: 0, to: 0x10 });
    assert_eq!(dump.code, ReturnCode::Ok);
    match dump.payload {
        Payload::Dump(d) => assert_eq!(d.data.len(), 0x20),
        other => panic!("expected dump, got {:?}", other),
    }

    let mut lonely = Dumper::with_config(MockTransport::new().absent_port("Q"), fast_config());
    let missing = lonely.run(Operation::Autodetect);
    assert_eq!(missing.code, ReturnCode::NotFound);
    assert_eq!(missing.payload, Payload::None);

    let failed = lonely.run(Operation::Header);
    assert_eq!(failed.code, ReturnCode::Error);
    assert!(failed.error.is_some());
}

#[test]
fn worker_streams_progress_then_result() {
    let mock = MockTransport::new()
        .port("ttyUSB0", cartridge(header_window()))
        .chunk_size(16);
    let mut dumper = Dumper::with_config(mock, fast_config());
    dumper.set_port("ttyUSB0");

    let job = worker::spawn(dumper, Operation::Dump { from: 0, to: 0 }).unwrap();
    let events: Vec<Progress> = job.progress.iter().collect();
    let (dumper, result) = job.join().unwrap();

    assert_eq!(result.code, ReturnCode::Ok);
    assert!(events.iter().any(|e| matches!(e, Progress::Header { .. })));
    assert_eq!(events.last(), Some(&Progress::Percent(100)));
    assert_eq!(dumper.port(), Some("ttyUSB0"));
}

/// Version reply that keeps coming long after the version bound, 20 bytes every 10ms.
fn chatty(command: Command) -> Option<Vec<u8>> {
    match command {
        Command::Version => {
            let mut reply = b"GENDUMPER v1.2 ".to_vec();
            reply.resize(2000, b'.');
            Some(reply)
        }
        _ => None,
    }
}

#[test]
fn version_bound_is_total() {
    let mock = MockTransport::new()
        .port("ttyACM0", chatty)
        .chunk_size(20)
        .delay(Duration::from_millis(10));
    let mut dumper = Dumper::with_config(mock, fast_config());
    dumper.set_port("ttyACM0");

    let started = Instant::now();
    assert_eq!(dumper.get_version(), "");
    assert!(started.elapsed() < Duration::from_millis(500));
}

#[test]
fn autodetect_moves_past_chatty_port() {
    let mock = MockTransport::new()
        .port("ttyACM0", chatty)
        .port("ttyUSB0", cartridge(header_window()))
        .chunk_size(20)
        .delay(Duration::from_millis(10));
    let log = mock.log();
    let mut dumper = Dumper::with_config(mock, fast_config());

    let started = Instant::now();
    assert_eq!(dumper.autodetect().unwrap(), "ttyUSB0");
    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(
        log.lock().unwrap().opened,
        vec!["ttyACM0".to_string(), "ttyUSB0".to_string()]
    );
}

#[test]
fn slow_dump_outlives_its_idle_bound() {
    // ~30 chunks 10ms apart against a 100ms idle bound
    let mock = MockTransport::new()
        .port("ttyUSB0", cartridge(header_window()))
        .chunk_size(20)
        .delay(Duration::from_millis(10));
    let mut dumper = Dumper::with_config(mock, fast_config());
    dumper.set_port("ttyUSB0");

    let dump = dumper.dump(0, 0x120).unwrap();
    assert_eq!(dump.data.len(), 0x240);
}
