use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tellog::clock::ManualClock;
use tellog::telemetry::{noop_event_listener, RecordingEventListener};
use tellog::*;

fn quiet_config() -> LoggerConfig {
    LoggerConfig {
        event_listener: noop_event_listener(),
        ..LoggerConfig::default()
    }
}

fn manual_logger(config: LoggerConfig) -> (TelemetryLogger, ManualClock) {
    let clock = ManualClock::new();
    let logger = TelemetryLogger::with_clock(config, Box::new(clock.clone()));
    (logger, clock)
}

fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .expect("read output file")
        .lines()
        .map(str::to_string)
        .collect()
}

/// Splits `name [ts]: value` into its timestamp and value text.
fn parse_value_line(line: &str) -> (u64, String) {
    let open = line.find('[').expect("timestamp open bracket");
    let close = line.find("]: ").expect("timestamp close bracket");
    let ts = line[open + 1..close].parse().expect("numeric timestamp");
    (ts, line[close + 3..].to_string())
}

#[test]
fn test_battery_scenario_readable_file() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("battery.log");
    let (mut logger, clock) = manual_logger(quiet_config());

    clock.advance(Duration::from_nanos(1_000));
    logger.declare("battery", "V", ValueKind::Numeric).unwrap();
    logger.log_static("battery", 0.0).unwrap();
    clock.advance(Duration::from_nanos(2_000));
    logger.log("battery", 29.5).unwrap();
    clock.advance(Duration::from_nanos(3_000));
    logger.log("battery", 28.9).unwrap();

    logger.attach_file(&path, OutputMode::Readable).unwrap();
    logger.detach_file();

    let lines = read_lines(&path);
    assert_eq!(
        lines,
        vec![
            "Series 'battery' (ID: 1, Unit: V, Start time: 1000)",
            "battery [0]: 0.000000",
            "battery [3000]: 29.500000",
            "battery [6000]: 28.900000",
        ]
    );
}

#[test]
fn test_battery_scenario_with_system_clock() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("battery.log");
    let mut logger = TelemetryLogger::with_config(quiet_config());

    logger.declare("battery", "V", ValueKind::Numeric).unwrap();
    logger.log_static("battery", 0.0).unwrap();
    logger.log("battery", 29.5).unwrap();
    std::thread::sleep(Duration::from_millis(1));
    logger.log("battery", 28.9).unwrap();
    logger.attach_file(&path, OutputMode::Readable).unwrap();
    drop(logger);

    let lines = read_lines(&path);
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("Series 'battery' (ID: 1, Unit: V, Start time: "));

    let values: Vec<(u64, String)> = lines[1..].iter().map(|l| parse_value_line(l)).collect();
    assert_eq!(values[0], (0, "0.000000".to_string()));
    assert!(values[1].0 > 0);
    assert!(values[2].0 > values[1].0);
    assert_eq!(values[1].1, "29.500000");
    assert_eq!(values[2].1, "28.900000");
}

#[test]
fn test_log_timestamp_bounded_by_registration_and_now() {
    let mut logger = TelemetryLogger::with_config(quiet_config());
    logger.declare("temp", "C", ValueKind::Numeric).unwrap();
    let registered_at = logger.series("temp").unwrap().registered_at;

    let out = SharedBuffer::new();
    logger
        .attach_console_to(Box::new(out.clone()), OutputMode::Readable)
        .unwrap();
    for i in 0..10 {
        logger.log("temp", f64::from(i)).unwrap();
        let now = logger.elapsed().as_nanos() as u64;

        let text = out.contents_string();
        let last = text.lines().last().expect("a value line");
        let (ts, _) = parse_value_line(last);
        assert!(ts >= registered_at, "ts {} < registered_at {}", ts, registered_at);
        assert!(ts <= now, "ts {} > now {}", ts, now);
    }

    logger.log_static("temp", 1.0).unwrap();
    let text = out.contents_string();
    assert_eq!(parse_value_line(text.lines().last().unwrap()).0, 0);
}

#[test]
fn test_status_type_mismatch_produces_nothing() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("status.log");
    let events = RecordingEventListener::new();
    let (mut logger, _clock) = manual_logger(LoggerConfig {
        event_listener: events.clone(),
        ..LoggerConfig::default()
    });

    logger.declare("status", "", ValueKind::Text).unwrap();
    let err = logger.log("status", 42.0).unwrap_err();
    assert!(matches!(
        err,
        TelemetryError::TypeMismatch { expected: ValueKind::Text, found: ValueKind::Numeric, .. }
    ));
    assert_eq!(logger.buffered_len(), 0);
    assert_eq!(logger.series_names(), vec!["status"]);

    let console = SharedBuffer::new();
    logger
        .attach_console_to(Box::new(console.clone()), OutputMode::Readable)
        .unwrap();
    logger.attach_file(&path, OutputMode::Readable).unwrap();
    assert!(logger.log_static("status", 1.5).is_err());
    logger.detach_file();

    let declaration = "Series 'status' (ID: 1, Unit: , Start time: 0)";
    assert_eq!(read_lines(&path), vec![declaration]);
    assert_eq!(console.contents_string(), format!("{}\n", declaration));
    assert!(events
        .events()
        .iter()
        .any(|e| matches!(e, LoggerEvent::ValueRejected { series, .. } if series == "status")));
}

#[test]
fn test_clear_then_redeclare_restarts_ids() {
    let (mut logger, _clock) = manual_logger(quiet_config());
    logger.declare("battery", "V", ValueKind::Numeric).unwrap();
    logger.declare("status", "", ValueKind::Text).unwrap();
    logger.log("battery", 12.0).unwrap();
    logger.log("status", "OK").unwrap();

    logger.clear();
    assert!(logger.series_names().is_empty());
    assert!(logger.series("battery").is_none());
    assert!(matches!(
        logger.log("battery", 1.0),
        Err(TelemetryError::NotDeclared(_))
    ));

    logger.declare("status", "", ValueKind::Text).unwrap();
    logger.declare("battery", "V", ValueKind::Numeric).unwrap();
    assert_eq!(logger.series("status").unwrap().id, FIRST_SERIES_ID);
    assert_eq!(logger.series("battery").unwrap().id, FIRST_SERIES_ID + 1);
}

#[test]
fn test_clear_keeps_sinks_and_written_output() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("out.log");
    let (mut logger, _clock) = manual_logger(quiet_config());

    logger.attach_file(&path, OutputMode::Readable).unwrap();
    logger.declare("a", "", ValueKind::Numeric).unwrap();
    logger.log("a", 1.0).unwrap();
    logger.clear();
    assert!(logger.is_file_active());

    logger.declare("b", "", ValueKind::Numeric).unwrap();
    logger.log("b", 2.0).unwrap();
    logger.detach_file();

    assert_eq!(
        read_lines(&path),
        vec![
            "Series 'a' (ID: 1, Unit: , Start time: 0)",
            "a [0]: 1.000000",
            "Series 'b' (ID: 1, Unit: , Start time: 0)",
            "b [0]: 2.000000",
        ]
    );
}

#[test]
fn test_buffered_values_drain_before_later_values() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("drain.log");
    let (mut logger, clock) = manual_logger(quiet_config());
    logger.declare("x", "m", ValueKind::Numeric).unwrap();

    let n = 25;
    for i in 0..n {
        clock.advance(Duration::from_nanos(10));
        logger.log("x", f64::from(i)).unwrap();
    }
    assert_eq!(logger.buffered_len(), n as usize);

    logger.attach_file(&path, OutputMode::Readable).unwrap();
    assert_eq!(logger.buffered_len(), 0);
    clock.advance(Duration::from_nanos(10));
    logger.log("x", 100.0).unwrap();
    logger.detach_file();

    let lines = read_lines(&path);
    assert_eq!(lines.len(), 1 + n as usize + 1);
    let values: Vec<(u64, String)> = lines[1..].iter().map(|l| parse_value_line(l)).collect();
    for (i, (ts, v)) in values.iter().take(n as usize).enumerate() {
        assert_eq!(*ts, 10 * (i as u64 + 1));
        assert_eq!(*v, format!("{}.000000", i));
    }
    assert_eq!(values[n as usize], (10 * (n as u64 + 1), "100.000000".to_string()));
}

#[test]
fn test_static_values_drain_first() {
    let (mut logger, clock) = manual_logger(quiet_config());
    logger.declare("x", "", ValueKind::Numeric).unwrap();
    clock.advance(Duration::from_nanos(5));
    logger.log("x", 1.0).unwrap();
    logger.log_static("x", 2.0).unwrap();

    let out = SharedBuffer::new();
    logger
        .attach_console_to(Box::new(out.clone()), OutputMode::Readable)
        .unwrap();
    let text = out.contents_string();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[1], "x [0]: 2.000000");
    assert_eq!(lines[2], "x [5]: 1.000000");
}

#[test]
fn test_attach_file_open_failure_keeps_buffer() {
    let dir = TempDir::new().expect("tempdir");
    let bad = dir.path().join("no_such_dir").join("out.log");
    let events = RecordingEventListener::new();
    let (mut logger, _clock) = manual_logger(LoggerConfig {
        event_listener: events.clone(),
        ..LoggerConfig::default()
    });
    logger.declare("x", "", ValueKind::Numeric).unwrap();
    logger.log("x", 1.0).unwrap();

    let err = logger.attach_file(&bad, OutputMode::Binary).unwrap_err();
    assert!(matches!(err, TelemetryError::SinkOpenFailed { .. }));
    assert!(!logger.is_file_active());
    assert_eq!(logger.buffered_len(), 1);

    // Still no sink, so the next value is buffered too.
    logger.log("x", 2.0).unwrap();
    assert_eq!(logger.buffered_len(), 2);
    assert!(events
        .events()
        .iter()
        .any(|e| matches!(e, LoggerEvent::SinkAttachFailed { path: Some(p), .. } if p == &bad)));

    // A later attempt with a valid path succeeds and drains both values.
    let good = dir.path().join("out.log");
    logger.attach_file(&good, OutputMode::Readable).unwrap();
    logger.detach_file();
    assert_eq!(read_lines(&good).len(), 3);
}

#[test]
fn test_reattach_file_switches_path_and_replays_declarations() {
    let dir = TempDir::new().expect("tempdir");
    let first = dir.path().join("first.log");
    let second = dir.path().join("second.log");
    let (mut logger, _clock) = manual_logger(quiet_config());

    logger.declare("a", "V", ValueKind::Numeric).unwrap();
    logger.attach_file(&first, OutputMode::Readable).unwrap();
    logger.log("a", 1.0).unwrap();
    logger.attach_file(&second, OutputMode::Readable).unwrap();
    assert_eq!(logger.file_path(), Some(second.as_path()));
    logger.log("a", 2.0).unwrap();
    logger.detach_file();
    assert!(logger.file_path().is_none());

    assert_eq!(
        read_lines(&first),
        vec!["Series 'a' (ID: 1, Unit: V, Start time: 0)", "a [0]: 1.000000"]
    );
    assert_eq!(
        read_lines(&second),
        vec!["Series 'a' (ID: 1, Unit: V, Start time: 0)", "a [0]: 2.000000"]
    );
}

#[test]
fn test_detached_file_receives_nothing_more() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("out.log");
    let (mut logger, _clock) = manual_logger(quiet_config());
    logger.declare("a", "", ValueKind::Text).unwrap();
    logger.attach_file(&path, OutputMode::Readable).unwrap();
    logger.log("a", "before").unwrap();
    logger.detach_file();
    logger.log("a", "after").unwrap();

    assert_eq!(read_lines(&path).len(), 2);
    assert_eq!(logger.buffered_len(), 1);
}

#[test]
fn test_console_and_file_in_different_modes() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("out.rrd");
    let (mut logger, clock) = manual_logger(quiet_config());

    let console = SharedBuffer::new();
    logger
        .attach_console_to(Box::new(console.clone()), OutputMode::Readable)
        .unwrap();
    logger.attach_file(&path, OutputMode::Binary).unwrap();

    logger.declare("status", "", ValueKind::Text).unwrap();
    clock.advance(Duration::from_nanos(7));
    logger.log("status", "OK").unwrap();
    logger.detach_file();

    assert_eq!(
        console.contents_string(),
        "Series 'status' (ID: 1, Unit: , Start time: 0)\nstatus [7]: OK\n"
    );
    let bytes = fs::read(&path).unwrap();
    let records = RecordReader::new(&bytes)
        .with_kind("status", ValueKind::Text)
        .read_all()
        .unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(
        records[1],
        Record::Value(LoggedValue {
            series: "status".to_string(),
            series_id: 1,
            timestamp: 7,
            payload: Payload::from("OK"),
        })
    );
}

#[test]
fn test_events_for_sink_lifecycle() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("out.log");
    let events = RecordingEventListener::new();
    let (mut logger, _clock) = manual_logger(LoggerConfig {
        event_listener: events.clone() as Arc<dyn LoggerEventListener>,
        ..LoggerConfig::default()
    });
    logger.declare("a", "", ValueKind::Numeric).unwrap();
    logger.log("a", 1.0).unwrap();
    logger.attach_file(&path, OutputMode::Readable).unwrap();
    logger.detach_file();

    let seen = events.events();
    assert!(seen.contains(&LoggerEvent::SinkAttached {
        slot: tellog::sink::SinkSlot::File,
        mode: OutputMode::Readable,
        path: Some(path.clone()),
    }));
    assert!(seen.contains(&LoggerEvent::BufferDrained {
        slot: tellog::sink::SinkSlot::File,
        values: 1,
    }));
    assert_eq!(
        seen.last(),
        Some(&LoggerEvent::SinkDetached { slot: tellog::sink::SinkSlot::File })
    );
}
