//! End-to-end session tests against scripted ports.

use std::fs;
use std::time::Duration;

use loopcheck::port::{Port, Reply, ScriptedPort};
use loopcheck::sink::CSV_HEADER;
use loopcheck::{
    CancelToken, CsvLog, Payload, Session, SessionState, StopReason, TerminalReporter,
    TrialTiming, parse_hex,
};

fn fast_timing() -> TrialTiming {
    TrialTiming {
        send_delay: Duration::ZERO,
        read_timeout: Duration::from_millis(10),
        loop_delay: Duration::ZERO,
    }
}

fn init_logger() {
    let _ = env_logger::builder()
        .is_test(true)
        .try_init();
}

fn scenario_port() -> ScriptedPort {
    let flipped = parse_hex("5A 01 00 00 00 00 F6 96 00 00").unwrap();
    ScriptedPort::new("loop0")
        .with_replies([
            Reply::Echo,
            Reply::Echo,
            Reply::Echo,
            Reply::Silence,
            Reply::Bytes(flipped.as_bytes().to_vec()),
        ])
}

#[test]
fn five_trial_scenario_matches_expected_stats() {
    init_logger();
    let payload = parse_hex("5A 00 00 00 00 00 F6 96 00 00").unwrap();
    let mut port = scenario_port();
    let mut reporter = TerminalReporter::new(Vec::new());
    let mut session = Session::new(payload, fast_timing(), CancelToken::new()).with_trial_limit(5);

    let summary = session.run(&mut port, &mut reporter).unwrap();

    let stats = summary.stats;
    assert_eq!(stats.total_sent(), 5);
    assert_eq!(stats.total_errors(), 2);
    assert_eq!(stats.no_response_count(), 1);
    assert_eq!(stats.mismatch_count(), 1);
    assert!((stats.percentages().error_pct - 40.0).abs() < 1e-9);

    let out = String::from_utf8(reporter.into_inner()).unwrap();
    assert_eq!(out.matches("NO RESPONSE").count(), 1);
    assert_eq!(out.matches("DATA MISMATCH").count(), 1);
    assert!(out.contains("Rx: 5A0100000000F6960000"));
    assert!(out.contains("[STATUS] Sent: 5 | Errors: 40.0% (2)"));
    assert!(out.ends_with('\n'));
}

#[test]
fn error_lines_never_share_a_row_with_status() {
    let mut port = scenario_port();
    let mut reporter = TerminalReporter::new(Vec::new());
    let mut session =
        Session::new(Payload::default(), fast_timing(), CancelToken::new()).with_trial_limit(5);

    session.run(&mut port, &mut reporter).unwrap();

    let out = String::from_utf8(reporter.into_inner()).unwrap();
    for line in out.split('\n') {
        let last_frame = line.rsplit('\r').next().unwrap_or_default();
        if last_frame.contains("NO RESPONSE") || last_frame.contains("DATA MISMATCH") {
            assert!(!line.contains("[STATUS]"), "error line overwritten: {line:?}");
        }
    }
}

#[test]
fn csv_log_has_one_header_and_a_row_per_trial() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("serial_log.csv");

    for _ in 0..2 {
        let sink = CsvLog::open(&path).unwrap();
        let mut port = scenario_port();
        let mut reporter = TerminalReporter::new(Vec::new());
        let mut session = Session::new(Payload::default(), fast_timing(), CancelToken::new())
            .with_sink(Box::new(sink))
            .with_trial_limit(5);
        session.run(&mut port, &mut reporter).unwrap();
    }

    let content = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 11);
    assert_eq!(lines[0], CSV_HEADER);
    assert_eq!(lines.iter().filter(|l| **l == CSV_HEADER).count(), 1);

    let fourth: Vec<&str> = lines[4].split(',').collect();
    assert_eq!(fourth[1], "4");
    assert_eq!(fourth[2], "5A0000000000F6960000");
    assert_eq!(fourth[3], "");
    assert_eq!(fourth[4], "NO RESPONSE");

    let first: Vec<&str> = lines[1].split(',').collect();
    assert_eq!(first[3], first[2]);
    assert_eq!(first[4], "");
}

#[test]
fn same_session_runs_with_and_without_sink() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("log.csv");

    let mut with_sink = Session::new(Payload::default(), fast_timing(), CancelToken::new())
        .with_sink(Box::new(CsvLog::open(&path).unwrap()))
        .with_trial_limit(5);
    let mut without_sink =
        Session::new(Payload::default(), fast_timing(), CancelToken::new()).with_trial_limit(5);

    let a = with_sink
        .run(&mut scenario_port(), &mut TerminalReporter::new(Vec::new()))
        .unwrap();
    let b = without_sink
        .run(&mut scenario_port(), &mut TerminalReporter::new(Vec::new()))
        .unwrap();

    assert_eq!(a.stats, b.stats);
}

#[test]
fn cancellation_mid_read_closes_once_and_leaves_clean_output() {
    let cancel = CancelToken::new();
    let mut port = ScriptedPort::new("loop0").with_replies([
        Reply::Echo,
        Reply::Silence,
        Reply::CancelDuringRead,
    ]);
    let mut reporter = TerminalReporter::new(Vec::new());
    let mut session = Session::new(Payload::default(), fast_timing(), cancel.clone());

    let summary = session.run(&mut port, &mut reporter).unwrap();

    assert_eq!(summary.reason, StopReason::Cancelled);
    // the interrupted third trial is neither counted nor reported
    assert_eq!(summary.stats.total_sent(), 2);
    assert_eq!(port.writes().len(), 3);
    assert_eq!(port.close_count(), 1);
    assert!(!port.is_open());
    assert_eq!(session.state(), SessionState::Stopped);

    let out = String::from_utf8(reporter.into_inner()).unwrap();
    assert!(out.ends_with('\n'));
    let last_status = out
        .trim_end_matches('\n')
        .rsplit('\r')
        .next()
        .unwrap();
    assert!(last_status.starts_with("[STATUS] Sent: 2 | Errors: 50.0% (1)"));
}

#[test]
fn transport_fault_keeps_stats_for_summary() {
    let mut port = ScriptedPort::new("loop0").with_replies([
        Reply::Echo,
        Reply::Bytes(vec![0x00]),
        Reply::WriteFault,
    ]);
    let mut reporter = TerminalReporter::new(Vec::new());
    let mut session = Session::new(Payload::default(), fast_timing(), CancelToken::new());

    let err = session.run(&mut port, &mut reporter).unwrap_err();

    assert!(err.is_transport_fault());
    assert_eq!(session.stats().total_sent(), 2);
    assert_eq!(session.stats().mismatch_count(), 1);
    assert_eq!(port.close_count(), 1);
}

#[test]
fn loop_delay_is_interrupted_by_cancel() {
    let cancel = CancelToken::new();
    let timing = TrialTiming {
        loop_delay: Duration::from_secs(30),
        ..fast_timing()
    };
    let remote = cancel.clone();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        remote.cancel();
    });

    let mut port = ScriptedPort::new("loop0");
    let mut reporter = TerminalReporter::new(Vec::new());
    let mut session = Session::new(Payload::default(), timing, cancel);
    let start = std::time::Instant::now();

    let summary = session.run(&mut port, &mut reporter).unwrap();

    handle.join().unwrap();
    assert_eq!(summary.reason, StopReason::Cancelled);
    assert_eq!(summary.stats.total_sent(), 1);
    assert!(start.elapsed() < Duration::from_secs(10));
}
