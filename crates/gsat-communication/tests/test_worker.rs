//! Worker lifecycle scenarios against a scripted serial device

use gsat_communication::{control_channel, CommandSender, MockPort, SerialWorker};
use gsat_core::{
    event_channel, ConnectionConfig, ConnectionError, EventDispatcher, SerialCommand, SerialEvent,
    WorkerConfig,
};
use std::time::Duration;
use tokio::sync::mpsc;

fn test_config(port: &str) -> WorkerConfig {
    WorkerConfig::new(ConnectionConfig::new(port, 115200))
        .with_timing(Duration::from_millis(1), Duration::ZERO)
}

/// Run a worker to completion on this thread with `commands` pre-queued.
///
/// The sender is kept alive for the whole run so the worker only stops on
/// its own terms.
fn run_to_end(
    mock: &MockPort,
    config: WorkerConfig,
    commands: Vec<SerialCommand>,
) -> Vec<SerialEvent> {
    let (cmd_tx, cmd_rx) = control_channel();
    let (evt_tx, mut evt_rx) = event_channel();
    for command in commands {
        cmd_tx.send(command).unwrap();
    }

    SerialWorker::new(config, mock.opener(), cmd_rx, evt_tx).run();
    drop(cmd_tx);

    let mut events = Vec::new();
    while let Ok(event) = evt_rx.try_recv() {
        events.push(event);
    }
    events
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<SerialEvent>) -> SerialEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a serial event")
        .expect("event channel closed")
}

fn spawn_worker(
    mock: &MockPort,
    config: WorkerConfig,
) -> (
    CommandSender,
    mpsc::UnboundedReceiver<SerialEvent>,
    gsat_communication::WorkerHandle,
) {
    let (cmd_tx, cmd_rx) = control_channel();
    let (evt_tx, evt_rx) = event_channel();
    let handle = SerialWorker::new(config, mock.opener(), cmd_rx, evt_tx)
        .spawn()
        .unwrap();
    (cmd_tx, evt_rx, handle)
}

fn assert_no_io_after_abort(events: &[SerialEvent]) {
    let abort_at = events
        .iter()
        .position(|e| matches!(e, SerialEvent::Aborted(_)))
        .expect("no Aborted event");
    assert!(!events[abort_at + 1..].iter().any(|e| matches!(
        e,
        SerialEvent::LineReceived(_) | SerialEvent::PortOpened(_) | SerialEvent::Aborted(_)
    )));
}

#[tokio::test]
async fn test_happy_path() {
    let mock = MockPort::new();
    let (tx, mut rx, handle) = spawn_worker(&mock, test_config("COM-TEST"));

    assert_eq!(
        next_event(&mut rx).await,
        SerialEvent::PortOpened("COM-TEST".to_string())
    );

    mock.push_data("ok\r\n");
    assert_eq!(
        next_event(&mut rx).await,
        SerialEvent::LineReceived("ok\r\n".to_string())
    );

    tx.exit().unwrap();
    assert_eq!(next_event(&mut rx).await, SerialEvent::PortClosed);
    assert_eq!(next_event(&mut rx).await, SerialEvent::Terminated);

    handle.join().unwrap();
    assert!(!mock.is_open());
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_transmit_reaches_device() {
    let mock = MockPort::new();
    let (tx, mut rx, handle) = spawn_worker(&mock, test_config("/dev/ttyACM0"));
    assert!(matches!(next_event(&mut rx).await, SerialEvent::PortOpened(_)));

    tx.transmit("$$\n").unwrap();
    tx.transmit("G0 X10\n").unwrap();
    tx.exit().unwrap();

    assert_eq!(next_event(&mut rx).await, SerialEvent::PortClosed);
    assert_eq!(next_event(&mut rx).await, SerialEvent::Terminated);
    handle.join().unwrap();

    assert_eq!(mock.written(), vec![b"$$\n".to_vec(), b"G0 X10\n".to_vec()]);
}

#[test]
fn test_records_split_across_reads() {
    let mock = MockPort::new();
    mock.push_data("Grbl 1.1h ['$' for ");
    mock.push_data("help]\r\nok\r");
    mock.push_data("\n\n\n<Idle|MPos:0.000,0.000,0.000>\n");
    mock.push_disconnect();

    let events = run_to_end(&mock, test_config("COM-TEST"), vec![]);
    assert_eq!(
        events,
        vec![
            SerialEvent::PortOpened("COM-TEST".to_string()),
            SerialEvent::LineReceived("Grbl 1.1h ['$' for help]\r\n".to_string()),
            SerialEvent::LineReceived("ok\r\n".to_string()),
            SerialEvent::LineReceived("<Idle|MPos:0.000,0.000,0.000>\n".to_string()),
            SerialEvent::Aborted(String::new()),
            SerialEvent::Terminated,
        ]
    );
}

#[test]
fn test_exit_precedence() {
    let mock = MockPort::new();
    let events = run_to_end(
        &mock,
        test_config("COM-TEST"),
        vec![
            SerialCommand::transmit("A"),
            SerialCommand::Exit,
            SerialCommand::transmit("B"),
        ],
    );

    assert_eq!(mock.written(), vec![b"A".to_vec()]);
    assert_eq!(
        events,
        vec![
            SerialEvent::PortOpened("COM-TEST".to_string()),
            SerialEvent::PortClosed,
            SerialEvent::Terminated,
        ]
    );
}

#[test]
fn test_empty_transmit_is_noop() {
    let mock = MockPort::new();
    let events = run_to_end(
        &mock,
        test_config("COM-TEST"),
        vec![SerialCommand::Transmit(Vec::new()), SerialCommand::Exit],
    );

    assert!(mock.written().is_empty());
    assert_eq!(
        events,
        vec![
            SerialEvent::PortOpened("COM-TEST".to_string()),
            SerialEvent::PortClosed,
            SerialEvent::Terminated,
        ]
    );
}

#[test]
fn test_no_port_configured() {
    let mock = MockPort::new();
    let config = WorkerConfig::new(ConnectionConfig::no_port());
    let events = run_to_end(&mock, config, vec![]);

    assert_eq!(
        events,
        vec![
            SerialEvent::Aborted(ConnectionError::NoPortConfigured.to_string()),
            SerialEvent::Terminated,
        ]
    );
    assert_eq!(mock.open_count(), 0);
}

#[test]
fn test_open_failure() {
    let mock = MockPort::new();
    mock.fail_open(ConnectionError::open_failure(
        "/dev/ttyUSB0",
        "Device or resource busy",
    ));

    let events = run_to_end(&mock, test_config("/dev/ttyUSB0"), vec![]);
    assert_eq!(
        events,
        vec![
            SerialEvent::Aborted("Failed to open port /dev/ttyUSB0: Device or resource busy".to_string()),
            SerialEvent::Terminated,
        ]
    );
}

#[test]
fn test_mid_stream_read_failure() {
    let mock = MockPort::new();
    mock.push_data("ok\nerror:9");
    mock.push_read_error("device unplugged");
    mock.push_data("\nok\n");

    let events = run_to_end(&mock, test_config("COM-TEST"), vec![]);
    assert_eq!(
        events,
        vec![
            SerialEvent::PortOpened("COM-TEST".to_string()),
            SerialEvent::LineReceived("ok\n".to_string()),
            SerialEvent::Aborted("Serial port I/O error: device unplugged".to_string()),
            SerialEvent::PortClosed,
            SerialEvent::Terminated,
        ]
    );
    assert_no_io_after_abort(&events);
    assert!(!mock.is_open());
}

#[test]
fn test_write_failure_aborts_and_closes() {
    let mock = MockPort::new();
    mock.fail_writes("write timed out");

    let events = run_to_end(
        &mock,
        test_config("COM-TEST"),
        vec![SerialCommand::transmit("G1 X5\n"), SerialCommand::transmit("G1 X6\n")],
    );

    assert_eq!(
        events,
        vec![
            SerialEvent::PortOpened("COM-TEST".to_string()),
            SerialEvent::Aborted("Serial port I/O error: write timed out".to_string()),
            SerialEvent::PortClosed,
            SerialEvent::Terminated,
        ]
    );
    assert!(mock.written().is_empty());
    assert_no_io_after_abort(&events);
}

#[test]
fn test_device_side_close() {
    let mock = MockPort::new();
    mock.push_data("ok\n");
    mock.push_disconnect();
    mock.push_data("ignored\n");

    let events = run_to_end(&mock, test_config("COM-TEST"), vec![]);
    assert_eq!(
        events,
        vec![
            SerialEvent::PortOpened("COM-TEST".to_string()),
            SerialEvent::LineReceived("ok\n".to_string()),
            SerialEvent::Aborted(String::new()),
            SerialEvent::Terminated,
        ]
    );
    assert_no_io_after_abort(&events);
}

#[test]
fn test_line_pacing_does_not_reorder() {
    let mock = MockPort::new();
    mock.push_data("one\ntwo\nthree\n");
    mock.push_disconnect();

    let config = test_config("COM-TEST")
        .with_timing(Duration::from_millis(1), Duration::from_millis(2));
    let events = run_to_end(&mock, config, vec![]);
    let lines: Vec<&SerialEvent> = events
        .iter()
        .filter(|e| matches!(e, SerialEvent::LineReceived(_)))
        .collect();
    assert_eq!(
        lines,
        vec![
            &SerialEvent::LineReceived("one\n".to_string()),
            &SerialEvent::LineReceived("two\n".to_string()),
            &SerialEvent::LineReceived("three\n".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_dispatcher_sink() {
    let mock = MockPort::new();
    mock.push_data("ok\n");
    mock.push_disconnect();

    let dispatcher = EventDispatcher::default();
    let mut first = dispatcher.subscribe();
    let mut second = dispatcher.subscribe();

    let (cmd_tx, cmd_rx) = control_channel();
    let handle = SerialWorker::new(test_config("COM-TEST"), mock.opener(), cmd_rx, dispatcher)
        .spawn()
        .unwrap();
    tokio::task::spawn_blocking(move || handle.join())
        .await
        .unwrap()
        .unwrap();
    drop(cmd_tx);

    for rx in [&mut first, &mut second] {
        assert_eq!(
            rx.recv().await.unwrap(),
            SerialEvent::PortOpened("COM-TEST".to_string())
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            SerialEvent::LineReceived("ok\n".to_string())
        );
        assert_eq!(rx.recv().await.unwrap(), SerialEvent::Aborted(String::new()));
        assert_eq!(rx.recv().await.unwrap(), SerialEvent::Terminated);
    }
}

#[test]
fn test_dispatcher_sink_keeps_every_record_for_late_reader() {
    let mock = MockPort::new();
    for i in 0..150 {
        mock.push_data(format!("line{}\n", i));
    }
    mock.push_disconnect();

    let dispatcher = EventDispatcher::default();
    let mut late = dispatcher.subscribe();

    let (cmd_tx, cmd_rx) = control_channel();
    SerialWorker::new(test_config("COM-TEST"), mock.opener(), cmd_rx, dispatcher).run();
    drop(cmd_tx);

    let mut events = Vec::new();
    while let Ok(event) = late.try_recv() {
        events.push(event);
    }

    assert_eq!(events.len(), 153);
    assert_eq!(events[0], SerialEvent::PortOpened("COM-TEST".to_string()));
    for (i, event) in events[1..151].iter().enumerate() {
        assert_eq!(event, &SerialEvent::LineReceived(format!("line{}\n", i)));
    }
    assert_eq!(events[151], SerialEvent::Aborted(String::new()));
    assert_eq!(events[152], SerialEvent::Terminated);
}
