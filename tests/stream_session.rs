//! End-to-end session over the line-delimited stream transport.

use std::sync::Arc;

use level_monitor::transport::Frame;
use level_monitor::{
    AlertState, DisplayColor, LevelMonitor, Session, StateChange, StreamTransport, Thresholds,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::test]
async fn test_monitor_over_stream() {
    let (client, server) = tokio::io::duplex(4096);
    let (server_read, mut server_write) = tokio::io::split(server);

    let (transport, events) = StreamTransport::spawn(client, "duplex");
    let monitor = Arc::new(LevelMonitor::new(Arc::new(transport), Thresholds::default()));
    let mut changes = monitor.subscribe();

    let runner = Arc::clone(&monitor);
    let run = tokio::spawn(async move { runner.run(events).await });

    for level in [r#"{}"#, r#"{"valor":44}"#, r#"{"valor":45}"#, r#"{"valor":"70"}"#] {
        let line = format!("{{\"event\":\"actualizar_nivel\",\"data\":{}}}\n", level);
        server_write.write_all(line.as_bytes()).await.unwrap();
    }

    // Wait until the last reading has been applied.
    loop {
        match changes.recv().await.unwrap() {
            StateChange::NoiseLevel(level) if level == 70.0 => break,
            _ => continue,
        }
    }

    let state = monitor.state();
    assert!(state.connected);
    assert_eq!(state.noise_level, 70.0);
    assert_eq!(state.color, DisplayColor::Red);
    assert_eq!(state.alert, AlertState::Critical);

    monitor.set_session(Session::new("room-12", "Ana", "5B"));
    monitor.set_grade(3.9);

    let mut reader = BufReader::new(server_read);
    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    let frame: Frame = serde_json::from_str(line.trim()).unwrap();
    let update = frame.to_grade_update().unwrap();
    assert_eq!(update.session_id, "room-12");
    assert_eq!(update.grade, 3.9);

    drop(server_write);
    drop(reader);
    run.await.unwrap();
    assert!(!monitor.state().connected);
}

#[tokio::test]
async fn test_alert_changes_follow_readings() {
    let (client, mut server) = tokio::io::duplex(4096);
    let (transport, events) = StreamTransport::spawn(client, "duplex");
    let monitor = LevelMonitor::new(Arc::new(transport), Thresholds::default());
    let mut changes = monitor.subscribe();

    for level in [44, 45, 50, 70, 71, 10] {
        let line = format!(
            "{{\"event\":\"actualizar_nivel\",\"data\":{{\"valor\":{}}}}}\n",
            level
        );
        server.write_all(line.as_bytes()).await.unwrap();
    }
    drop(server);

    monitor.run(events).await;

    let mut alerts = Vec::new();
    while let Ok(change) = changes.try_recv() {
        if let StateChange::Alert(alert) = change {
            alerts.push(alert);
        }
    }
    assert_eq!(
        alerts,
        vec![AlertState::Alert, AlertState::Critical, AlertState::Normal]
    );
}
