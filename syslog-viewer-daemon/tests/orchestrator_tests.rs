//! Orchestrator integration tests.
//!
//! Tests the full flow: config -> build (recovery) -> start -> ingest -> shutdown.

use std::path::Path;
use std::time::Duration;

use syslog_viewer_core::config::ViewerConfig;
use syslog_viewer_daemon::orchestrator::Orchestrator;
use tokio::net::UdpSocket;

/// Config bound to loopback on an ephemeral port with logs under `dir`.
fn test_config(dir: &Path) -> ViewerConfig {
    let mut config = ViewerConfig::default();
    config.syslog.host = "127.0.0.1".to_owned();
    config.syslog.port = 0;
    config.storage.log_dir = dir.join("logs");
    config.buffer.capacity = 10;
    config
}

async fn wait_for_records(orchestrator: &Orchestrator, count: usize) {
    for _ in 0..300 {
        if orchestrator.query().query(None).total >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("orchestrator never buffered {count} records");
}

#[tokio::test]
async fn test_build_creates_log_dir() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::build_from_config(test_config(dir.path())).unwrap();

    assert!(dir.path().join("logs").is_dir());
    assert_eq!(orchestrator.pipeline().state_name(), "initialized");
    assert_eq!(orchestrator.config().buffer.capacity, 10);
}

#[tokio::test]
async fn test_build_rejects_invalid_config() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.storage.max_files = 0;
    assert!(Orchestrator::build_from_config(config).is_err());
}

#[tokio::test]
async fn test_ingest_then_restart_recovers_buffer() {
    let dir = tempfile::tempdir().unwrap();

    // Given: A running daemon receiving one datagram
    let mut orchestrator = Orchestrator::build_from_config(test_config(dir.path())).unwrap();
    orchestrator.start().await.unwrap();
    let addr = orchestrator.pipeline().udp_addr().unwrap();

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.send_to(b"<13>daemon test", addr).await.unwrap();
    wait_for_records(&orchestrator, 1).await;

    // When: Shutting down and building a fresh orchestrator on the same dir
    orchestrator.shutdown().await.unwrap();
    let restarted = Orchestrator::build_from_config(test_config(dir.path())).unwrap();

    // Then: The buffer is recovered from the store
    let result = restarted.query().query(None);
    assert_eq!(result.total, 1);
    assert_eq!(result.records[0].raw_message, "<13>daemon test");
    assert_eq!(result.records[0].source_address, "127.0.0.1");
}

#[tokio::test]
async fn test_run_until_stops_on_shutdown_future() {
    let dir = tempfile::tempdir().unwrap();
    let mut orchestrator = Orchestrator::build_from_config(test_config(dir.path())).unwrap();

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    tx.send(()).unwrap();

    tokio::time::timeout(
        Duration::from_secs(5),
        orchestrator.run_until(async {
            let _ = rx.await;
        }),
    )
    .await
    .expect("run_until did not return")
    .unwrap();

    assert_eq!(orchestrator.pipeline().state_name(), "stopped");
}

#[tokio::test]
async fn test_build_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let log_dir = dir.path().join("from-file");
    let config_path = dir.path().join("syslog-viewer.toml");
    std::fs::write(
        &config_path,
        format!(
            "[syslog]\nhost = \"127.0.0.1\"\nport = 0\n\n[storage]\nlog_dir = \"{}\"\nmax_files = 2\n",
            log_dir.display()
        ),
    )
    .unwrap();

    let orchestrator = Orchestrator::build(&config_path).await.unwrap();
    assert_eq!(orchestrator.config().storage.max_files, 2);
    assert!(log_dir.is_dir());
}
