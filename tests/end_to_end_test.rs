//! Full pipeline: trigger -> real qBittorrent session -> real ntfy client,
//! with both services played by mockito.

use mockito::Matcher;
use qbitwatch::monitor::{MonitorSettings, Termination};
use qbitwatch::notify::NtfyClient;
use qbitwatch::qbit::{CompletionStates, QbitConnector};
use qbitwatch::registry::TrackingRegistry;
use qbitwatch::tracker::Tracker;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_finished_torrent_sends_progress_then_completion() {
    let mut qbit = mockito::Server::new_async().await;
    let login = qbit
        .mock("POST", "/api/v2/auth/login")
        .with_status(200)
        .with_header("set-cookie", "SID=e2e; path=/")
        .with_body("Ok.")
        .expect(1)
        .create_async()
        .await;
    let info = qbit
        .mock("GET", "/api/v2/torrents/info")
        .match_query(Matcher::UrlEncoded("hashes".into(), "deadbeef".into()))
        .with_status(200)
        .with_body(
            r#"[{"hash":"deadbeef","name":"Ubuntu ISO","progress":1.0,"eta":8640000,"dlspeed":0,"state":"uploading"}]"#,
        )
        .expect(1)
        .create_async()
        .await;

    let mut ntfy = mockito::Server::new_async().await;
    let progress = ntfy
        .mock("POST", "/downloads")
        .match_header("priority", "default")
        .match_header("title", "Ubuntu ISO")
        .match_header("x-notification-id", "qbit-deadbeef")
        .match_body(Matcher::Regex(r"^100% \[█{10}\]\nSpeed: 0\.0 MB/s\nETA: ∞$".into()))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;
    let complete = ntfy
        .mock("POST", "/downloads")
        .match_header("priority", "high")
        .match_header("title", "Download Complete")
        .match_body("Ubuntu ISO has finished downloading.")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let sessions = QbitConnector::new(qbit.url(), "admin", "adminadmin")
        .with_timeout(Duration::from_secs(2));
    let notifier = NtfyClient::new(format!("{}/downloads", ntfy.url())).unwrap();
    let tracker = Tracker::new(
        TrackingRegistry::new(),
        Arc::new(sessions),
        Arc::new(notifier),
        MonitorSettings {
            poll_interval: Duration::from_millis(10),
            completion_states: CompletionStates::default(),
        },
    );

    let handle = tracker.spawn("deadbeef").unwrap();
    let termination = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(termination, Termination::Completed);
    assert!(tracker.registry().is_empty());

    login.assert_async().await;
    info.assert_async().await;
    progress.assert_async().await;
    complete.assert_async().await;
}
