//! WebSocket subscribers receive status pushes from a running monitor

use futures::StreamExt;
use serde_json::Value;
use site_monitor::{Config, Site, SiteMonitor};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, protocol::Message};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn next_event(
    ws: &mut (impl StreamExt<Item = Result<Message, WsError>> + Unpin),
) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(10), ws.next())
            .await
            .expect("timed out waiting for push")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn test_new_subscriber_receives_status_and_incidents() {
    let up = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&up)
        .await;
    let down = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&down)
        .await;

    let public_dir = tempfile::tempdir().unwrap();
    let config = Config {
        sites: vec![
            Site::new("up", up.address().ip().to_string(), up.address().port()),
            Site::new("down", down.address().ip().to_string(), down.address().port()),
        ],
        check_interval_ms: 60_000,
        public_dir: public_dir.path().to_string_lossy().into_owned(),
        ..Config::default()
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let monitor = SiteMonitor::new(config).unwrap();
    let broadcaster = monitor.broadcaster().clone();
    let server = tokio::spawn(async move {
        monitor
            .run(listener, async move {
                let _ = stop_rx.await;
            })
            .await
    });

    let (mut ws, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();

    let status = next_event(&mut ws).await;
    assert_eq!(status["event"], "statusUpdate");
    assert_eq!(
        status["data"],
        serde_json::json!([
            {"name": "up", "status": "up", "details": "Site is operational"},
            {"name": "down", "status": "down", "details": "Error: 503 Service Unavailable"}
        ])
    );

    let incidents = next_event(&mut ws).await;
    assert_eq!(incidents["event"], "incidentUpdate");
    assert_eq!(incidents["sweep"], status["sweep"]);
    assert_eq!(
        incidents["data"],
        serde_json::json!([
            {"name": "down", "status": "down", "details": "Error: 503 Service Unavailable"}
        ])
    );

    // Connecting must have scheduled a sweep beyond the startup one.
    let mut sweep = status["sweep"].as_u64().unwrap();
    while sweep < 2 {
        let event = next_event(&mut ws).await;
        sweep = event["sweep"].as_u64().unwrap();
    }
    assert!(broadcaster.latest().await.is_some());

    drop(ws);
    stop_tx.send(()).unwrap();
    tokio_test::assert_ok!(server.await.unwrap());
}
