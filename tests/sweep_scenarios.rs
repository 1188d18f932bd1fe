//! End-to-end sweeps against mock HTTP endpoints

use site_monitor::aggregator::Aggregator;
use site_monitor::prober::HttpProber;
use site_monitor::{ProbeStatus, Site, SiteStatus};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn site_for(name: &str, server: &MockServer) -> Site {
    let addr = server.address();
    Site::new(name, addr.ip().to_string(), addr.port())
}

fn aggregator(sites: Vec<Site>, timeout: Duration, retries: u32) -> Aggregator {
    let prober = HttpProber::new(timeout, retries).unwrap();
    Aggregator::new(sites.into(), Arc::new(prober))
}

async fn respond_with(code: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(code))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_healthy_site_is_up() {
    let server = respond_with(200).await;
    let aggregator = aggregator(vec![site_for("A", &server)], Duration::from_secs(5), 2);

    let (snapshot, incidents) = aggregator.sweep().await;

    assert_eq!(
        snapshot,
        vec![SiteStatus {
            name: "A".into(),
            status: ProbeStatus::Up,
            details: "Site is operational".into(),
        }]
    );
    assert!(incidents.is_empty());
}

#[tokio::test]
async fn test_unavailable_site_is_down_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;
    let aggregator = aggregator(vec![site_for("B", &server)], Duration::from_secs(5), 2);

    let (snapshot, incidents) = aggregator.sweep().await;

    let expected = vec![SiteStatus {
        name: "B".into(),
        status: ProbeStatus::Down,
        details: "Error: 503 Service Unavailable".into(),
    }];
    assert_eq!(snapshot, expected);
    assert_eq!(incidents, expected);
}

#[tokio::test]
async fn test_timeouts_exhaust_three_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .expect(3)
        .mount(&server)
        .await;
    let aggregator = aggregator(vec![site_for("C", &server)], Duration::from_millis(200), 2);

    let (snapshot, incidents) = aggregator.sweep().await;

    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].name, "C");
    assert_eq!(snapshot[0].status, ProbeStatus::Down);
    assert_eq!(snapshot[0].details, "timeout of 200ms exceeded");
    assert_eq!(incidents.len(), 1);
}

#[tokio::test]
async fn test_probe_reports_attempt_count() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(204).set_delay(Duration::from_secs(3)))
        .expect(2)
        .mount(&server)
        .await;
    let prober = HttpProber::new(Duration::from_millis(150), 1).unwrap();

    let outcome = prober.probe_with_attempts(&site_for("slow", &server)).await;

    assert_eq!(outcome.attempts, 2);
    assert_eq!(outcome.result.status, ProbeStatus::Down);
}

#[tokio::test]
async fn test_mixed_sites_yield_single_incident() {
    let up = respond_with(200).await;
    let down = respond_with(500).await;
    let aggregator = aggregator(
        vec![site_for("web", &up), site_for("api", &down)],
        Duration::from_secs(5),
        2,
    );

    let (snapshot, incidents) = aggregator.sweep().await;

    let names: Vec<&str> = snapshot.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["web", "api"]);
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0].name, "api");
    assert_eq!(incidents[0].details, "Error: 500 Internal Server Error");
}

#[tokio::test]
async fn test_every_site_unreachable_still_completes() {
    let closed_ports: Vec<u16> = (0..3)
        .map(|_| {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        })
        .collect();
    let sites = closed_ports
        .iter()
        .enumerate()
        .map(|(i, port)| Site::new(format!("dead-{}", i), "127.0.0.1", *port))
        .collect();
    let aggregator = aggregator(sites, Duration::from_secs(2), 2);

    let (snapshot, incidents) = aggregator.sweep().await;

    assert_eq!(snapshot.len(), 3);
    assert_eq!(incidents, snapshot);
    assert!(snapshot.iter().all(|s| !s.details.is_empty()));
}
