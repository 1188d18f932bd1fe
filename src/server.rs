//! HTTP surface: WebSocket push channel, read-only status endpoints and
//! static assets.

use crate::broadcaster::{
    Broadcaster, ChannelSubscriber, SUBSCRIBER_QUEUE_CAPACITY, Subscriber,
};
use crate::errors::{MonitorError, Result};
use crate::scheduler::{ConnectionEvent, ConnectionSender};
use crate::status::SiteStatus;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub broadcaster: Arc<Broadcaster>,
    pub connections: ConnectionSender,
}

pub fn create_router(state: AppState, public_dir: &str) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/api/status", get(get_status))
        .route("/api/incidents", get(get_incidents))
        .route("/health", get(health_check))
        .fallback_service(ServeDir::new(public_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Status page: http://{}", addr);
    }

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| MonitorError::Server(e.to_string()))
}

async fn get_status(State(state): State<AppState>) -> Json<Vec<SiteStatus>> {
    let latest = state.broadcaster.latest().await;
    Json(latest.map(|r| r.snapshot.clone()).unwrap_or_default())
}

async fn get_incidents(State(state): State<AppState>) -> Json<Vec<SiteStatus>> {
    let latest = state.broadcaster.latest().await;
    Json(latest.map(|r| r.incidents.clone()).unwrap_or_default())
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    subscribers: usize,
    last_sweep: Option<u64>,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".into(),
        subscribers: state.broadcaster.registry().len().await,
        last_sweep: state.broadcaster.latest().await.map(|r| r.sweep),
    })
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Register the connection as a subscriber, request a sweep for it and
/// forward queued frames until either side goes away.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (subscriber, mut outbound) = ChannelSubscriber::new(SUBSCRIBER_QUEUE_CAPACITY);
    let subscriber_id = subscriber.id().to_string();
    let registry = Arc::clone(state.broadcaster.registry());

    registry.register(Arc::new(subscriber)).await;
    let total = registry.len().await;
    info!("Subscriber {} connected ({} total)", subscriber_id, total);

    if state
        .connections
        .send(ConnectionEvent { subscriber_id: subscriber_id.clone() })
        .is_err()
    {
        warn!("Scheduler is not running; subscriber {} waits for no sweep", subscriber_id);
    }

    let (mut sender, mut receiver) = socket.split();

    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    debug!("WebSocket receive error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    });

    loop {
        tokio::select! {
            _ = &mut recv_task => break,
            frame = outbound.recv() => match frame {
                Some(text) => {
                    if let Err(e) = sender.send(Message::Text(text)).await {
                        debug!("Failed to push to subscriber {}: {}", subscriber_id, e);
                        break;
                    }
                }
                None => break,
            },
        }
    }

    recv_task.abort();
    registry.unregister(&subscriber_id).await;
    info!("Subscriber {} disconnected", subscriber_id);
}
