//! WebSocket telemetry server for machinefeed.
//!
//! Consumers open a WebSocket on `/` (or `/ws`), receive one `init` message
//! with the machine roster, then one `update` message per tick. Two small
//! JSON endpoints sit beside the feed for probes and tooling.
//!
//! | Path | Description |
//! |------|-------------|
//! | `/`, `/ws` | WebSocket consumer feed |
//! | `/machines` | Machine roster with row counts |
//! | `/health` | Liveness plus consumer and tick counts |

pub mod broadcast;
pub mod registry;

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::{Json, Response},
    routing::get,
};
use serde::Serialize;
use tokio::net::TcpListener;

use machinefeed_core::{FeedMessage, MachineId, RecordStore, ReplayEngine, Status};

pub use broadcast::BroadcastLoop;
pub use registry::{Connection, ConnectionRegistry, Delivery, Frame};

/// Default port consumers connect to.
pub const DEFAULT_PORT: u16 = 8081;

/// Server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Time between ticks.
    pub tick_interval: Duration,
    /// Outbound frames buffered per consumer before it is dropped.
    pub queue_depth: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            tick_interval: Duration::from_secs(1),
            queue_depth: 32,
        }
    }
}

/// Shared server state.
pub struct AppState {
    store: Arc<RecordStore>,
    registry: Arc<ConnectionRegistry>,
}

impl AppState {
    pub fn new(store: Arc<RecordStore>, queue_depth: usize) -> io::Result<Self> {
        let registry = ConnectionRegistry::new(&FeedMessage::init(&store), queue_depth)
            .map_err(io::Error::other)?;
        Ok(Self {
            store,
            registry: Arc::new(registry),
        })
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }
}

#[derive(Debug, Serialize)]
struct MachinesResponse {
    machines: Vec<MachineEntry>,
    total: usize,
}

#[derive(Debug, Serialize)]
struct MachineEntry {
    #[serde(rename = "machineId")]
    machine_id: MachineId,
    status: Status,
    rows: usize,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    machines: usize,
    consumers: usize,
    ticks: u64,
}

async fn handle_websocket(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let registry = Arc::clone(&state.registry);
    ws.on_upgrade(move |socket| handle_socket(socket, registry))
}

/// Forward queued frames to one consumer until either side goes away.
async fn handle_socket(mut socket: WebSocket, registry: Arc<ConnectionRegistry>) {
    let Connection { id, mut frames } = registry.connect();

    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Some(text) => {
                    if socket.send(Message::Text(text.to_string().into())).await.is_err() {
                        break; // Client disconnected
                    }
                }
                None => {
                    // Dropped by the registry: too slow, or shutting down.
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            },
            msg = socket.recv() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                _ => {} // Inbound frames are ignored
            },
        }
    }

    registry.disconnect(id);
}

async fn handle_machines(State(state): State<Arc<AppState>>) -> Json<MachinesResponse> {
    let machines: Vec<MachineEntry> = state
        .store
        .iter()
        .map(|m| MachineEntry {
            machine_id: m.id().clone(),
            status: Status::Offline,
            rows: m.len(),
        })
        .collect();
    let total = machines.len();
    Json(MachinesResponse { machines, total })
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        machines: state.store.len(),
        consumers: state.registry.len(),
        ticks: state.registry.broadcasts(),
    })
}

/// Build the axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handle_websocket))
        .route("/ws", get(handle_websocket))
        .route("/machines", get(handle_machines))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// Bind `config.host:config.port` and serve until Ctrl-C.
pub async fn run_server(store: Arc<RecordStore>, config: &ServerConfig) -> io::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    serve(listener, store, config, shutdown_signal()).await
}

/// Serve on an already-bound listener until `shutdown` resolves.
///
/// On shutdown the tick loop is cancelled and every consumer queue is closed,
/// so each socket gets a Close frame; in-flight ticks are not awaited.
pub async fn serve<F>(
    listener: TcpListener,
    store: Arc<RecordStore>,
    config: &ServerConfig,
    shutdown: F,
) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state = Arc::new(AppState::new(Arc::clone(&store), config.queue_depth)?);
    let registry = Arc::clone(&state.registry);
    let addr = listener.local_addr()?;

    let feed = BroadcastLoop::new(
        ReplayEngine::new(store),
        Arc::clone(&registry),
        config.tick_interval,
    )
    .spawn();

    log::info!(
        "streaming {} machine(s) on ws://{addr} every {:?}",
        state.store.len(),
        config.tick_interval
    );

    let stop = async move {
        shutdown.await;
        log::info!("shutting down");
        feed.abort();
        registry.clear();
    };

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(stop)
        .await
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use machinefeed_core::ReadingRecord;

    fn state() -> Arc<AppState> {
        let store = RecordStore::from_histories([
            (MachineId::new("Mill"), vec![ReadingRecord::new(); 3]),
            (MachineId::new("Lathe"), vec![ReadingRecord::new(); 5]),
        ])
        .unwrap();
        Arc::new(AppState::new(Arc::new(store), 4).unwrap())
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8081);
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert!(config.queue_depth > 0);
    }

    #[tokio::test]
    async fn test_machines_lists_store_order() {
        let Json(body) = handle_machines(State(state())).await;
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["total"], 2);
        assert_eq!(json["machines"][0]["machineId"], "Mill");
        assert_eq!(json["machines"][0]["rows"], 3);
        assert_eq!(json["machines"][1]["machineId"], "Lathe");
        assert_eq!(json["machines"][1]["status"], "OFFLINE");
    }

    #[tokio::test]
    async fn test_health_counts_consumers() {
        let state = state();
        let _a = state.registry().connect();
        let _b = state.registry().connect();
        state.registry().broadcast(Frame::from("x"));

        let Json(body) = handle_health(State(Arc::clone(&state))).await;
        assert_eq!(body.status, "ok");
        assert_eq!(body.machines, 2);
        assert_eq!(body.consumers, 2);
        assert_eq!(body.ticks, 1);
    }
}
