mod network;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use protocol::GameType;
use relay_core::{AdminCommand, Relay, RelayConfig, RelayEvent};
use serde::Deserialize;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

const CONFIG_PATH: &str = "RelayConfig.json";
const TCP_BIND: &str = "0.0.0.0:7777";
const UDP_BIND: &str = "0.0.0.0:7777";
const ADMIN_BIND: &str = "127.0.0.1:8080";

#[derive(Clone)]
struct AdminState {
    event_tx: mpsc::Sender<RelayEvent>,
}

async fn load_config() -> RelayConfig {
    match tokio::fs::read_to_string(CONFIG_PATH).await {
        Ok(json_content) => match serde_json::from_str(&json_content) {
            Ok(config) => config,
            Err(err) => {
                tracing::error!(%err, "failed to parse RelayConfig.json, using defaults");
                RelayConfig::default()
            }
        },
        Err(err) => {
            tracing::info!(%err, "no RelayConfig.json found, using defaults");
            RelayConfig::default()
        }
    }
}

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")).into())
}

fn debug_filter() -> EnvFilter {
    EnvFilter::new(format!("{}=debug", env!("CARGO_CRATE_NAME")))
}

#[tokio::main]
/// Activates tracing, loads the relay's configuration, spawns the single
/// actor that owns all relay state, then starts the TCP/UDP network loop and
/// the admin HTTP surface side by side.
async fn main() {
    let (filter_layer, filter_handle) = reload::Layer::new(default_filter());
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_target(true)
                .with_thread_ids(true),
        )
        .init();

    let config = load_config().await;
    let idle_timeout = config.idle_timeout();

    let (event_tx, event_rx) = mpsc::channel::<RelayEvent>(1024);
    let mut relay = Relay::new(config, event_tx.clone());
    relay.set_debug_logging_hook(Arc::new(move |enabled| {
        let filter = if enabled { debug_filter() } else { default_filter() };
        if let Err(err) = filter_handle.reload(filter) {
            tracing::warn!(%err, "failed to reload tracing filter");
        }
    }));
    tokio::spawn(relay.run(event_rx));

    let udp_socket = match UdpSocket::bind(UDP_BIND).await {
        Ok(socket) => Arc::new(socket),
        Err(err) => {
            tracing::error!(%err, "failed to bind udp socket");
            panic!("failed to bind udp socket: {err}");
        }
    };
    let udp_peers: network::UdpPeerTable = Arc::new(Mutex::new(std::collections::HashMap::new()));

    let tcp_listener = match TcpListener::bind(TCP_BIND).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%err, "failed to bind tcp listener");
            panic!("failed to bind tcp listener: {err}");
        }
    };

    tokio::spawn(network::run_udp_socket(udp_socket.clone(), event_tx.clone(), udp_peers.clone()));
    tokio::spawn(network::run_tcp_listener(
        tcp_listener,
        event_tx.clone(),
        udp_socket,
        udp_peers,
        idle_timeout,
    ));

    let admin_state = AdminState { event_tx };
    let app = Router::new()
        .route("/status", get(status_handler))
        .route("/close-room", post(close_room_handler))
        .route("/broadcast", post(broadcast_handler))
        .route("/blacklist", post(blacklist_handler))
        .route("/spam-limit", post(spam_limit_handler))
        .route("/refresh-room", post(refresh_room_handler))
        .route("/refresh-type", post(refresh_type_handler))
        .route("/debug-logging", post(debug_logging_handler))
        .route("/shutdown", post(shutdown_handler))
        .with_state(admin_state);

    let admin_listener = tokio::net::TcpListener::bind(ADMIN_BIND).await.unwrap();
    axum::serve(admin_listener, app).await.unwrap();
}

async fn dispatch(state: &AdminState, command: AdminCommand) {
    let _ = state.event_tx.send(RelayEvent::Admin(command)).await;
}

/// A human-readable dump, in the same spirit as the status/enlist routes this
/// server used to expose — line-per-room rather than a typed JSON body.
async fn status_handler(State(state): State<AdminState>) -> impl IntoResponse {
    let (reply, rx) = oneshot::channel();
    dispatch(&state, AdminCommand::Status { reply }).await;
    match rx.await {
        Ok(status) => {
            let mut lines = vec![format!(
                "connections: {}  rooms: {}  closing: {}",
                status.connection_count, status.room_count, status.closing
            )];
            lines.extend(status.rooms.iter().map(|room| {
                format!(
                    "room {:<12} type={:<8} clients={:03} public={} protected={} forwarded={}",
                    room.short_id,
                    room.game_type.as_deref().unwrap_or("-"),
                    room.client_count,
                    room.is_public,
                    room.is_protected,
                    room.packets_forwarded
                )
            }));
            lines.join("\n")
        }
        Err(_) => "relay actor is gone".to_string(),
    }
}

#[derive(Deserialize)]
struct CloseRoomBody {
    short_id: String,
}

async fn close_room_handler(State(state): State<AdminState>, Json(body): Json<CloseRoomBody>) -> impl IntoResponse {
    let (reply, rx) = oneshot::channel();
    dispatch(&state, AdminCommand::CloseRoom { short_id: body.short_id, reply }).await;
    match rx.await {
        Ok(true) => "closed",
        Ok(false) => "no such room",
        Err(_) => "relay actor is gone",
    }
}

#[derive(Deserialize)]
struct BroadcastBody {
    message: String,
}

async fn broadcast_handler(State(state): State<AdminState>, Json(body): Json<BroadcastBody>) -> impl IntoResponse {
    let (reply, rx) = oneshot::channel();
    dispatch(&state, AdminCommand::BroadcastText { message: body.message, reply }).await;
    match rx.await {
        Ok(count) => format!("delivered to {count} hosts"),
        Err(_) => "relay actor is gone".to_string(),
    }
}

#[derive(Deserialize)]
struct BlacklistBody {
    addresses: Vec<IpAddr>,
}

async fn blacklist_handler(State(state): State<AdminState>, Json(body): Json<BlacklistBody>) -> impl IntoResponse {
    let (reply, rx) = oneshot::channel();
    dispatch(&state, AdminCommand::SetBlacklist { addresses: body.addresses, reply }).await;
    let _ = rx.await;
    "blacklist updated"
}

#[derive(Deserialize)]
struct SpamLimitBody {
    packets_per_3s: u32,
}

async fn spam_limit_handler(State(state): State<AdminState>, Json(body): Json<SpamLimitBody>) -> impl IntoResponse {
    let (reply, rx) = oneshot::channel();
    dispatch(&state, AdminCommand::SetSpamLimit { packets_per_3s: body.packets_per_3s, reply }).await;
    let _ = rx.await;
    "spam limit updated for new connections"
}

#[derive(Deserialize)]
struct RefreshRoomBody {
    short_id: String,
}

async fn refresh_room_handler(State(state): State<AdminState>, Json(body): Json<RefreshRoomBody>) -> impl IntoResponse {
    let (reply, rx) = oneshot::channel();
    dispatch(&state, AdminCommand::RefreshRoomState { short_id: body.short_id, reply }).await;
    match rx.await {
        Ok(true) => "refresh requested",
        Ok(false) => "no such room",
        Err(_) => "relay actor is gone",
    }
}

#[derive(Deserialize)]
struct RefreshTypeBody {
    game_type: String,
}

async fn refresh_type_handler(State(state): State<AdminState>, Json(body): Json<RefreshTypeBody>) -> impl IntoResponse {
    let (reply, rx) = oneshot::channel();
    dispatch(&state, AdminCommand::RefreshTypeList { game_type: GameType::new(&body.game_type), reply }).await;
    let _ = rx.await;
    "type list refresh requested"
}

#[derive(Deserialize)]
struct DebugLoggingBody {
    enabled: bool,
}

async fn debug_logging_handler(State(state): State<AdminState>, Json(body): Json<DebugLoggingBody>) -> impl IntoResponse {
    let (reply, rx) = oneshot::channel();
    dispatch(&state, AdminCommand::SetDebugLogging { enabled: body.enabled, reply }).await;
    let _ = rx.await;
    "debug logging updated"
}

async fn shutdown_handler(State(state): State<AdminState>) -> impl IntoResponse {
    let (reply, rx) = oneshot::channel();
    dispatch(&state, AdminCommand::Shutdown { reply }).await;
    let _ = rx.await;
    "shutdown grace period started"
}
