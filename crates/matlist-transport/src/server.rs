//! WebSocket transport server using Axum.
//!
//! Handles HTTP upgrade to WebSocket, inbound frame parsing, the per-connection
//! outbound pump, and connect/disconnect notification to the session handler.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use matlist_protocol::ClientEvent;
use serde_json::json;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::groups::GroupRegistry;

/// Trait implemented by the session core to receive transport callbacks.
///
/// All three methods are synchronous: session operations never touch disk or
/// network, so the socket task calls them inline between frames. Replies and
/// fan-out flow back through the [`crate::EventSink`] the handler was
/// constructed with, never through return values.
pub trait SessionHandler: Send + Sync + 'static {
    /// A connection finished the upgrade and can receive events.
    fn on_connect(&self, conn_id: &str);

    /// A parsed client event arrived on the connection.
    fn on_event(&self, conn_id: &str, event: ClientEvent);

    /// The connection is gone (close frame, error, or vanished peer).
    fn on_disconnect(&self, conn_id: &str);
}

/// Transport server configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Port to listen on (0 for OS-assigned)
    pub port: u16,
    /// Hostname to bind to
    pub hostname: String,
    /// Allow any origin (browsers are served from other hosts in production)
    pub enable_cors: bool,
    /// Maximum concurrent connections
    pub max_connections: Option<usize>,
    /// Enable verbose connection logging
    pub verbose_logging: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            hostname: "0.0.0.0".into(),
            enable_cors: false,
            max_connections: Some(64),
            verbose_logging: false,
        }
    }
}

/// Shared state for the transport server.
struct AppState<H: SessionHandler> {
    handler: Arc<H>,
    groups: Arc<GroupRegistry>,
    config: TransportConfig,
}

/// The transport server — owns the listener task and the shutdown signal.
pub struct TransportServer {
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
    port: u16,
}

impl TransportServer {
    /// Start the transport server.
    ///
    /// `api_routes` is merged into the router so the binary can serve the
    /// file-catalog API on the same listener; pass `Router::new()` when no
    /// extra surface is wanted.
    pub async fn start<H: SessionHandler>(
        config: TransportConfig,
        handler: Arc<H>,
        groups: Arc<GroupRegistry>,
        api_routes: Router,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

        let enable_cors = config.enable_cors;
        let state = Arc::new(AppState {
            handler,
            groups,
            config,
        });

        let mut app = Router::new()
            .route("/ws", get(ws_upgrade_handler::<H>))
            .route("/health", get(health_handler::<H>))
            .with_state(state.clone())
            .merge(api_routes);
        if enable_cors {
            app = app.layer(CorsLayer::permissive());
        }

        let addr: SocketAddr = format!("{}:{}", state.config.hostname, state.config.port).parse()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let actual_port = listener.local_addr()?.port();

        info!(
            "MatList transport listening on ws://{}:{}/ws",
            state.config.hostname, actual_port
        );

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await
                .ok();
        });

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
            port: actual_port,
        })
    }

    /// Get the actual bound port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Gracefully stop the server.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        info!("MatList transport server stopped");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn ws_upgrade_handler<H: SessionHandler>(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState<H>>>,
) -> impl IntoResponse {
    if let Some(max) = state.config.max_connections {
        let current = state.groups.connection_count();
        if current >= max {
            warn!("Connection rejected: max connections reached ({max})");
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    }

    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
        .into_response()
}

async fn health_handler<H: SessionHandler>(
    State(state): State<Arc<AppState<H>>>,
) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "clients": state.groups.connection_count(),
    }))
}

// ─────────────────────────────────────────────────────────────────────────────
// WebSocket Connection Handler
// ─────────────────────────────────────────────────────────────────────────────

async fn handle_ws_connection<H: SessionHandler>(socket: WebSocket, state: Arc<AppState<H>>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    info!("Client connected: {conn_id}");

    let (mut ws_tx, mut ws_rx) = socket.split();

    // The outbox must exist before the handler can acknowledge the connect.
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    state.groups.register(&conn_id, out_tx);
    state.handler.on_connect(&conn_id);

    loop {
        tokio::select! {
            // Incoming WebSocket message
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        dispatch_frame(&text, &conn_id, &state);
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_tx.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Client closed: {conn_id}");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error for {conn_id}: {e}");
                        break;
                    }
                    _ => {}
                }
            }

            // Outbound events queued for this connection
            frame = out_rx.recv() => {
                match frame {
                    Some(frame) => {
                        if let Err(e) = ws_tx.send(Message::Text(frame.into())).await {
                            warn!("Failed to send to {conn_id}: {e}");
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    // Session cleanup first so leave notifications still reach the group,
    // then drop the outbox.
    state.handler.on_disconnect(&conn_id);
    state.groups.unregister(&conn_id);
    info!(
        "Client disconnected: {conn_id} (total: {})",
        state.groups.connection_count()
    );
}

fn dispatch_frame<H: SessionHandler>(text: &str, conn_id: &str, state: &Arc<AppState<H>>) {
    match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => {
            if state.config.verbose_logging {
                debug!("Event from {conn_id}: {event:?}");
            }
            state.handler.on_event(conn_id, event);
        }
        // Malformed payloads are dropped without a reply on the wire.
        Err(e) => warn!("Dropping malformed message from {conn_id}: {e}"),
    }
}
