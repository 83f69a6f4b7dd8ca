//! Connection plumbing: binds the listener, upgrades `/ws`, and runs one
//! pair of send/receive tasks per socket. The receive side forwards raw
//! frames into the session task's mailbox; the send side drains the
//! connection's outbound channel. Neither side interprets frames.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use protocol::CHANNEL_BUFFER_SIZE;
use session_lib::{CardTablePack, GameSessionState, PackRegistry, RedbStore, SessionStore};

use crate::config::ServerConfig;
use crate::session_task::{SessionCommand, SessionTask};

/// Startup failures.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
}

struct AppState {
    commands: mpsc::Sender<SessionCommand>,
    next_conn_id: AtomicU64,
}

/// The server before it is bound: configuration plus injected
/// collaborators, so tests can pin seeds and swap the store.
pub struct GameServer {
    config: ServerConfig,
    registry: PackRegistry,
    store: Option<Arc<dyn SessionStore>>,
}

impl GameServer {
    pub fn new(
        config: ServerConfig,
        registry: PackRegistry,
        store: Option<Arc<dyn SessionStore>>,
    ) -> Self {
        Self {
            config,
            registry,
            store,
        }
    }

    /// Builds the registry and store the configuration asks for: the
    /// reference card pack with the configured deal, and a redb store when a
    /// path is given.
    pub fn with_defaults(config: ServerConfig) -> Result<Self, ServerError> {
        let pack = CardTablePack {
            hand_size: config.hand_size,
            max_rounds: config.max_rounds,
            seed: config.deck_seed,
        };
        let registry = PackRegistry::new(Arc::new(pack));
        let store: Option<Arc<dyn SessionStore>> = match &config.store_path {
            Some(path) => {
                let store = RedbStore::open(path)
                    .map_err(|e| ServerError::Config(format!("cannot open store: {e}")))?;
                Some(Arc::new(store))
            }
            None => None,
        };
        Ok(Self::new(config, registry, store))
    }

    /// Binds the listener and spawns the session task and the accept loop.
    /// Port 0 picks an ephemeral port; the handle knows the real one.
    pub async fn bind(self) -> Result<ServerHandle, ServerError> {
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let local_addr = listener.local_addr()?;

        let session_id = Uuid::new_v4().to_string();
        let (commands, command_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let task = SessionTask::new(
            session_id.as_str(),
            self.registry,
            self.store,
            self.config.max_players,
        );
        let session_task = tokio::spawn(task.run(command_rx));

        let state = Arc::new(AppState {
            commands: commands.clone(),
            next_conn_id: AtomicU64::new(1),
        });
        let app = Router::new()
            .route(protocol::WS_PATH, get(websocket_handler))
            .with_state(state);

        let serve_task = tokio::spawn(async move {
            if let Err(error) = axum::serve(listener, app).await {
                tracing::error!(%error, "Server loop ended.");
            }
        });

        tracing::info!(
            %local_addr,
            session_id = %session_id,
            service = protocol::SERVICE_TYPE,
            "Listening; publish this port for discovery."
        );

        Ok(ServerHandle {
            local_addr,
            session_id,
            commands,
            serve_task,
            session_task,
        })
    }
}

/// Handle to a running server. The port is queryable for the external mDNS
/// registrar, and the board-side process triggers game start through here.
pub struct ServerHandle {
    local_addr: SocketAddr,
    session_id: String,
    commands: mpsc::Sender<SessionCommand>,
    serve_task: JoinHandle<()>,
    session_task: JoinHandle<()>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The bound port, for the discovery registrar.
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Starts a game with the given pack (the default pack when `None`).
    pub async fn start_game(&self, pack_id: Option<String>) {
        let _ = self
            .commands
            .send(SessionCommand::StartGame { pack_id })
            .await;
    }

    /// The current authoritative snapshot, mainly for tests and the board
    /// UI.
    pub async fn snapshot(&self) -> Option<GameSessionState> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(SessionCommand::Snapshot { reply })
            .await
            .ok()?;
        rx.await.ok()
    }

    /// Runs until the accept loop dies.
    pub async fn join(self) {
        let _ = self.serve_task.await;
        let _ = self.session_task.await;
    }

    /// Stops accepting, stops the session task.
    pub async fn shutdown(self) {
        let _ = self.commands.send(SessionCommand::Shutdown).await;
        self.serve_task.abort();
        let _ = self.session_task.await;
    }
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| websocket(socket, state))
}

/// Runs one connection: registers its outbound channel with the session
/// task, pumps frames both ways, and reports the close so orphan cleanup
/// can run.
async fn websocket(stream: WebSocket, state: Arc<AppState>) {
    let conn_id = state.next_conn_id.fetch_add(1, Ordering::Relaxed);
    let (outbound_tx, outbound_rx) = mpsc::channel::<String>(CHANNEL_BUFFER_SIZE);

    if state
        .commands
        .send(SessionCommand::Connected {
            conn_id,
            sink: outbound_tx,
        })
        .await
        .is_err()
    {
        return;
    }
    tracing::debug!(conn_id, "Connection attached.");

    let (mut sender, mut receiver) = stream.split();

    let mut send_task = tokio::spawn(async move {
        let mut outbound_rx = outbound_rx;
        while let Some(frame) = outbound_rx.recv().await {
            if sender.send(WsMessage::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    let command_tx = state.commands.clone();
    let mut receive_task = tokio::spawn(async move {
        while let Some(message) = receiver.next().await {
            match message {
                Ok(WsMessage::Text(text)) => {
                    if command_tx
                        .send(SessionCommand::Frame { conn_id, text })
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Ok(WsMessage::Close(_)) | Err(_) => break,
                // Socket-level ping/pong is handled by the transport; the
                // application heartbeat is a JSON frame.
                Ok(_) => {}
            }
        }
    });

    // If any one of the tasks runs to completion, we abort the other.
    tokio::select! {
        _ = &mut send_task => { receive_task.abort(); }
        _ = &mut receive_task => { send_task.abort(); }
    }

    let _ = state.commands.send(SessionCommand::Closed { conn_id }).await;
    tracing::debug!(conn_id, "Connection detached.");
}
