//! WebSocket Duel Server
//!
//! Async WebSocket server for duel connections.
//! Handles admission, routing of client events into the session engine,
//! delivery of the resulting notices, and ledger credits.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::interval;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use crate::game::engine::{EngineError, SessionEngine};
use crate::game::events::{LedgerCredit, Outcome};
use crate::game::rules::{DuelRules, TrustPolicy};
use crate::game::state::PlayerId;
use crate::ledger::{leaderboard, FileLedger, LedgerError, MemoryLedger, ScoreLedger};
use crate::network::pages::{self, Route};
use crate::network::protocol::{ClientMessage, ServerMessage};
use crate::network::registry::ConnectionRegistry;

/// Outbound queue depth per connection.
const OUTBOUND_QUEUE: usize = 256;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Time allowed for the request head and WebSocket handshake.
    pub handshake_timeout: Duration,
    /// Interval between server latency probes.
    pub heartbeat_interval: Duration,
    /// Entries in the leaderboard snapshot sent on connect.
    pub leaderboard_size: usize,
    /// Ledger file; `None` keeps scores in memory.
    pub ledger_path: Option<PathBuf>,
    /// Duel rules.
    pub rules: DuelRules,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            max_connections: 1000,
            handshake_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(5),
            leaderboard_size: 10,
            ledger_path: None,
            rules: DuelRules::default(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let rules = DuelRules {
            max_health: env_or("DUEL_MAX_HEALTH", defaults.rules.max_health),
            win_reward: env_or("DUEL_WIN_REWARD", defaults.rules.win_reward),
            forfeit_reward: env_or("DUEL_FORFEIT_REWARD", defaults.rules.forfeit_reward),
            trust: match std::env::var("DUEL_TRUST_POLICY") {
                Ok(raw) => TrustPolicy::parse(&raw).unwrap_or_else(|| {
                    warn!("Ignoring DUEL_TRUST_POLICY={:?}, using {:?}", raw, defaults.rules.trust);
                    defaults.rules.trust
                }),
                Err(_) => defaults.rules.trust,
            },
            ..defaults.rules.clone()
        };

        Self {
            bind_addr: env_or("DUEL_BIND_ADDR", defaults.bind_addr),
            max_connections: env_or("DUEL_MAX_CONNECTIONS", defaults.max_connections),
            heartbeat_interval: Duration::from_secs(env_or(
                "DUEL_HEARTBEAT_SECS",
                defaults.heartbeat_interval.as_secs(),
            )),
            leaderboard_size: env_or("DUEL_LEADERBOARD_SIZE", defaults.leaderboard_size),
            ledger_path: std::env::var("DUEL_LEDGER_PATH").ok().map(PathBuf::from),
            rules,
            ..defaults
        }
    }
}

/// Parse `key` from the environment, keeping `default` when unset or invalid.
fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring {}={:?}, using {:?}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Score ledger could not be opened.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Engine and registry behind one lock: every state mutation and the
/// queuing of its notices happen in a single critical section.
#[derive(Debug)]
struct Arena {
    engine: SessionEngine,
    registry: ConnectionRegistry,
}

impl Arena {
    /// Queue an outcome's notices in commit order and hand back its credits.
    fn deliver(&self, outcome: Outcome) -> Vec<LedgerCredit> {
        for dispatch in outcome.dispatches {
            self.registry.deliver(&dispatch.to, dispatch.notice.into());
        }
        outcome.credits
    }
}

/// Handles shared by every connection task.
#[derive(Clone)]
struct Shared {
    arena: Arc<Mutex<Arena>>,
    ledger: Arc<dyn ScoreLedger>,
    /// One permit per admitted connection, held from accept until its task ends.
    admission: Arc<Semaphore>,
    config: ServerConfig,
}

/// The duel server.
pub struct GameServer {
    /// Shared state.
    shared: Shared,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new server crediting scores to `ledger`.
    pub fn new(config: ServerConfig, ledger: Arc<dyn ScoreLedger>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let arena = Arena {
            engine: SessionEngine::new(config.rules.clone()),
            registry: ConnectionRegistry::new(),
        };

        Self {
            shared: Shared {
                arena: Arc::new(Mutex::new(arena)),
                ledger,
                admission: Arc::new(Semaphore::new(config.max_connections)),
                config,
            },
            shutdown_tx,
        }
    }

    /// Create a server with the ledger named by the config.
    pub fn from_config(config: ServerConfig) -> Result<Self, GameServerError> {
        let ledger: Arc<dyn ScoreLedger> = match &config.ledger_path {
            Some(path) => {
                let ledger = FileLedger::open(path)?;
                info!("Scores persisted to {}", ledger.path().display());
                Arc::new(ledger)
            }
            None => {
                info!("No ledger path configured, scores kept in memory");
                Arc::new(MemoryLedger::new())
            }
        };
        Ok(Self::new(config, ledger))
    }

    /// Bind the configured address and run.
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.shared.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Accept connections on `listener` until shutdown.
    #[instrument(skip_all, fields(addr = ?listener.local_addr().ok()))]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        info!("Duel server v{} listening", self.shared.config.version);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let Ok(permit) = self.shared.admission.clone().try_acquire_owned() else {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            };

                            debug!("New connection from {}", addr);
                            self.handle_connection(stream, addr, permit);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Handle a new TCP connection: result page or WebSocket session.
    ///
    /// `permit` is released when the task ends, however it ends.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr, permit: OwnedSemaphorePermit) {
        let shared = self.shared.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let _permit = permit;
            let timeout = shared.config.handshake_timeout;

            let route = match tokio::time::timeout(timeout, pages::classify(&stream)).await {
                Ok(Ok(route)) => route,
                Ok(Err(e)) => {
                    debug!("Could not read request from {}: {}", addr, e);
                    return;
                }
                Err(_) => {
                    debug!("Request head from {} timed out", addr);
                    return;
                }
            };

            if route != Route::WebSocket {
                if let Err(e) = pages::serve(stream, route).await {
                    debug!("Failed to serve page to {}: {}", addr, e);
                }
                return;
            }

            let ws_stream = match tokio::time::timeout(timeout, accept_async(stream)).await {
                Ok(Ok(ws)) => ws,
                Ok(Err(e)) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
                Err(_) => {
                    warn!("WebSocket handshake timed out for {}", addr);
                    return;
                }
            };

            Self::run_connection(ws_stream, addr, shared, shutdown_rx).await;
        });
    }

    /// Drive one WebSocket connection from registration to cleanup.
    async fn run_connection(
        ws_stream: tokio_tungstenite::WebSocketStream<TcpStream>,
        addr: SocketAddr,
        shared: Shared,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let id = PlayerId::generate();
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_QUEUE);

        // Register client
        {
            let mut arena = shared.arena.lock().await;
            arena.registry.register(id, addr, msg_tx.clone());
        }
        info!("Participant {} connected from {}", id.short(), addr);

        // Spawn message sender task; it also emits latency probes
        let heartbeat_interval = shared.config.heartbeat_interval;
        let sender_task = tokio::spawn(async move {
            let mut probe = interval(heartbeat_interval);
            probe.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    msg = msg_rx.recv() => {
                        let Some(msg) = msg else { break };
                        let text = match msg.to_json() {
                            Ok(t) => t,
                            Err(e) => {
                                error!("Failed to serialize message: {}", e);
                                continue;
                            }
                        };
                        if ws_sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    _ = probe.tick() => {
                        let sent_at = chrono::Utc::now().timestamp_millis();
                        let payload = sent_at.to_be_bytes().to_vec();
                        if ws_sender.send(Message::Ping(payload)).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Self::send_leaderboard(&shared, &msg_tx).await;

        // Handle incoming messages
        let mut server_closing = false;
        loop {
            tokio::select! {
                msg = ws_receiver.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            match ClientMessage::from_json(&text) {
                                Ok(client_msg) => {
                                    Self::handle_client_message(id, client_msg, &shared).await;
                                }
                                Err(e) => {
                                    debug!("Invalid message from {}: {}", id.short(), e);
                                    shared.arena.lock().await.registry.record_rejection(&id);
                                }
                            }
                        }
                        Some(Ok(Message::Pong(payload))) => {
                            if let Ok(bytes) = <[u8; 8]>::try_from(payload.as_slice()) {
                                let sent_at = i64::from_be_bytes(bytes);
                                let elapsed = chrono::Utc::now().timestamp_millis() - sent_at;
                                let rtt = Duration::from_millis(elapsed.max(0) as u64);
                                shared.arena.lock().await.registry.record_rtt(&id, rtt);
                            }
                        }
                        Some(Ok(Message::Binary(_))) => {
                            debug!("Ignoring binary frame from {}", id.short());
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            debug!("Participant {} closed the connection", id.short());
                            break;
                        }
                        Some(Err(e)) => {
                            warn!("WebSocket error for {}: {}", id.short(), e);
                            break;
                        }
                        _ => {}
                    }
                }
                _ = shutdown_rx.recv() => {
                    server_closing = true;
                    break;
                }
            }
        }

        // Cleanup
        sender_task.abort();

        let credits = {
            let mut arena = shared.arena.lock().await;
            arena.registry.unregister(&id);
            let credits = if server_closing {
                // Nobody left, so nobody forfeits
                arena.engine.evict(id);
                Vec::new()
            } else {
                let outcome = arena.engine.disconnect(id);
                arena.deliver(outcome)
            };
            if arena.engine.sessions().is_empty() && arena.engine.queue().is_empty() {
                debug!("No participants waiting or in a match");
            }
            credits
        };
        Self::apply_credits(&shared.ledger, credits).await;

        info!("Participant {} cleaned up", id.short());
    }

    /// Route a decoded client message through the engine.
    async fn handle_client_message(id: PlayerId, msg: ClientMessage, shared: &Shared) {
        let result = {
            let mut arena = shared.arena.lock().await;
            let Arena { engine, registry } = &mut *arena;
            let result: Result<Outcome, EngineError> = match msg {
                ClientMessage::HeartbeatPing => {
                    registry.record_heartbeat(&id);
                    let rtt = registry.get(&id).and_then(|entry| entry.rtt);
                    registry.deliver(&id, ServerMessage::pong_now(rtt));
                    return;
                }
                ClientMessage::JoinRequest { display_name } => engine.join(id, &display_name),
                ClientMessage::MoveReport { x, y } => engine.relay_move(id, x, y),
                ClientMessage::ShootReport(shot) => engine.relay_shot(id, shot),
                ClientMessage::ReloadReport => engine.relay_reload(id),
                ClientMessage::HitClaim { damage } => engine.claim_hit(id, damage),
                ClientMessage::HealClaim { amount } => engine.claim_heal(id, amount),
                ClientMessage::ResetRequest => engine.reset(id),
                ClientMessage::ForfeitGift { display_name, points } => {
                    engine.gift(id, &display_name, points)
                }
            };

            match result {
                Ok(outcome) => Ok(arena.deliver(outcome)),
                Err(e) => {
                    arena.registry.record_rejection(&id);
                    Err(e)
                }
            }
        };

        match result {
            Ok(credits) => Self::apply_credits(&shared.ledger, credits).await,
            Err(e) => debug!("Ignored event from {}: {}", id.short(), e),
        }
    }

    /// Send the leaderboard snapshot to a freshly connected participant.
    async fn send_leaderboard(shared: &Shared, sender: &mpsc::Sender<ServerMessage>) {
        let ledger = shared.ledger.clone();
        let limit = shared.config.leaderboard_size;

        match tokio::task::spawn_blocking(move || ledger.read_all()).await {
            Ok(Ok(entries)) => {
                let entries = leaderboard(entries, limit);
                let _ = sender.send(ServerMessage::LeaderboardSnapshot { entries }).await;
            }
            Ok(Err(e)) => warn!("Leaderboard unavailable: {}", e),
            Err(e) => error!("Leaderboard task failed: {}", e),
        }
    }

    /// Apply ledger credits. Failures are logged and otherwise ignored.
    async fn apply_credits(ledger: &Arc<dyn ScoreLedger>, credits: Vec<LedgerCredit>) {
        for credit in credits {
            let ledger = ledger.clone();
            let LedgerCredit { name, amount, reason } = credit;
            let task_name = name.clone();

            match tokio::task::spawn_blocking(move || ledger.increment(&task_name, amount)).await {
                Ok(Ok(total)) => info!("Credited {} to {} ({:?}), total {}", amount, name, reason, total),
                Ok(Err(e)) => warn!("Ledger credit of {} to {} failed: {}", amount, name, e),
                Err(e) => error!("Ledger task failed: {}", e),
            }
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.shared.arena.lock().await.registry.connection_count()
    }

    /// Get active session count.
    pub async fn session_count(&self) -> usize {
        self.shared.arena.lock().await.engine.sessions().len()
    }

    /// Get matchmaking queue size.
    pub async fn queue_size(&self) -> usize {
        self.shared.arena.lock().await.engine.queue().len()
    }
}
