//! End-to-end duel flows over real WebSocket connections.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use duel_relay::game::events::RoundResult;
use duel_relay::ledger::LedgerError;
use duel_relay::{
    ClientMessage, GameServer, LedgerEntry, MemoryLedger, PlayerId, ScoreLedger, ServerConfig,
    ServerMessage, MAX_HEALTH,
};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let (ws, _) = connect_async(format!("ws://{}/", addr)).await.unwrap();
        Self { ws }
    }

    async fn send(&mut self, msg: ClientMessage) {
        self.ws.send(Message::Text(msg.to_json().unwrap())).await.unwrap();
    }

    async fn send_raw(&mut self, text: &str) {
        self.ws.send(Message::Text(text.to_string())).await.unwrap();
    }

    async fn recv(&mut self) -> ServerMessage {
        loop {
            let frame = tokio::time::timeout(RECV_TIMEOUT, self.ws.next())
                .await
                .expect("timed out waiting for server message")
                .expect("connection closed")
                .unwrap();
            if let Message::Text(text) = frame {
                return ServerMessage::from_json(&text).unwrap();
            }
        }
    }

    async fn join(&mut self, name: &str) {
        self.send(ClientMessage::JoinRequest { display_name: name.to_string() }).await;
    }

    async fn close(mut self) {
        self.ws.close(None).await.unwrap();
    }

    /// Read until the server drops the connection, returning every text message seen.
    async fn drain(mut self) -> Vec<ServerMessage> {
        let mut seen = Vec::new();
        loop {
            match tokio::time::timeout(RECV_TIMEOUT, self.ws.next()).await {
                Ok(Some(Ok(Message::Text(text)))) => seen.push(ServerMessage::from_json(&text).unwrap()),
                Ok(Some(Ok(Message::Close(_)))) | Ok(Some(Err(_))) | Ok(None) => return seen,
                Ok(Some(Ok(_))) => {}
                Err(_) => panic!("server kept the connection open"),
            }
        }
    }
}

/// Ledger whose store is never reachable.
struct UnreachableLedger;

impl ScoreLedger for UnreachableLedger {
    fn increment(&self, _name: &str, _amount: u64) -> Result<u64, LedgerError> {
        Err(LedgerError::Unavailable("store offline".to_string()))
    }

    fn read_all(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(Vec::new())
    }
}

async fn start_server(ledger: Arc<dyn ScoreLedger>) -> (Arc<GameServer>, SocketAddr) {
    start_server_with(ServerConfig::default(), ledger).await
}

async fn start_server_with(
    config: ServerConfig,
    ledger: Arc<dyn ScoreLedger>,
) -> (Arc<GameServer>, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::new(GameServer::new(config, ledger));
    let running = server.clone();
    tokio::spawn(async move { running.serve(listener).await });
    (server, addr)
}

async fn eventually<F: Fn() -> bool>(check: F) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached in time");
}

fn score_of(ledger: &MemoryLedger, name: &str) -> Option<u64> {
    ledger
        .read_all()
        .unwrap()
        .into_iter()
        .find(|e| e.name == name)
        .map(|e| e.score)
}

/// Connect two clients, skip their leaderboards, pair them, and return both
/// along with each side's view of the opponent's identity.
async fn paired(addr: SocketAddr) -> (TestClient, TestClient, PlayerId, PlayerId) {
    let mut a = TestClient::connect(addr).await;
    let mut b = TestClient::connect(addr).await;
    a.recv().await;
    b.recv().await;

    a.join("alpha").await;
    assert_eq!(a.recv().await, ServerMessage::Queued);
    b.join("bravo").await;
    assert_eq!(b.recv().await, ServerMessage::Queued);

    let b_id = match a.recv().await {
        ServerMessage::Paired { opponent_id, opponent_name, spawn_point } => {
            assert_eq!(opponent_name, "bravo");
            assert_eq!((spawn_point.x, spawn_point.y), (100.0, 100.0));
            opponent_id
        }
        other => panic!("expected paired, got {:?}", other),
    };
    let a_id = match b.recv().await {
        ServerMessage::Paired { opponent_id, opponent_name, spawn_point } => {
            assert_eq!(opponent_name, "alpha");
            assert_eq!((spawn_point.x, spawn_point.y), (1720.0, 780.0));
            opponent_id
        }
        other => panic!("expected paired, got {:?}", other),
    };
    (a, b, a_id, b_id)
}

#[tokio::test]
async fn test_leaderboard_sent_on_connect() {
    let ledger = Arc::new(MemoryLedger::with_entries(vec![
        LedgerEntry { name: "low".to_string(), score: 1 },
        LedgerEntry { name: "high".to_string(), score: 50 },
    ]));
    let (_server, addr) = start_server(ledger).await;

    let mut client = TestClient::connect(addr).await;
    assert_eq!(
        client.recv().await,
        ServerMessage::LeaderboardSnapshot {
            entries: vec![
                LedgerEntry { name: "high".to_string(), score: 50 },
                LedgerEntry { name: "low".to_string(), score: 1 },
            ],
        }
    );
}

#[tokio::test]
async fn test_moves_are_relayed_with_sender_identity() {
    let (_server, addr) = start_server(Arc::new(MemoryLedger::new())).await;
    let (mut a, mut b, a_id, _b_id) = paired(addr).await;

    a.send(ClientMessage::MoveReport { x: 310.0, y: 220.0 }).await;
    assert_eq!(b.recv().await, ServerMessage::OpponentMoved { id: a_id, x: 310.0, y: 220.0 });

    a.send(ClientMessage::ReloadReport).await;
    assert_eq!(b.recv().await, ServerMessage::OpponentReloaded);
}

#[tokio::test]
async fn test_lethal_hit_scenario() {
    let ledger = Arc::new(MemoryLedger::new());
    let (server, addr) = start_server(ledger.clone()).await;
    let (mut a, mut b, _a_id, _b_id) = paired(addr).await;

    a.send(ClientMessage::HitClaim { damage: 130 }).await;

    assert_eq!(b.recv().await, ServerMessage::YouWereHit { damage: 130 });
    assert_eq!(a.recv().await, ServerMessage::OpponentHealth { health: 0 });
    assert_eq!(a.recv().await, ServerMessage::MatchEnded { result: RoundResult::Win });
    assert_eq!(b.recv().await, ServerMessage::MatchEnded { result: RoundResult::Lose });

    eventually(|| score_of(&ledger, "alpha") == Some(10)).await;
    assert_eq!(score_of(&ledger, "bravo"), None);
    assert_eq!(server.session_count().await, 2);

    // Fresh round: a small hit now reports from full health
    b.send(ClientMessage::HitClaim { damage: 20 }).await;
    assert_eq!(a.recv().await, ServerMessage::YouWereHit { damage: 20 });
    assert_eq!(b.recv().await, ServerMessage::OpponentHealth { health: MAX_HEALTH - 20 });
}

#[tokio::test]
async fn test_disconnect_forfeits_to_opponent() {
    let ledger = Arc::new(MemoryLedger::new());
    let (server, addr) = start_server(ledger.clone()).await;
    let (a, mut b, _a_id, _b_id) = paired(addr).await;

    a.close().await;
    assert_eq!(b.recv().await, ServerMessage::OpponentForfeited);
    eventually(|| score_of(&ledger, "bravo") == Some(5)).await;

    // Linkless now: relays are ignored, but a new join works
    b.send(ClientMessage::MoveReport { x: 1.0, y: 1.0 }).await;
    b.join("bravo").await;
    assert_eq!(b.recv().await, ServerMessage::Queued);
    assert_eq!(server.queue_size().await, 1);
}

#[tokio::test]
async fn test_queued_disconnect_leaves_queue() {
    let (server, addr) = start_server(Arc::new(MemoryLedger::new())).await;
    let mut c = TestClient::connect(addr).await;
    c.recv().await;
    c.join("charlie").await;
    assert_eq!(c.recv().await, ServerMessage::Queued);
    assert_eq!(server.queue_size().await, 1);

    c.close().await;
    for _ in 0..100 {
        if server.queue_size().await == 0 && server.connection_count().await == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("queued participant was not removed");
}

#[tokio::test]
async fn test_malformed_and_out_of_state_events_are_ignored() {
    let (_server, addr) = start_server(Arc::new(MemoryLedger::new())).await;
    let mut client = TestClient::connect(addr).await;
    client.recv().await;

    client.send_raw("definitely not json").await;
    client.send_raw(r#"{"type":"hit-claim","damage":-3}"#).await;
    client.send(ClientMessage::HitClaim { damage: 10 }).await;
    client.send(ClientMessage::ResetRequest).await;
    client.send(ClientMessage::HeartbeatPing).await;

    match client.recv().await {
        ServerMessage::HeartbeatPong { server_time, .. } => assert!(server_time > 0),
        other => panic!("expected pong, got {:?}", other),
    }
}

#[tokio::test]
async fn test_reset_acknowledged_at_full_health() {
    let (_server, addr) = start_server(Arc::new(MemoryLedger::new())).await;
    let (mut a, _b, _a_id, _b_id) = paired(addr).await;

    a.send(ClientMessage::ResetRequest).await;
    assert_eq!(a.recv().await, ServerMessage::ResetAcknowledged);
}

#[tokio::test]
async fn test_result_page_served_on_same_port() {
    let (_server, addr) = start_server(Arc::new(MemoryLedger::new())).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /gameover/lost HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 200 OK"));
    assert!(response.contains("You lost"));
}

#[tokio::test]
async fn test_failing_ledger_does_not_block_round_end() {
    let (_server, addr) = start_server(Arc::new(UnreachableLedger)).await;
    let (mut a, mut b, _a_id, _b_id) = paired(addr).await;

    a.send(ClientMessage::HitClaim { damage: 130 }).await;
    assert_eq!(b.recv().await, ServerMessage::YouWereHit { damage: 130 });
    assert_eq!(a.recv().await, ServerMessage::OpponentHealth { health: 0 });
    assert_eq!(a.recv().await, ServerMessage::MatchEnded { result: RoundResult::Win });
    assert_eq!(b.recv().await, ServerMessage::MatchEnded { result: RoundResult::Lose });

    // The pair keeps playing after the failed credit
    b.send(ClientMessage::HitClaim { damage: 5 }).await;
    assert_eq!(a.recv().await, ServerMessage::YouWereHit { damage: 5 });
}

#[tokio::test]
async fn test_connection_limit_holds_under_burst() {
    let config = ServerConfig { max_connections: 2, ..Default::default() };
    let (server, addr) = start_server_with(config, Arc::new(MemoryLedger::new())).await;

    let url = format!("ws://{}/", addr);
    let attempts = join_all((0..6).map(|_| connect_async(url.clone()))).await;
    let admitted: Vec<_> = attempts.into_iter().filter_map(Result::ok).collect();

    assert_eq!(admitted.len(), 2);
    assert!(server.connection_count().await <= 2);

    // Slots free up once admitted clients leave
    drop(admitted);
    for _ in 0..100 {
        if let Ok((ws, _)) = connect_async(url.clone()).await {
            let mut late = TestClient { ws };
            assert!(matches!(late.recv().await, ServerMessage::LeaderboardSnapshot { .. }));
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("no slot was released");
}

#[tokio::test]
async fn test_shutdown_pays_no_forfeit() {
    let ledger = Arc::new(MemoryLedger::new());
    let (server, addr) = start_server(ledger.clone()).await;
    let (a, b, _a_id, _b_id) = paired(addr).await;

    server.shutdown();
    let (seen_a, seen_b) = tokio::join!(a.drain(), b.drain());

    assert!(!seen_a.contains(&ServerMessage::OpponentForfeited));
    assert!(!seen_b.contains(&ServerMessage::OpponentForfeited));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(ledger.read_all().unwrap().is_empty());
}

#[tokio::test]
async fn test_server_probe_rtt_reported_in_pong() {
    let config = ServerConfig {
        heartbeat_interval: Duration::from_millis(50),
        ..Default::default()
    };
    let (_server, addr) = start_server_with(config, Arc::new(MemoryLedger::new())).await;
    let mut client = TestClient::connect(addr).await;
    client.recv().await;

    // Reading frames answers the server's pings
    for _ in 0..50 {
        client.send(ClientMessage::HeartbeatPing).await;
        match client.recv().await {
            ServerMessage::HeartbeatPong { rtt_ms: Some(rtt), .. } => {
                assert!(rtt < RECV_TIMEOUT.as_millis() as u64);
                return;
            }
            ServerMessage::HeartbeatPong { rtt_ms: None, .. } => {
                tokio::time::sleep(Duration::from_millis(60)).await;
            }
            other => panic!("expected pong, got {:?}", other),
        }
    }
    panic!("no probe round trip was recorded");
}
