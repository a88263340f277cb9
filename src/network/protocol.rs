//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Every message is a JSON object tagged by `"type"` with the kebab-case
//! event name; payload fields are camelCase.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::game::events::{Notice, RoundResult, Shot};
use crate::game::rules::SpawnPoint;
use crate::game::state::PlayerId;
use crate::ledger::LedgerEntry;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Enter matchmaking under a display name.
    JoinRequest {
        /// Requested name; trimmed and truncated by the engine.
        display_name: String,
    },

    /// Own position changed.
    MoveReport {
        /// X coordinate.
        x: f64,
        /// Y coordinate.
        y: f64,
    },

    /// Fired a projectile.
    ShootReport(Shot),

    /// Started reloading.
    ReloadReport,

    /// Claims a hit on the opponent.
    HitClaim {
        /// Claimed damage.
        damage: u32,
    },

    /// Claims a heal on self.
    HealClaim {
        /// Claimed heal.
        amount: u32,
    },

    /// Asks for own health to be restored.
    ResetRequest,

    /// Administrative score grant.
    ForfeitGift {
        /// Name to credit.
        display_name: String,
        /// Points to add.
        points: u32,
    },

    /// Latency probe.
    HeartbeatPing,
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Waiting for an opponent.
    Queued,

    /// Matched; where to spawn and who the opponent is.
    Paired {
        /// Opponent's identity.
        opponent_id: PlayerId,
        /// Opponent's display name.
        opponent_name: String,
        /// Where this client spawns.
        spawn_point: SpawnPoint,
    },

    /// Opponent position.
    OpponentMoved {
        /// Opponent's identity.
        id: PlayerId,
        /// X coordinate.
        x: f64,
        /// Y coordinate.
        y: f64,
    },

    /// Opponent projectile.
    OpponentShot {
        /// Muzzle X.
        x: f64,
        /// Muzzle Y.
        y: f64,
        /// Direction in radians.
        angle: f64,
        /// Travel per frame.
        speed: f64,
        /// Projectile radius.
        radius: f64,
        /// Shooter.
        owner: PlayerId,
    },

    /// Opponent is reloading.
    OpponentReloaded,

    /// You took damage.
    YouWereHit {
        /// Damage applied.
        damage: u32,
    },

    /// Opponent's authoritative health.
    OpponentHealth {
        /// Health after the change.
        health: u32,
    },

    /// Round over.
    MatchEnded {
        /// This client's result.
        result: RoundResult,
    },

    /// Opponent left mid-match.
    OpponentForfeited,

    /// Own health restored.
    ResetAcknowledged,

    /// Reply to a heartbeat ping.
    HeartbeatPong {
        /// Server wall clock, ms since the Unix epoch.
        server_time: i64,
        /// Last measured round trip of a server probe, once one has completed.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rtt_ms: Option<u64>,
    },

    /// Top scores, sent once per connection.
    LeaderboardSnapshot {
        /// Highest scores first.
        entries: Vec<LedgerEntry>,
    },
}

impl From<Notice> for ServerMessage {
    fn from(notice: Notice) -> Self {
        match notice {
            Notice::Queued => ServerMessage::Queued,
            Notice::Paired { opponent_id, opponent_name, spawn } => ServerMessage::Paired {
                opponent_id,
                opponent_name: opponent_name.to_string(),
                spawn_point: spawn,
            },
            Notice::OpponentMoved { id, x, y } => ServerMessage::OpponentMoved { id, x, y },
            Notice::OpponentShot { shot, owner } => ServerMessage::OpponentShot {
                x: shot.x,
                y: shot.y,
                angle: shot.angle,
                speed: shot.speed,
                radius: shot.radius,
                owner,
            },
            Notice::OpponentReloaded => ServerMessage::OpponentReloaded,
            Notice::YouWereHit { damage } => ServerMessage::YouWereHit { damage },
            Notice::OpponentHealth { health } => ServerMessage::OpponentHealth { health },
            Notice::MatchEnded { result } => ServerMessage::MatchEnded { result },
            Notice::OpponentForfeited => ServerMessage::OpponentForfeited,
            Notice::ResetAcknowledged => ServerMessage::ResetAcknowledged,
        }
    }
}

impl ServerMessage {
    /// Pong stamped with the current wall-clock time and the last probe RTT.
    pub fn pong_now(rtt: Option<Duration>) -> Self {
        ServerMessage::HeartbeatPong {
            server_time: chrono::Utc::now().timestamp_millis(),
            rtt_ms: rtt.map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
        }
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::DisplayName;
    use serde_json::{json, Value};

    #[test]
    fn test_client_wire_names() {
        let msg = ClientMessage::from_json(r#"{"type":"join-request","displayName":"ace"}"#).unwrap();
        assert_eq!(msg, ClientMessage::JoinRequest { display_name: "ace".to_string() });

        let msg = ClientMessage::from_json(r#"{"type":"hit-claim","damage":130}"#).unwrap();
        assert_eq!(msg, ClientMessage::HitClaim { damage: 130 });

        let msg = ClientMessage::from_json(r#"{"type":"reload-report"}"#).unwrap();
        assert_eq!(msg, ClientMessage::ReloadReport);

        let msg = ClientMessage::from_json(
            r#"{"type":"forfeit-gift","displayName":"zed","points":7}"#,
        ).unwrap();
        assert_eq!(msg, ClientMessage::ForfeitGift { display_name: "zed".to_string(), points: 7 });
    }

    #[test]
    fn test_shoot_report_is_flat() {
        let msg = ClientMessage::from_json(
            r#"{"type":"shoot-report","x":1.0,"y":2.0,"angle":0.25,"speed":50.0,"radius":5.0}"#,
        ).unwrap();
        assert_eq!(
            msg,
            ClientMessage::ShootReport(Shot { x: 1.0, y: 2.0, angle: 0.25, speed: 50.0, radius: 5.0 })
        );
    }

    #[test]
    fn test_malformed_messages_rejected() {
        assert!(ClientMessage::from_json(r#"{"type":"hit-claim","damage":-5}"#).is_err());
        assert!(ClientMessage::from_json(r#"{"type":"hit-claim"}"#).is_err());
        assert!(ClientMessage::from_json(r#"{"type":"teleport","x":1}"#).is_err());
        assert!(ClientMessage::from_json("not json").is_err());
    }

    #[test]
    fn test_paired_wire_shape() {
        let opponent = PlayerId::from_bytes([7; 16]);
        let msg: ServerMessage = Notice::Paired {
            opponent_id: opponent,
            opponent_name: DisplayName::parse("bravo").unwrap(),
            spawn: SpawnPoint::new(100.0, 100.0),
        }
        .into();

        let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "paired",
                "opponentId": opponent.to_string(),
                "opponentName": "bravo",
                "spawnPoint": { "x": 100.0, "y": 100.0 },
            })
        );
    }

    #[test]
    fn test_match_ended_wire_shape() {
        let msg: ServerMessage = Notice::MatchEnded { result: RoundResult::Lose }.into();
        assert_eq!(msg.to_json().unwrap(), r#"{"type":"match-ended","result":"lose"}"#);

        let msg: ServerMessage = Notice::ResetAcknowledged.into();
        assert_eq!(msg.to_json().unwrap(), r#"{"type":"reset-acknowledged"}"#);
    }

    #[test]
    fn test_opponent_shot_carries_owner() {
        let owner = PlayerId::from_bytes([3; 16]);
        let shot = Shot { x: 5.0, y: 6.0, angle: 1.5, speed: 50.0, radius: 5.0 };
        let msg: ServerMessage = Notice::OpponentShot { shot, owner }.into();
        let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "opponent-shot");
        assert_eq!(value["owner"], owner.to_string());
        assert_eq!(value["angle"], 1.5);
    }

    #[test]
    fn test_leaderboard_snapshot_shape() {
        let msg = ServerMessage::LeaderboardSnapshot {
            entries: vec![LedgerEntry { name: "ace".to_string(), score: 30 }],
        };
        let json = msg.to_json().unwrap();
        assert_eq!(json, r#"{"type":"leaderboard-snapshot","entries":[{"name":"ace","score":30}]}"#);
    }

    #[test]
    fn test_pong_has_server_time() {
        let json = ServerMessage::pong_now(None).to_json().unwrap();
        assert!(json.starts_with(r#"{"type":"heartbeat-pong","serverTime":"#));
        assert!(!json.contains("rttMs"));

        let value: Value =
            serde_json::from_str(&ServerMessage::pong_now(Some(Duration::from_millis(42))).to_json().unwrap())
                .unwrap();
        assert_eq!(value["rttMs"], 42);
    }
}
