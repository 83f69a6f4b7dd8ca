//! The authoritative session snapshot. Everything here is a value type:
//! mutation helpers consume `self` and hand back a new snapshot, and every
//! observable transition goes through [`GameSessionState::log_event`], which
//! is the single place the version counter advances.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use protocol::{now_ms, GameLogEntry, GameState, SessionPhase, TurnState};

/// Upper bound on the in-memory audit log. Oldest entries are discarded on
/// overflow.
pub const MAX_LOG_ENTRIES: usize = 50;

/// One seat as recorded in the session snapshot at game start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSessionState {
    pub player_id: String,
    pub nickname: String,
    pub is_connected: bool,
    pub is_ready: bool,
    pub reconnect_token: String,
}

/// The session snapshot the server holds and persists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSessionState {
    pub session_id: String,
    pub phase: SessionPhase,
    pub players: BTreeMap<String, PlayerSessionState>,
    pub player_order: Vec<String>,
    pub turn_state: Option<TurnState>,
    pub game_state: Option<GameState>,
    pub log: Vec<GameLogEntry>,
    pub version: u64,
}

impl GameSessionState {
    /// A fresh lobby session.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            phase: SessionPhase::Lobby,
            players: BTreeMap::new(),
            player_order: Vec::new(),
            turn_state: None,
            game_state: None,
            log: Vec::new(),
            version: 0,
        }
    }

    /// Appends a log entry and bumps the version. Every semantic mutation
    /// must pass through here exactly once, so version monotonicity and the
    /// log bound hold together.
    pub fn log_event(mut self, event_type: &str, description: impl Into<String>) -> Self {
        if self.log.len() >= MAX_LOG_ENTRIES {
            let overflow = self.log.len() + 1 - MAX_LOG_ENTRIES;
            self.log.drain(..overflow);
        }
        self.log.push(GameLogEntry {
            event_type: event_type.to_string(),
            description: description.into(),
            timestamp: now_ms(),
        });
        self.version += 1;
        self
    }

    /// The player whose turn it is, if a game is running.
    pub fn active_player(&self) -> Option<&str> {
        self.turn_state
            .as_ref()
            .map(|t| t.active_player_id.as_str())
    }

    /// Checks the player/order consistency that must hold while in game:
    /// every ordered id has a seat and the turn pointer agrees with the
    /// order.
    pub fn order_consistent(&self) -> bool {
        if self.phase != SessionPhase::InGame {
            return true;
        }
        if !self.player_order.iter().all(|id| self.players.contains_key(id)) {
            return false;
        }
        match &self.turn_state {
            Some(turn) => self
                .player_order
                .get(turn.turn_index)
                .map(|id| *id == turn.active_player_id)
                .unwrap_or(false),
            None => false,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("Could not serialize session state.")
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
