//! The two snapshots the server fans out after every in-game mutation, plus
//! the lobby snapshot. The board view is public and goes to everyone; the
//! player view is private and goes to exactly one player.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::{GameLogEntry, SessionPhase, TurnState};

/// A pre-validated action the active player may submit verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowedAction {
    pub action_type: String,
    pub label: String,
    #[serde(default)]
    pub params: BTreeMap<String, serde_json::Value>,
}

/// The public snapshot broadcast to every connection. Must never carry
/// per-player private state; in particular there is no `hands` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardView {
    pub phase: SessionPhase,
    pub scores: BTreeMap<String, u32>,
    pub turn_state: Option<TurnState>,
    pub deck_remaining: usize,
    pub discard_pile: Vec<String>,
    pub recent_log: Vec<GameLogEntry>,
    pub version: u64,
}

/// The private snapshot sent individually to one player. The only sanctioned
/// container for that player's private state is `hand`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub phase: SessionPhase,
    pub player_id: String,
    pub hand: Vec<String>,
    pub scores: BTreeMap<String, u32>,
    pub turn_state: Option<TurnState>,
    pub allowed_actions: Vec<AllowedAction>,
    pub version: u64,
}

/// One seat as seen in the lobby. Disconnected seats stay listed with
/// `is_connected == false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyPlayer {
    pub player_id: String,
    pub nickname: String,
    pub is_ready: bool,
    pub is_connected: bool,
}

/// The lobby snapshot broadcast after every lobby-shaped mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyState {
    pub players: Vec<LobbyPlayer>,
    pub can_start: bool,
}
