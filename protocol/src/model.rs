//! The session model types that travel over the wire and into the store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The lifecycle phase of the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    Lobby,
    InGame,
    RoundEnd,
    Finished,
}

/// The step within a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TurnStep {
    Start,
    Main,
    End,
}

/// Whose turn it is and how far the turn has progressed. Absent in the lobby.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnState {
    pub round: u32,
    pub turn_index: usize,
    pub active_player_id: String,
    pub step: TurnStep,
    pub action_count_this_turn: u32,
}

/// One entry of the bounded session log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameLogEntry {
    pub event_type: String,
    pub description: String,
    pub timestamp: i64,
}

/// The pack-owned game state. Absent in the lobby. The session core never
/// interprets `data`; only the pack that produced it does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub game_id: String,
    pub turn: u64,
    pub active_player_id: String,
    pub data: GameData,
}

/// Typed game data, one variant per rules pack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "pack", rename_all = "camelCase")]
pub enum GameData {
    CardTable(CardTableData),
}

/// The table state of the reference card pack: per-player hands, the draw
/// deck, the discard pile and the running scores.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardTableData {
    pub hands: BTreeMap<String, Vec<String>>,
    pub deck: Vec<String>,
    pub discard_pile: Vec<String>,
    pub scores: BTreeMap<String, u32>,
}
