//! Per-type payload schemas. Field names follow the wire casing used by the
//! node clients, so every struct carries a camelCase rename.

use serde::{Deserialize, Serialize};

/// Payload of `JOIN`. The presented `player_id` is overridden when a valid
/// reconnect token resolves to an existing seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    pub player_id: String,
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect_token: Option<String>,
}

impl JoinPayload {
    pub fn new(player_id: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
            event: "join".to_string(),
            display_name: None,
            reconnect_token: None,
        }
    }
}

/// Payload of `LEAVE`, both as a client request and as the broadcast
/// notification to the remaining seats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeavePayload {
    pub player_id: String,
    pub event: String,
}

impl LeavePayload {
    pub fn new(player_id: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
            event: "leave".to_string(),
        }
    }
}

/// Failure codes of `JOIN_ROOM_ACK`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JoinErrorCode {
    RoomFull,
    InvalidToken,
    NicknameTaken,
}

/// Payload of `JOIN_ROOM_ACK`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomAckPayload {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<JoinErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl JoinRoomAckPayload {
    pub fn accepted(player_id: impl Into<String>, reconnect_token: impl Into<String>) -> Self {
        Self {
            success: true,
            player_id: Some(player_id.into()),
            reconnect_token: Some(reconnect_token.into()),
            error_code: None,
            error_message: None,
        }
    }

    pub fn refused(code: JoinErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            player_id: None,
            reconnect_token: None,
            error_code: Some(code),
            error_message: Some(message.into()),
        }
    }
}

/// Payload of `SET_READY`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetReadyPayload {
    pub player_id: String,
    pub is_ready: bool,
}

/// Payload of `ACTION`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPayload {
    pub player_id: String,
    pub action_type: String,
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_action_id: Option<String>,
}

/// Rejection codes of the in-game action pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectCode {
    DuplicateAction,
    PhaseMismatch,
    NotYourTurn,
    InvalidAction,
}

/// Payload of `ACTION_REJECTED`, sent to the submitting client only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRejectedPayload {
    pub reason: String,
    pub code: RejectCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_action_id: Option<String>,
}

/// Payload of `BOARD_VIEW`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardViewPayload {
    pub board_view: crate::views::BoardView,
}

/// Payload of `PLAYER_VIEW`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerViewPayload {
    pub player_view: crate::views::PlayerView,
}

/// Payload of `PING`. Heartbeat cadence is client-driven.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingPayload {
    pub timestamp: i64,
}

/// Payload of `PONG`, echoing the client's timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PongPayload {
    pub timestamp: i64,
}

/// Payload of `ERROR`: malformed frames and other soft rejections. The
/// connection stays open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub reason: String,
}

/// Payload of the legacy `STATE_UPDATE` broadcast. Kept in the closed set so
/// old clients still decode; the server no longer emits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateUpdatePayload {
    pub state: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_by: Option<String>,
}

/// Payload of `START_GAME`, issued from the board side of the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartGamePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack_id: Option<String>,
}
