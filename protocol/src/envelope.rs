//! The JSON frame codec. Every frame is `{type, payload, timestamp}`; the
//! decoder routes on the type string first and only then parses the payload
//! against that type's schema, so an unknown type and a malformed payload
//! produce distinct errors.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::messages::{
    ActionPayload, ActionRejectedPayload, BoardViewPayload, ErrorPayload, JoinPayload,
    JoinRoomAckPayload, LeavePayload, PingPayload, PlayerViewPayload, PongPayload, SetReadyPayload,
    StartGamePayload, StateUpdatePayload,
};
use crate::views::LobbyState;

/// Milliseconds since the Unix epoch, the clock every outbound envelope is
/// stamped with.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Codec failures. The server answers these with an `ERROR` frame and keeps
/// the socket open.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("unknown message type `{0}`")]
    UnknownType(String),
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}

/// The closed set of frame types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Action,
    StateUpdate,
    Join,
    Leave,
    Error,
    JoinRoomAck,
    LobbyState,
    SetReady,
    Ping,
    Pong,
    PlayerView,
    BoardView,
    ActionRejected,
    StartGame,
}

impl MessageType {
    /// The exact wire string.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Action => "ACTION",
            MessageType::StateUpdate => "STATE_UPDATE",
            MessageType::Join => "JOIN",
            MessageType::Leave => "LEAVE",
            MessageType::Error => "ERROR",
            MessageType::JoinRoomAck => "JOIN_ROOM_ACK",
            MessageType::LobbyState => "LOBBY_STATE",
            MessageType::SetReady => "SET_READY",
            MessageType::Ping => "PING",
            MessageType::Pong => "PONG",
            MessageType::PlayerView => "PLAYER_VIEW",
            MessageType::BoardView => "BOARD_VIEW",
            MessageType::ActionRejected => "ACTION_REJECTED",
            MessageType::StartGame => "START_GAME",
        }
    }

    /// Parses a wire string; `None` for anything outside the closed set.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ACTION" => Some(MessageType::Action),
            "STATE_UPDATE" => Some(MessageType::StateUpdate),
            "JOIN" => Some(MessageType::Join),
            "LEAVE" => Some(MessageType::Leave),
            "ERROR" => Some(MessageType::Error),
            "JOIN_ROOM_ACK" => Some(MessageType::JoinRoomAck),
            "LOBBY_STATE" => Some(MessageType::LobbyState),
            "SET_READY" => Some(MessageType::SetReady),
            "PING" => Some(MessageType::Ping),
            "PONG" => Some(MessageType::Pong),
            "PLAYER_VIEW" => Some(MessageType::PlayerView),
            "BOARD_VIEW" => Some(MessageType::BoardView),
            "ACTION_REJECTED" => Some(MessageType::ActionRejected),
            "START_GAME" => Some(MessageType::StartGame),
            _ => None,
        }
    }
}

/// A decoded frame body: the type tag paired with its typed payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Action(ActionPayload),
    StateUpdate(StateUpdatePayload),
    Join(JoinPayload),
    Leave(LeavePayload),
    Error(ErrorPayload),
    JoinRoomAck(JoinRoomAckPayload),
    LobbyState(LobbyState),
    SetReady(SetReadyPayload),
    Ping(PingPayload),
    Pong(PongPayload),
    PlayerView(PlayerViewPayload),
    BoardView(BoardViewPayload),
    ActionRejected(ActionRejectedPayload),
    StartGame(StartGamePayload),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Action(_) => MessageType::Action,
            Message::StateUpdate(_) => MessageType::StateUpdate,
            Message::Join(_) => MessageType::Join,
            Message::Leave(_) => MessageType::Leave,
            Message::Error(_) => MessageType::Error,
            Message::JoinRoomAck(_) => MessageType::JoinRoomAck,
            Message::LobbyState(_) => MessageType::LobbyState,
            Message::SetReady(_) => MessageType::SetReady,
            Message::Ping(_) => MessageType::Ping,
            Message::Pong(_) => MessageType::Pong,
            Message::PlayerView(_) => MessageType::PlayerView,
            Message::BoardView(_) => MessageType::BoardView,
            Message::ActionRejected(_) => MessageType::ActionRejected,
            Message::StartGame(_) => MessageType::StartGame,
        }
    }

    fn payload_value(&self) -> serde_json::Value {
        // Serializing our own payload types cannot fail.
        let result = match self {
            Message::Action(p) => serde_json::to_value(p),
            Message::StateUpdate(p) => serde_json::to_value(p),
            Message::Join(p) => serde_json::to_value(p),
            Message::Leave(p) => serde_json::to_value(p),
            Message::Error(p) => serde_json::to_value(p),
            Message::JoinRoomAck(p) => serde_json::to_value(p),
            Message::LobbyState(p) => serde_json::to_value(p),
            Message::SetReady(p) => serde_json::to_value(p),
            Message::Ping(p) => serde_json::to_value(p),
            Message::Pong(p) => serde_json::to_value(p),
            Message::PlayerView(p) => serde_json::to_value(p),
            Message::BoardView(p) => serde_json::to_value(p),
            Message::ActionRejected(p) => serde_json::to_value(p),
            Message::StartGame(p) => serde_json::to_value(p),
        };
        result.expect("Could not serialize payload.")
    }
}

/// The raw frame shape as it appears on the wire.
#[derive(Serialize, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    message_type: String,
    #[serde(default)]
    payload: serde_json::Value,
    timestamp: i64,
}

/// A typed frame: message plus the millisecond timestamp it was stamped with.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub message: Message,
    pub timestamp: i64,
}

impl Envelope {
    /// Wraps a message and stamps it with the current wall clock.
    pub fn new(message: Message) -> Self {
        Self {
            message,
            timestamp: now_ms(),
        }
    }

    /// Serializes to the wire form.
    pub fn encode(&self) -> String {
        let raw = RawEnvelope {
            message_type: self.message.message_type().as_str().to_string(),
            payload: self.message.payload_value(),
            timestamp: self.timestamp,
        };
        serde_json::to_string(&raw).expect("Could not serialize envelope.")
    }

    /// Parses a wire frame. Routes on the type tag, then parses the payload
    /// against that type's schema.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let raw: RawEnvelope = serde_json::from_str(text)
            .map_err(|e| ProtocolError::InvalidFrame(format!("malformed envelope: {e}")))?;
        let message_type = MessageType::parse(&raw.message_type)
            .ok_or_else(|| ProtocolError::UnknownType(raw.message_type.clone()))?;

        fn payload<T: serde::de::DeserializeOwned>(
            message_type: MessageType,
            value: serde_json::Value,
        ) -> Result<T, ProtocolError> {
            serde_json::from_value(value).map_err(|e| {
                ProtocolError::InvalidFrame(format!(
                    "bad {} payload: {e}",
                    message_type.as_str()
                ))
            })
        }

        let message = match message_type {
            MessageType::Action => Message::Action(payload(message_type, raw.payload)?),
            MessageType::StateUpdate => Message::StateUpdate(payload(message_type, raw.payload)?),
            MessageType::Join => Message::Join(payload(message_type, raw.payload)?),
            MessageType::Leave => Message::Leave(payload(message_type, raw.payload)?),
            MessageType::Error => Message::Error(payload(message_type, raw.payload)?),
            MessageType::JoinRoomAck => Message::JoinRoomAck(payload(message_type, raw.payload)?),
            MessageType::LobbyState => Message::LobbyState(payload(message_type, raw.payload)?),
            MessageType::SetReady => Message::SetReady(payload(message_type, raw.payload)?),
            MessageType::Ping => Message::Ping(payload(message_type, raw.payload)?),
            MessageType::Pong => Message::Pong(payload(message_type, raw.payload)?),
            MessageType::PlayerView => Message::PlayerView(payload(message_type, raw.payload)?),
            MessageType::BoardView => Message::BoardView(payload(message_type, raw.payload)?),
            MessageType::ActionRejected => {
                Message::ActionRejected(payload(message_type, raw.payload)?)
            }
            MessageType::StartGame => Message::StartGame(payload(message_type, raw.payload)?),
        };

        Ok(Envelope {
            message,
            timestamp: raw.timestamp,
        })
    }
}
