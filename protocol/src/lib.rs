//! The wire protocol shared between the board server and the player clients.
//! Contains the envelope codec, the closed set of message types with their
//! payload schemas, and the view/model types both sides exchange.

mod envelope;
mod messages;
mod model;
mod views;

pub use envelope::{now_ms, Envelope, Message, MessageType, ProtocolError};
pub use messages::{
    ActionPayload, ActionRejectedPayload, BoardViewPayload, ErrorPayload, JoinErrorCode,
    JoinPayload, JoinRoomAckPayload, LeavePayload, PingPayload, PlayerViewPayload, PongPayload,
    RejectCode, SetReadyPayload, StartGamePayload, StateUpdatePayload,
};
pub use model::{
    CardTableData, GameData, GameLogEntry, GameState, SessionPhase, TurnState, TurnStep,
};
pub use views::{AllowedAction, BoardView, LobbyPlayer, LobbyState, PlayerView};

/// The buffer size for the per-connection outbound channels.
pub const CHANNEL_BUFFER_SIZE: usize = 256;

/// The path of the duplex endpoint on the board device.
pub const WS_PATH: &str = "/ws";

/// The mDNS service type an external registrar advertises the port under.
/// The server itself never implements mDNS, it only publishes the bound port.
pub const SERVICE_TYPE: &str = "_boardgo._tcp";

/// The default mDNS instance name.
pub const DEFAULT_INSTANCE_NAME: &str = "Board Go";
