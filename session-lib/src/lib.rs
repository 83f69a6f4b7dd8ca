//! The session engine behind the board server: the authoritative session
//! snapshot, the seat registry, the rules-pack contract with its reference
//! implementation, the idempotency cache, and the persistence port.

pub mod cache;
pub mod card_pack;
pub mod manager;
pub mod rules;
pub mod state;
pub mod store;

pub use cache::ProcessedActionsCache;
pub use card_pack::CardTablePack;
pub use manager::{PlayerSink, SessionManager};
pub use rules::{action_is_allowed, GameEndStatus, GamePackRules, PackRegistry};
pub use state::{GameSessionState, PlayerSessionState, MAX_LOG_ENTRIES};
pub use store::{MemoryStore, RedbStore, SessionStore, StoreError};
