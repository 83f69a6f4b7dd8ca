//! The persistence port. A tiny key/value contract keyed on sessionId,
//! deliberately synchronous; the server drives it from a blocking task and
//! treats every failure as a logged shrug, never as a pipeline error.

mod error;
mod memory;
mod redb;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use self::redb::RedbStore;

use crate::state::GameSessionState;

/// Upsert/load/delete of session snapshots. Opening a store is the
/// implementation's constructor; dropping it closes it.
pub trait SessionStore: Send + Sync {
    /// Upserts the snapshot under its sessionId, replacing any previous row.
    fn save(&self, session: &GameSessionState) -> Result<(), StoreError>;

    fn load(&self, session_id: &str) -> Result<Option<GameSessionState>, StoreError>;

    fn delete(&self, session_id: &str) -> Result<(), StoreError>;
}
