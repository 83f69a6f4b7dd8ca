//! Redb-backed durable store. One table, one row per sessionId, the
//! JSON-serialized snapshot as the value.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, TableDefinition};

use super::{SessionStore, StoreError};
use crate::state::GameSessionState;

/// Table: sessions
/// Key: sessionId string
/// Value: JSON-encoded `GameSessionState`
const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");

/// Durable store backed by redb. Clone is cheap (Arc); redb serializes
/// writers internally.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Opens or creates the database file and makes sure the table exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database::create(path.as_ref()).map_err(|e| StoreError::Io(e.to_string()))?;
        let txn = db.begin_write().map_err(|e| StoreError::Io(e.to_string()))?;
        {
            let _ = txn
                .open_table(SESSIONS)
                .map_err(|e| StoreError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(Self { db: Arc::new(db) })
    }
}

impl SessionStore for RedbStore {
    fn save(&self, session: &GameSessionState) -> Result<(), StoreError> {
        let json = session.to_json();
        let txn = self
            .db
            .begin_write()
            .map_err(|e| StoreError::Io(e.to_string()))?;
        {
            let mut table = txn
                .open_table(SESSIONS)
                .map_err(|e| StoreError::Io(e.to_string()))?;
            table
                .insert(session.session_id.as_str(), json.as_bytes())
                .map_err(|e| StoreError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(())
    }

    fn load(&self, session_id: &str) -> Result<Option<GameSessionState>, StoreError> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| StoreError::Io(e.to_string()))?;
        let table = txn
            .open_table(SESSIONS)
            .map_err(|e| StoreError::Io(e.to_string()))?;
        let row = table
            .get(session_id)
            .map_err(|e| StoreError::Io(e.to_string()))?;
        match row {
            Some(guard) => {
                let text = String::from_utf8(guard.value().to_vec())
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                GameSessionState::from_json(&text)
                    .map(Some)
                    .map_err(|e| StoreError::Serialization(e.to_string()))
            }
            None => Ok(None),
        }
    }

    fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        let txn = self
            .db
            .begin_write()
            .map_err(|e| StoreError::Io(e.to_string()))?;
        {
            let mut table = txn
                .open_table(SESSIONS)
                .map_err(|e| StoreError::Io(e.to_string()))?;
            table
                .remove(session_id)
                .map_err(|e| StoreError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(())
    }
}
