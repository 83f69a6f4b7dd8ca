//! In-memory store for tests and for boards that run without a data
//! directory. Keeps the same JSON-per-row layout as the durable backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{SessionStore, StoreError};
use crate::state::GameSessionState;

/// HashMap-backed store. Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rows: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self) -> MutexGuard<'_, HashMap<String, String>> {
        match self.rows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows().len()
    }
}

impl SessionStore for MemoryStore {
    fn save(&self, session: &GameSessionState) -> Result<(), StoreError> {
        self.rows()
            .insert(session.session_id.clone(), session.to_json());
        Ok(())
    }

    fn load(&self, session_id: &str) -> Result<Option<GameSessionState>, StoreError> {
        match self.rows().get(session_id) {
            Some(json) => GameSessionState::from_json(json)
                .map(Some)
                .map_err(|e| StoreError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }

    fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        self.rows().remove(session_id);
        Ok(())
    }
}
