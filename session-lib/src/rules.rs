//! The contract between the session plumbing and the game logic. A rules
//! pack is a bag of pure functions over the session snapshot: it never
//! retains state, never suspends and never talks to the network. The server
//! owns everything else.

use std::collections::HashMap;
use std::sync::Arc;

use protocol::{ActionPayload, AllowedAction, BoardView, PlayerView};

use crate::state::GameSessionState;

/// Result of the end-of-game check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameEndStatus {
    pub ended: bool,
    /// Every player tied at the maximum score; empty while the game runs.
    pub winner_ids: Vec<String>,
}

impl GameEndStatus {
    pub fn running() -> Self {
        Self {
            ended: false,
            winner_ids: Vec::new(),
        }
    }
}

/// One game's rules. All methods are pure with respect to the passed
/// session; `apply_action` is only called with an action that matched the
/// allowed list.
pub trait GamePackRules: Send + Sync {
    fn pack_id(&self) -> &str;

    /// Transitions the lobby session into a running game: populates the game
    /// state, the first turn, and bumps the version.
    fn create_initial_game_state(&self, session: GameSessionState) -> GameSessionState;

    /// The actions `player_id` may submit right now. Empty when the game is
    /// not running or it is another player's turn.
    fn allowed_actions(&self, session: &GameSessionState, player_id: &str) -> Vec<AllowedAction>;

    fn apply_action(
        &self,
        session: GameSessionState,
        player_id: &str,
        action: &ActionPayload,
    ) -> GameSessionState;

    fn check_game_end(&self, session: &GameSessionState) -> GameEndStatus;

    /// The public snapshot. Must not carry any per-player private state.
    fn build_board_view(&self, session: &GameSessionState) -> BoardView;

    /// The private snapshot for one player: their hand, their allowed
    /// actions, plus the public data.
    fn build_player_view(&self, session: &GameSessionState, player_id: &str) -> PlayerView;
}

/// Does the submitted action match one of the allowed entries? The entry's
/// type must match and every param the entry pins down must appear verbatim
/// in the submitted data.
pub fn action_is_allowed(allowed: &[AllowedAction], action: &ActionPayload) -> bool {
    allowed.iter().any(|entry| {
        entry.action_type == action.action_type
            && entry
                .params
                .iter()
                .all(|(key, value)| action.data.get(key) == Some(value))
    })
}

/// The packs the server can start, keyed by pack id. Unknown ids fall back
/// to the default pack.
pub struct PackRegistry {
    packs: HashMap<String, Arc<dyn GamePackRules>>,
    default_pack_id: String,
}

impl PackRegistry {
    pub fn new(default_pack: Arc<dyn GamePackRules>) -> Self {
        let default_pack_id = default_pack.pack_id().to_string();
        let mut packs = HashMap::new();
        packs.insert(default_pack_id.clone(), default_pack);
        Self {
            packs,
            default_pack_id,
        }
    }

    pub fn insert(&mut self, pack: Arc<dyn GamePackRules>) {
        self.packs.insert(pack.pack_id().to_string(), pack);
    }

    /// Selects a pack; unknown or absent ids yield the default pack.
    pub fn select(&self, pack_id: Option<&str>) -> Arc<dyn GamePackRules> {
        pack_id
            .and_then(|id| self.packs.get(id))
            .unwrap_or_else(|| {
                if let Some(id) = pack_id {
                    if id != self.default_pack_id {
                        tracing::warn!(pack_id = id, "Unknown pack id, falling back to default.");
                    }
                }
                &self.packs[&self.default_pack_id]
            })
            .clone()
    }
}
