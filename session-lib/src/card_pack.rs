//! The reference rules pack: a shuffled 52-card deck, a dealt hand per
//! player, a discard pile and a score counter. Not much of a game, but it
//! exercises every seam of the contract: private hands, per-card allowed
//! actions, turn rotation and an end condition.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use protocol::{
    ActionPayload, AllowedAction, BoardView, CardTableData, GameData, GameState, PlayerView,
    SessionPhase, TurnState, TurnStep,
};

use crate::rules::{GameEndStatus, GamePackRules};
use crate::state::GameSessionState;

pub const PACK_ID: &str = "card-table";

pub const PLAY_CARD: &str = "PLAY_CARD";
pub const DRAW_CARD: &str = "DRAW_CARD";
pub const END_TURN: &str = "END_TURN";

const SUITS: [&str; 4] = ["clubs", "diamonds", "hearts", "spades"];
const RANKS: [&str; 13] = [
    "2", "3", "4", "5", "6", "7", "8", "9", "10", "jack", "queen", "king", "ace",
];

/// How many entries of the discard pile the board view shows.
const DISCARD_TAIL: usize = 5;
/// How many log entries the board view shows.
const RECENT_LOG: usize = 10;

/// The reference pack. All knobs are constructor-injected so tests can pin
/// the shuffle.
#[derive(Debug, Clone)]
pub struct CardTablePack {
    pub hand_size: usize,
    pub max_rounds: u32,
    pub seed: Option<u64>,
}

impl Default for CardTablePack {
    fn default() -> Self {
        Self {
            hand_size: 5,
            max_rounds: 3,
            seed: None,
        }
    }
}

impl CardTablePack {
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    fn full_deck() -> Vec<String> {
        let mut deck = Vec::with_capacity(SUITS.len() * RANKS.len());
        for suit in SUITS {
            for rank in RANKS {
                deck.push(format!("{suit}-{rank}"));
            }
        }
        deck
    }

    fn shuffled_deck(&self) -> Vec<String> {
        let mut deck = Self::full_deck();
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        deck.shuffle(&mut rng);
        deck
    }

    fn table<'a>(session: &'a GameSessionState) -> Option<&'a CardTableData> {
        match &session.game_state {
            Some(GameState {
                data: GameData::CardTable(table),
                ..
            }) => Some(table),
            None => None,
        }
    }
}

impl GamePackRules for CardTablePack {
    fn pack_id(&self) -> &str {
        PACK_ID
    }

    fn create_initial_game_state(&self, mut session: GameSessionState) -> GameSessionState {
        let mut deck = self.shuffled_deck();
        let mut table = CardTableData::default();
        for player_id in &session.player_order {
            let take = self.hand_size.min(deck.len());
            let hand: Vec<String> = deck.drain(..take).collect();
            table.hands.insert(player_id.clone(), hand);
            table.scores.insert(player_id.clone(), 0);
        }
        table.deck = deck;

        let first_player = session.player_order[0].clone();
        session.game_state = Some(GameState {
            game_id: format!("{PACK_ID}-{}", session.session_id),
            turn: 0,
            active_player_id: first_player.clone(),
            data: GameData::CardTable(table),
        });
        session.turn_state = Some(TurnState {
            round: 1,
            turn_index: 0,
            active_player_id: first_player,
            step: TurnStep::Main,
            action_count_this_turn: 0,
        });
        session.phase = SessionPhase::InGame;

        let player_count = session.player_order.len();
        session.log_event(
            "GAME_START",
            format!("Game started with {player_count} players."),
        )
    }

    fn allowed_actions(&self, session: &GameSessionState, player_id: &str) -> Vec<AllowedAction> {
        if session.phase != SessionPhase::InGame {
            return Vec::new();
        }
        let Some(turn) = &session.turn_state else {
            return Vec::new();
        };
        if turn.active_player_id != player_id {
            return Vec::new();
        }
        let Some(table) = Self::table(session) else {
            return Vec::new();
        };

        let mut actions = Vec::new();
        if let Some(hand) = table.hands.get(player_id) {
            for card in hand {
                actions.push(AllowedAction {
                    action_type: PLAY_CARD.to_string(),
                    label: format!("Play {card}"),
                    params: [(
                        "cardId".to_string(),
                        serde_json::Value::String(card.clone()),
                    )]
                    .into_iter()
                    .collect(),
                });
            }
        }
        if !table.deck.is_empty() {
            actions.push(AllowedAction {
                action_type: DRAW_CARD.to_string(),
                label: "Draw a card".to_string(),
                params: Default::default(),
            });
        }
        actions.push(AllowedAction {
            action_type: END_TURN.to_string(),
            label: "End turn".to_string(),
            params: Default::default(),
        });
        actions
    }

    fn apply_action(
        &self,
        mut session: GameSessionState,
        player_id: &str,
        action: &ActionPayload,
    ) -> GameSessionState {
        let Some(mut game_state) = session.game_state.clone() else {
            return session;
        };
        let GameData::CardTable(mut table) = game_state.data.clone();
        let Some(mut turn) = session.turn_state.clone() else {
            return session;
        };

        let log: (String, String);
        match action.action_type.as_str() {
            PLAY_CARD => {
                let Some(card_id) = action.data.get("cardId").and_then(|v| v.as_str()) else {
                    return session;
                };
                let Some(hand) = table.hands.get_mut(player_id) else {
                    return session;
                };
                let Some(position) = hand.iter().position(|c| c == card_id) else {
                    return session;
                };
                let card = hand.remove(position);
                table.discard_pile.push(card.clone());
                *table.scores.entry(player_id.to_string()).or_insert(0) += 1;
                turn.action_count_this_turn += 1;
                log = (
                    "CARD_PLAYED".to_string(),
                    format!("{player_id} played {card}."),
                );
            }
            DRAW_CARD => {
                if table.deck.is_empty() {
                    return session;
                }
                let card = table.deck.remove(0);
                table
                    .hands
                    .entry(player_id.to_string())
                    .or_default()
                    .push(card);
                turn.action_count_this_turn += 1;
                // Drawn cards are private; the log must not name them.
                log = (
                    "CARD_DRAWN".to_string(),
                    format!("{player_id} drew a card."),
                );
            }
            END_TURN => {
                turn.turn_index = (turn.turn_index + 1) % session.player_order.len();
                if turn.turn_index == 0 {
                    turn.round += 1;
                }
                turn.action_count_this_turn = 0;
                turn.active_player_id = session.player_order[turn.turn_index].clone();
                game_state.turn += 1;
                game_state.active_player_id = turn.active_player_id.clone();
                log = (
                    "TURN_ENDED".to_string(),
                    format!(
                        "{player_id} ended the turn; {} is up.",
                        turn.active_player_id
                    ),
                );
            }
            _ => return session,
        }

        game_state.data = GameData::CardTable(table);
        session.game_state = Some(game_state);
        session.turn_state = Some(turn);
        session.log_event(&log.0, log.1)
    }

    fn check_game_end(&self, session: &GameSessionState) -> GameEndStatus {
        let Some(table) = Self::table(session) else {
            return GameEndStatus::running();
        };
        let round = session.turn_state.as_ref().map(|t| t.round).unwrap_or(0);
        if !table.deck.is_empty() && round <= self.max_rounds {
            return GameEndStatus::running();
        }

        let top_score = table.scores.values().copied().max().unwrap_or(0);
        let winner_ids = session
            .player_order
            .iter()
            .filter(|id| table.scores.get(*id).copied().unwrap_or(0) == top_score)
            .cloned()
            .collect();
        GameEndStatus {
            ended: true,
            winner_ids,
        }
    }

    fn build_board_view(&self, session: &GameSessionState) -> BoardView {
        let (scores, deck_remaining, discard_pile) = match Self::table(session) {
            Some(table) => {
                let tail_start = table.discard_pile.len().saturating_sub(DISCARD_TAIL);
                (
                    table.scores.clone(),
                    table.deck.len(),
                    table.discard_pile[tail_start..].to_vec(),
                )
            }
            None => Default::default(),
        };
        let log_start = session.log.len().saturating_sub(RECENT_LOG);
        BoardView {
            phase: session.phase,
            scores,
            turn_state: session.turn_state.clone(),
            deck_remaining,
            discard_pile,
            recent_log: session.log[log_start..].to_vec(),
            version: session.version,
        }
    }

    fn build_player_view(&self, session: &GameSessionState, player_id: &str) -> PlayerView {
        let (hand, scores) = match Self::table(session) {
            Some(table) => (
                table.hands.get(player_id).cloned().unwrap_or_default(),
                table.scores.clone(),
            ),
            None => Default::default(),
        };
        PlayerView {
            phase: session.phase,
            player_id: player_id.to_string(),
            hand,
            scores,
            turn_state: session.turn_state.clone(),
            allowed_actions: self.allowed_actions(session, player_id),
            version: session.version,
        }
    }
}
