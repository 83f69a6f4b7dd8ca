//! The seat registry. Tracks, per playerId: nickname, outbound sink, ready
//! flag, connected flag and the reconnect token that lets a new socket
//! reclaim the seat. Owned by the session task; nothing here locks.

use std::collections::{BTreeMap, HashMap};

use tokio::sync::mpsc;
use uuid::Uuid;

use protocol::{LobbyPlayer, LobbyState};

use crate::state::PlayerSessionState;

/// The outbound side of one connection. Sends never block the session task:
/// a full queue drops the frame for that client.
#[derive(Debug, Clone)]
pub struct PlayerSink {
    conn_id: u64,
    tx: mpsc::Sender<String>,
}

impl PlayerSink {
    pub fn new(conn_id: u64, tx: mpsc::Sender<String>) -> Self {
        Self { conn_id, tx }
    }

    pub fn conn_id(&self) -> u64 {
        self.conn_id
    }

    /// Enqueues a frame; drops it if the client is too slow or gone.
    pub fn deliver(&self, frame: &str) {
        if let Err(error) = self.tx.try_send(frame.to_string()) {
            tracing::warn!(conn_id = self.conn_id, %error, "Dropping frame for slow or closed sink.");
        }
    }
}

#[derive(Debug)]
struct Seat {
    nickname: String,
    sink: Option<PlayerSink>,
    is_ready: bool,
    is_connected: bool,
}

/// Registry of all seats in the room, connected or not.
#[derive(Debug, Default)]
pub struct SessionManager {
    seats: HashMap<String, Seat>,
    join_order: Vec<String>,
    tokens: HashMap<String, String>,
    token_owners: HashMap<String, String>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or replaces the seat for `player_id`. A replaced seat keeps
    /// its reconnect token; the ready flag always resets.
    pub fn register(&mut self, player_id: &str, nickname: &str, sink: PlayerSink) {
        if !self.seats.contains_key(player_id) {
            self.join_order.push(player_id.to_string());
        }
        self.seats.insert(
            player_id.to_string(),
            Seat {
                nickname: nickname.to_string(),
                sink: Some(sink),
                is_ready: false,
                is_connected: true,
            },
        );
    }

    /// Drops the seat. The forward playerId → token mapping is kept so a
    /// returning player gets the same token again, but the token no longer
    /// resolves to a seat.
    pub fn unregister(&mut self, player_id: &str) {
        if self.seats.remove(player_id).is_some() {
            self.join_order.retain(|id| id != player_id);
        }
        if let Some(token) = self.tokens.get(player_id) {
            self.token_owners.remove(token);
        }
    }

    /// Marks the seat offline and detaches the sink. No-op for unknown ids.
    pub fn mark_disconnected(&mut self, player_id: &str) {
        if let Some(seat) = self.seats.get_mut(player_id) {
            seat.is_connected = false;
            seat.sink = None;
        }
    }

    /// Reattaches a seat to a new connection. No-op for unknown ids.
    pub fn reconnect(&mut self, player_id: &str, sink: PlayerSink) {
        if let Some(seat) = self.seats.get_mut(player_id) {
            seat.is_connected = true;
            seat.sink = Some(sink);
        }
    }

    /// Delivers a frame to one player; no-op unless the seat is connected.
    pub fn send(&self, player_id: &str, frame: &str) {
        if let Some(seat) = self.seats.get(player_id) {
            if seat.is_connected {
                if let Some(sink) = &seat.sink {
                    sink.deliver(frame);
                }
            }
        }
    }

    /// Delivers a frame to every connected seat, minus the excluded one.
    pub fn broadcast(&self, frame: &str, exclude_player_id: Option<&str>) {
        for player_id in &self.join_order {
            if Some(player_id.as_str()) == exclude_player_id {
                continue;
            }
            self.send(player_id, frame);
        }
    }

    pub fn set_ready(&mut self, player_id: &str, is_ready: bool) {
        if let Some(seat) = self.seats.get_mut(player_id) {
            seat.is_ready = is_ready;
        }
    }

    pub fn is_ready(&self, player_id: &str) -> bool {
        self.seats.get(player_id).map(|s| s.is_ready).unwrap_or(false)
    }

    /// Returns the seat's reconnect token, minting a uniformly random one on
    /// first request. The token stays with the seat until `unregister`.
    pub fn reconnect_token(&mut self, player_id: &str) -> String {
        if let Some(token) = self.tokens.get(player_id) {
            return token.clone();
        }
        let token = Uuid::new_v4().to_string();
        self.tokens.insert(player_id.to_string(), token.clone());
        self.token_owners.insert(token.clone(), player_id.to_string());
        token
    }

    /// Resolves a presented token to the owning seat, if any.
    pub fn find_player_by_reconnect_token(&self, token: &str) -> Option<&str> {
        self.token_owners.get(token).map(String::as_str)
    }

    /// True iff at least one seat is connected and every connected seat has
    /// readied up.
    pub fn is_ready_to_start(&self) -> bool {
        let mut any_connected = false;
        for seat in self.seats.values() {
            if seat.is_connected {
                any_connected = true;
                if !seat.is_ready {
                    return false;
                }
            }
        }
        any_connected
    }

    /// Snapshot of every seat, in join order, for the lobby broadcast.
    pub fn build_lobby_state(&self) -> LobbyState {
        let players = self
            .join_order
            .iter()
            .filter_map(|player_id| {
                self.seats.get(player_id).map(|seat| LobbyPlayer {
                    player_id: player_id.clone(),
                    nickname: seat.nickname.clone(),
                    is_ready: seat.is_ready,
                    is_connected: seat.is_connected,
                })
            })
            .collect();
        LobbyState {
            players,
            can_start: self.is_ready_to_start(),
        }
    }

    /// Connected seat ids in registry iteration order. This is what fixes
    /// `playerOrder` at game start.
    pub fn connected_player_ids(&self) -> Vec<String> {
        self.join_order
            .iter()
            .filter(|id| {
                self.seats
                    .get(id.as_str())
                    .map(|s| s.is_connected)
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    /// Hydrates the per-seat session records, minting tokens for any seat
    /// that never asked for one.
    pub fn seat_states(&mut self) -> BTreeMap<String, PlayerSessionState> {
        let ids: Vec<String> = self.join_order.clone();
        let mut result = BTreeMap::new();
        for player_id in ids {
            let token = self.reconnect_token(&player_id);
            if let Some(seat) = self.seats.get(&player_id) {
                result.insert(
                    player_id.clone(),
                    PlayerSessionState {
                        player_id: player_id.clone(),
                        nickname: seat.nickname.clone(),
                        is_connected: seat.is_connected,
                        is_ready: seat.is_ready,
                        reconnect_token: token,
                    },
                );
            }
        }
        result
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.seats.contains_key(player_id)
    }

    pub fn seat_count(&self) -> usize {
        self.seats.len()
    }

    /// Is `nickname` already taken by a seat other than `player_id`?
    pub fn nickname_taken(&self, nickname: &str, player_id: &str) -> bool {
        self.seats
            .iter()
            .any(|(id, seat)| id != player_id && seat.nickname == nickname)
    }

    /// The connection currently attached to the seat, if any. Used to tell
    /// an orphaned socket close apart from a superseded one.
    pub fn sink_conn_id(&self, player_id: &str) -> Option<u64> {
        self.seats
            .get(player_id)
            .and_then(|s| s.sink.as_ref())
            .map(|sink| sink.conn_id())
    }

    pub fn is_connected(&self, player_id: &str) -> bool {
        self.seats
            .get(player_id)
            .map(|s| s.is_connected)
            .unwrap_or(false)
    }
}
