//! The session task: the single logical owner of all mutable room state.
//! Connection tasks decode nothing and decide nothing; they forward raw
//! frames and socket events into this task's mailbox, and everything from
//! seat changes to the action pipeline happens here, one command at a time.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use protocol::{
    ActionPayload, ActionRejectedPayload, BoardViewPayload, Envelope, ErrorPayload, JoinErrorCode,
    JoinPayload, JoinRoomAckPayload, LeavePayload, Message, PlayerViewPayload, PongPayload,
    RejectCode, SessionPhase,
};
use session_lib::{
    action_is_allowed, GamePackRules, GameSessionState, PackRegistry, PlayerSink,
    ProcessedActionsCache, SessionManager, SessionStore,
};

/// Everything the connection layer can feed into the session task.
pub enum SessionCommand {
    /// A socket finished the upgrade; `sink` is its outbound channel.
    Connected {
        conn_id: u64,
        sink: mpsc::Sender<String>,
    },
    /// A raw text frame arrived on a socket.
    Frame { conn_id: u64, text: String },
    /// The socket closed or errored.
    Closed { conn_id: u64 },
    /// Out-of-band game start, from the board-side process.
    StartGame { pack_id: Option<String> },
    /// Probe of the authoritative snapshot.
    Snapshot {
        reply: oneshot::Sender<GameSessionState>,
    },
    Shutdown,
}

struct Connection {
    sink: mpsc::Sender<String>,
    player_id: Option<String>,
}

/// The state the session task owns exclusively.
pub struct SessionTask {
    manager: SessionManager,
    session: GameSessionState,
    cache: ProcessedActionsCache,
    registry: PackRegistry,
    active_pack: Option<Arc<dyn GamePackRules>>,
    store: Option<Arc<dyn SessionStore>>,
    connections: HashMap<u64, Connection>,
    max_players: usize,
}

impl SessionTask {
    pub fn new(
        session_id: impl Into<String>,
        registry: PackRegistry,
        store: Option<Arc<dyn SessionStore>>,
        max_players: usize,
    ) -> Self {
        Self {
            manager: SessionManager::new(),
            session: GameSessionState::new(session_id),
            cache: ProcessedActionsCache::default(),
            registry,
            active_pack: None,
            store,
            connections: HashMap::new(),
            max_players,
        }
    }

    /// Drains the mailbox until shutdown or until every command sender is
    /// gone.
    pub async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        while let Some(command) = commands.recv().await {
            if !self.handle(command) {
                break;
            }
        }
        tracing::debug!("Session task finished.");
    }

    /// Processes one command; `false` stops the task.
    fn handle(&mut self, command: SessionCommand) -> bool {
        match command {
            SessionCommand::Connected { conn_id, sink } => {
                self.connections.insert(
                    conn_id,
                    Connection {
                        sink,
                        player_id: None,
                    },
                );
            }
            SessionCommand::Frame { conn_id, text } => self.on_frame(conn_id, &text),
            SessionCommand::Closed { conn_id } => self.on_closed(conn_id),
            SessionCommand::StartGame { pack_id } => self.start_game(pack_id, None),
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.session.clone());
            }
            SessionCommand::Shutdown => return false,
        }
        true
    }

    fn on_frame(&mut self, conn_id: u64, text: &str) {
        let envelope = match Envelope::decode(text) {
            Ok(envelope) => envelope,
            Err(error) => {
                tracing::warn!(conn_id, %error, "Rejecting malformed frame.");
                self.send_to_conn(
                    conn_id,
                    Message::Error(ErrorPayload {
                        reason: error.to_string(),
                    }),
                );
                return;
            }
        };

        match envelope.message {
            Message::Join(payload) => self.on_join(conn_id, payload),
            Message::SetReady(payload) => {
                self.manager.set_ready(&payload.player_id, payload.is_ready);
                self.broadcast_lobby();
            }
            Message::Action(payload) => self.on_action(conn_id, payload),
            Message::Ping(payload) => {
                // Heartbeats echo to the sender only, never broadcast.
                self.send_to_conn(
                    conn_id,
                    Message::Pong(PongPayload {
                        timestamp: payload.timestamp,
                    }),
                );
            }
            Message::Leave(payload) => self.on_leave(payload),
            Message::StartGame(payload) => self.start_game(payload.pack_id, Some(conn_id)),
            other => {
                self.send_to_conn(
                    conn_id,
                    Message::Error(ErrorPayload {
                        reason: format!(
                            "unexpected message type {}",
                            other.message_type().as_str()
                        ),
                    }),
                );
            }
        }
    }

    fn on_join(&mut self, conn_id: u64, join: JoinPayload) {
        let Some(sink) = self.connections.get(&conn_id).map(|c| c.sink.clone()) else {
            return;
        };

        // A presented token that resolves wins over the presented playerId.
        // An unknown token is not an error; the join proceeds as fresh.
        let token_owner = join
            .reconnect_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .and_then(|token| {
                self.manager
                    .find_player_by_reconnect_token(token)
                    .map(str::to_string)
            });

        let resolved = match token_owner {
            Some(owner) => {
                self.manager
                    .reconnect(&owner, PlayerSink::new(conn_id, sink));
                tracing::info!(player_id = %owner, conn_id, "Seat reclaimed by token.");
                owner
            }
            None => {
                let player_id = join.player_id.clone();
                let nickname = join
                    .display_name
                    .clone()
                    .unwrap_or_else(|| player_id.clone());

                if !self.manager.contains(&player_id)
                    && self.manager.seat_count() >= self.max_players
                {
                    self.send_to_conn(
                        conn_id,
                        Message::JoinRoomAck(JoinRoomAckPayload::refused(
                            JoinErrorCode::RoomFull,
                            format!("Room is full ({} seats).", self.max_players),
                        )),
                    );
                    return;
                }
                if self.manager.nickname_taken(&nickname, &player_id) {
                    self.send_to_conn(
                        conn_id,
                        Message::JoinRoomAck(JoinRoomAckPayload::refused(
                            JoinErrorCode::NicknameTaken,
                            format!("Nickname {nickname} is already taken."),
                        )),
                    );
                    return;
                }

                self.manager
                    .register(&player_id, &nickname, PlayerSink::new(conn_id, sink));
                tracing::info!(player_id = %player_id, conn_id, "Player joined.");
                player_id
            }
        };

        if let Some(conn) = self.connections.get_mut(&conn_id) {
            conn.player_id = Some(resolved.clone());
        }

        let token = self.manager.reconnect_token(&resolved);
        self.send_to_conn(
            conn_id,
            Message::JoinRoomAck(JoinRoomAckPayload::accepted(resolved.clone(), token)),
        );

        // A player joining mid-game sees their hand right away.
        if self.session.phase == SessionPhase::InGame {
            if let Some(pack) = self.active_pack.clone() {
                let view = pack.build_player_view(&self.session, &resolved);
                let frame = Envelope::new(Message::PlayerView(PlayerViewPayload {
                    player_view: view,
                }))
                .encode();
                self.manager.send(&resolved, &frame);
            }
        }

        self.broadcast_lobby();
    }

    /// The action pipeline: authenticate the turn, dedupe, validate against
    /// the pack, apply, end-check, fan out, persist.
    fn on_action(&mut self, conn_id: u64, action: ActionPayload) {
        let client_action_id = action
            .client_action_id
            .clone()
            .filter(|id| !id.is_empty());

        // 1. Duplicate check.
        if let Some(id) = &client_action_id {
            if self.cache.seen(id) {
                self.reject(
                    conn_id,
                    RejectCode::DuplicateAction,
                    format!("Action {id} was already processed."),
                    Some(id.clone()),
                );
                return;
            }
        }

        // 2. Phase check.
        let pack = match self.active_pack.clone() {
            Some(pack) if self.session.phase == SessionPhase::InGame => pack,
            _ => {
                self.reject(
                    conn_id,
                    RejectCode::PhaseMismatch,
                    "No game is running.".to_string(),
                    client_action_id,
                );
                return;
            }
        };

        // 3. Turn check.
        if self.session.active_player() != Some(action.player_id.as_str()) {
            self.reject(
                conn_id,
                RejectCode::NotYourTurn,
                "It is not your turn.".to_string(),
                client_action_id,
            );
            return;
        }

        // 4. Allowed-action check.
        let allowed = pack.allowed_actions(&self.session, &action.player_id);
        if !action_is_allowed(&allowed, &action) {
            self.reject(
                conn_id,
                RejectCode::InvalidAction,
                format!("Action {} is not allowed right now.", action.action_type),
                client_action_id,
            );
            return;
        }

        // 5. Record the id only after validation passed.
        if let Some(id) = &client_action_id {
            self.cache.add(id);
        }

        // 6./7. Apply; the pack bumps the version through the session log.
        self.session = pack.apply_action(self.session.clone(), &action.player_id, &action);
        debug_assert!(self.session.order_consistent());

        // 8. End check.
        let end = pack.check_game_end(&self.session);
        if end.ended && self.session.phase != SessionPhase::Finished {
            let mut finished = self.session.clone();
            finished.phase = SessionPhase::Finished;
            let winners = end.winner_ids.join(", ");
            self.session = finished.log_event("GAME_END", format!("Game over. Winners: {winners}."));
            tracing::info!(winners = %winners, "Game finished.");
        }

        // 9. Fan out the new state.
        self.fan_out(&pack);

        // 10. Best-effort persist.
        self.persist();
    }

    fn on_leave(&mut self, leave: LeavePayload) {
        if !self.manager.contains(&leave.player_id) {
            return;
        }
        self.manager.unregister(&leave.player_id);
        for conn in self.connections.values_mut() {
            if conn.player_id.as_deref() == Some(leave.player_id.as_str()) {
                conn.player_id = None;
            }
        }
        tracing::info!(player_id = %leave.player_id, "Player left the room.");

        let frame = Envelope::new(Message::Leave(LeavePayload::new(leave.player_id.as_str())))
            .encode();
        self.manager.broadcast(&frame, None);
        self.broadcast_lobby();
    }

    /// Orphan cleanup. Only the connection currently attached to the seat
    /// may mark it offline; a socket superseded by a reconnect changes
    /// nothing when it finally closes.
    fn on_closed(&mut self, conn_id: u64) {
        let Some(connection) = self.connections.remove(&conn_id) else {
            return;
        };
        let Some(player_id) = connection.player_id else {
            return;
        };
        if self.manager.sink_conn_id(&player_id) != Some(conn_id) {
            return;
        }
        if !self.manager.is_connected(&player_id) {
            return;
        }

        self.manager.mark_disconnected(&player_id);
        tracing::info!(player_id = %player_id, conn_id, "Connection lost, seat kept.");
        if self.session.phase == SessionPhase::InGame {
            self.persist();
        }
        self.broadcast_lobby();
    }

    fn start_game(&mut self, pack_id: Option<String>, requested_by: Option<u64>) {
        if self.session.phase != SessionPhase::Lobby {
            tracing::warn!("Ignoring game start outside the lobby.");
            if let Some(conn_id) = requested_by {
                self.send_to_conn(
                    conn_id,
                    Message::Error(ErrorPayload {
                        reason: "A game is already running.".to_string(),
                    }),
                );
            }
            return;
        }
        let order = self.manager.connected_player_ids();
        if order.is_empty() {
            tracing::warn!("Ignoring game start without connected players.");
            if let Some(conn_id) = requested_by {
                self.send_to_conn(
                    conn_id,
                    Message::Error(ErrorPayload {
                        reason: "No connected players.".to_string(),
                    }),
                );
            }
            return;
        }

        let pack = self.registry.select(pack_id.as_deref());
        let mut session = self.session.clone();
        session.player_order = order;
        session.players = self.manager.seat_states();
        self.session = pack.create_initial_game_state(session);
        debug_assert!(self.session.order_consistent());
        tracing::info!(
            pack_id = pack.pack_id(),
            players = self.session.player_order.len(),
            "Game started."
        );

        self.active_pack = Some(pack.clone());
        self.fan_out(&pack);
        self.persist();
    }

    /// One board view to everyone, then one player view to each connected
    /// seat, all carrying the same version.
    fn fan_out(&mut self, pack: &Arc<dyn GamePackRules>) {
        let board_view = pack.build_board_view(&self.session);
        let frame =
            Envelope::new(Message::BoardView(BoardViewPayload { board_view })).encode();
        self.manager.broadcast(&frame, None);

        for player_id in self.manager.connected_player_ids() {
            let player_view = pack.build_player_view(&self.session, &player_id);
            let frame =
                Envelope::new(Message::PlayerView(PlayerViewPayload { player_view })).encode();
            self.manager.send(&player_id, &frame);
        }
    }

    fn broadcast_lobby(&mut self) {
        let lobby = self.manager.build_lobby_state();
        let frame = Envelope::new(Message::LobbyState(lobby)).encode();
        self.manager.broadcast(&frame, None);
    }

    fn reject(
        &mut self,
        conn_id: u64,
        code: RejectCode,
        reason: String,
        client_action_id: Option<String>,
    ) {
        tracing::debug!(conn_id, ?code, %reason, "Action rejected.");
        self.send_to_conn(
            conn_id,
            Message::ActionRejected(ActionRejectedPayload {
                reason,
                code,
                client_action_id,
            }),
        );
    }

    fn send_to_conn(&self, conn_id: u64, message: Message) {
        if let Some(connection) = self.connections.get(&conn_id) {
            let frame = Envelope::new(message).encode();
            if connection.sink.try_send(frame).is_err() {
                tracing::warn!(conn_id, "Dropping reply for slow or closed connection.");
            }
        }
    }

    fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let store = store.clone();
        let session = self.session.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(error) = store.save(&session) {
                tracing::debug!(%error, "Ignoring failed session save.");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{MessageType, PingPayload, SetReadyPayload, StartGamePayload};
    use session_lib::{CardTablePack, MemoryStore};

    struct TestConn {
        conn_id: u64,
        rx: mpsc::Receiver<String>,
    }

    impl TestConn {
        fn drain(&mut self) -> Vec<Envelope> {
            let mut frames = Vec::new();
            while let Ok(text) = self.rx.try_recv() {
                frames.push(Envelope::decode(&text).unwrap());
            }
            frames
        }

        fn last_of(&mut self, message_type: MessageType) -> Option<Message> {
            self.drain()
                .into_iter()
                .map(|e| e.message)
                .filter(|m| m.message_type() == message_type)
                .last()
        }
    }

    fn task_with_store() -> (SessionTask, MemoryStore) {
        let store = MemoryStore::new();
        let registry = PackRegistry::new(Arc::new(CardTablePack::seeded(7)));
        let task = SessionTask::new("s-test", registry, Some(Arc::new(store.clone())), 8);
        (task, store)
    }

    fn task() -> SessionTask {
        task_with_store().0
    }

    fn connect(task: &mut SessionTask, conn_id: u64) -> TestConn {
        let (tx, rx) = mpsc::channel(protocol::CHANNEL_BUFFER_SIZE);
        task.handle(SessionCommand::Connected { conn_id, sink: tx });
        TestConn { conn_id, rx }
    }

    fn send(task: &mut SessionTask, conn: &TestConn, message: Message) {
        task.handle(SessionCommand::Frame {
            conn_id: conn.conn_id,
            text: Envelope::new(message).encode(),
        });
    }

    fn join(task: &mut SessionTask, conn: &mut TestConn, player_id: &str, name: &str) -> String {
        let mut payload = JoinPayload::new(player_id);
        payload.display_name = Some(name.to_string());
        send(task, conn, Message::Join(payload));
        match conn.last_of(MessageType::JoinRoomAck) {
            Some(Message::JoinRoomAck(ack)) => {
                assert!(ack.success, "expected a successful join");
                ack.reconnect_token.unwrap()
            }
            other => panic!("expected JOIN_ROOM_ACK, got {other:?}"),
        }
    }

    fn start_two_player_game(task: &mut SessionTask) -> (TestConn, TestConn) {
        let mut c1 = connect(task, 1);
        let mut c2 = connect(task, 2);
        join(task, &mut c1, "p1", "Alice");
        join(task, &mut c2, "p2", "Bob");
        task.handle(SessionCommand::StartGame { pack_id: None });
        (c1, c2)
    }

    fn action(player_id: &str, action_type: &str, client_action_id: Option<&str>) -> Message {
        Message::Action(ActionPayload {
            player_id: player_id.to_string(),
            action_type: action_type.to_string(),
            data: serde_json::Map::new(),
            client_action_id: client_action_id.map(str::to_string),
        })
    }

    #[tokio::test]
    async fn join_acks_and_broadcasts_the_lobby() {
        let mut task = task();
        let mut c1 = connect(&mut task, 1);

        let mut payload = JoinPayload::new("p1");
        payload.display_name = Some("Alice".to_string());
        send(&mut task, &c1, Message::Join(payload));

        let frames = c1.drain();
        let ack = frames
            .iter()
            .find_map(|e| match &e.message {
                Message::JoinRoomAck(ack) => Some(ack.clone()),
                _ => None,
            })
            .expect("missing JOIN_ROOM_ACK");
        assert!(ack.success);
        assert!(!ack.reconnect_token.unwrap().is_empty());

        let lobby = frames
            .iter()
            .find_map(|e| match &e.message {
                Message::LobbyState(lobby) => Some(lobby.clone()),
                _ => None,
            })
            .expect("missing LOBBY_STATE");
        assert_eq!(lobby.players.len(), 1);
        assert_eq!(lobby.players[0].nickname, "Alice");
        assert!(!lobby.can_start);
    }

    #[tokio::test]
    async fn ready_toggles_flip_can_start() {
        let mut task = task();
        let mut c1 = connect(&mut task, 1);
        let mut c2 = connect(&mut task, 2);
        join(&mut task, &mut c1, "p1", "Alice");
        join(&mut task, &mut c2, "p2", "Bob");

        send(
            &mut task,
            &c1,
            Message::SetReady(SetReadyPayload {
                player_id: "p1".into(),
                is_ready: true,
            }),
        );
        send(
            &mut task,
            &c2,
            Message::SetReady(SetReadyPayload {
                player_id: "p2".into(),
                is_ready: true,
            }),
        );

        match c1.last_of(MessageType::LobbyState) {
            Some(Message::LobbyState(lobby)) => {
                assert!(lobby.can_start);
                assert_eq!(lobby.players.len(), 2);
            }
            other => panic!("expected LOBBY_STATE, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn room_cap_refuses_the_extra_seat() {
        let registry = PackRegistry::new(Arc::new(CardTablePack::seeded(7)));
        let mut task = SessionTask::new("s-test", registry, None, 1);
        let mut c1 = connect(&mut task, 1);
        let mut c2 = connect(&mut task, 2);
        join(&mut task, &mut c1, "p1", "Alice");

        send(&mut task, &c2, Message::Join(JoinPayload::new("p2")));
        match c2.last_of(MessageType::JoinRoomAck) {
            Some(Message::JoinRoomAck(ack)) => {
                assert!(!ack.success);
                assert_eq!(ack.error_code, Some(JoinErrorCode::RoomFull));
            }
            other => panic!("expected refusal, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn duplicate_nickname_is_refused() {
        let mut task = task();
        let mut c1 = connect(&mut task, 1);
        let mut c2 = connect(&mut task, 2);
        join(&mut task, &mut c1, "p1", "Alice");

        let mut payload = JoinPayload::new("p2");
        payload.display_name = Some("Alice".to_string());
        send(&mut task, &c2, Message::Join(payload));
        match c2.last_of(MessageType::JoinRoomAck) {
            Some(Message::JoinRoomAck(ack)) => {
                assert!(!ack.success);
                assert_eq!(ack.error_code, Some(JoinErrorCode::NicknameTaken));
            }
            other => panic!("expected refusal, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn a_token_reclaims_the_seat_under_a_new_player_id() {
        let mut task = task();
        let mut c1 = connect(&mut task, 1);
        let token = join(&mut task, &mut c1, "p1", "Alice");
        task.handle(SessionCommand::Closed { conn_id: 1 });

        let mut c3 = connect(&mut task, 3);
        let mut payload = JoinPayload::new("ignored-id");
        payload.display_name = Some("Alice".to_string());
        payload.reconnect_token = Some(token.clone());
        send(&mut task, &c3, Message::Join(payload));

        match c3.last_of(MessageType::JoinRoomAck) {
            Some(Message::JoinRoomAck(ack)) => {
                assert!(ack.success);
                assert_eq!(ack.player_id.as_deref(), Some("p1"));
                assert_eq!(ack.reconnect_token.as_deref(), Some(token.as_str()));
            }
            other => panic!("expected JOIN_ROOM_ACK, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn an_unknown_token_falls_back_to_a_fresh_join() {
        let mut task = task();
        let mut c1 = connect(&mut task, 1);
        let mut payload = JoinPayload::new("p9");
        payload.reconnect_token = Some("not-a-real-token".to_string());
        send(&mut task, &c1, Message::Join(payload));

        match c1.last_of(MessageType::JoinRoomAck) {
            Some(Message::JoinRoomAck(ack)) => {
                assert!(ack.success);
                assert_eq!(ack.player_id.as_deref(), Some("p9"));
            }
            other => panic!("expected JOIN_ROOM_ACK, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn lobby_actions_hit_phase_mismatch() {
        let mut task = task();
        let mut c1 = connect(&mut task, 1);
        join(&mut task, &mut c1, "p1", "Alice");

        send(&mut task, &c1, action("p1", "END_TURN", None));
        match c1.last_of(MessageType::ActionRejected) {
            Some(Message::ActionRejected(rejected)) => {
                assert_eq!(rejected.code, RejectCode::PhaseMismatch);
            }
            other => panic!("expected ACTION_REJECTED, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn game_start_fans_out_both_views() {
        let mut task = task();
        let (mut c1, mut c2) = start_two_player_game(&mut task);

        for conn in [&mut c1, &mut c2] {
            let frames = conn.drain();
            let board = frames
                .iter()
                .find(|e| e.message.message_type() == MessageType::BoardView);
            let player = frames
                .iter()
                .find(|e| e.message.message_type() == MessageType::PlayerView);
            assert!(board.is_some(), "missing board view");
            assert!(player.is_some(), "missing player view");
        }
    }

    #[tokio::test]
    async fn off_turn_actions_are_rejected_without_a_version_change() {
        let mut task = task();
        let (_c1, mut c2) = start_two_player_game(&mut task);
        let version_before = task.session.version;

        send(&mut task, &c2, action("p2", "END_TURN", Some("p2-001")));
        match c2.last_of(MessageType::ActionRejected) {
            Some(Message::ActionRejected(rejected)) => {
                assert_eq!(rejected.code, RejectCode::NotYourTurn);
            }
            other => panic!("expected ACTION_REJECTED, got {other:?}"),
        }
        assert_eq!(task.session.version, version_before);
    }

    #[tokio::test]
    async fn duplicate_actions_are_rejected_without_a_version_change() {
        let mut task = task();
        let (mut c1, _c2) = start_two_player_game(&mut task);

        send(&mut task, &c1, action("p1", "END_TURN", Some("u-001")));
        let version_after_first = task.session.version;
        assert!(c1
            .drain()
            .iter()
            .any(|e| e.message.message_type() == MessageType::PlayerView));

        send(&mut task, &c1, action("p1", "END_TURN", Some("u-001")));
        match c1.last_of(MessageType::ActionRejected) {
            Some(Message::ActionRejected(rejected)) => {
                assert_eq!(rejected.code, RejectCode::DuplicateAction);
                assert_eq!(rejected.client_action_id.as_deref(), Some("u-001"));
            }
            other => panic!("expected ACTION_REJECTED, got {other:?}"),
        }
        assert_eq!(task.session.version, version_after_first);
    }

    #[tokio::test]
    async fn unlisted_actions_are_rejected_as_invalid() {
        let mut task = task();
        let (mut c1, _c2) = start_two_player_game(&mut task);

        send(&mut task, &c1, action("p1", "CHEAT", None));
        match c1.last_of(MessageType::ActionRejected) {
            Some(Message::ActionRejected(rejected)) => {
                assert_eq!(rejected.code, RejectCode::InvalidAction);
            }
            other => panic!("expected ACTION_REJECTED, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn ping_is_echoed_to_the_sender_only() {
        let mut task = task();
        let mut c1 = connect(&mut task, 1);
        let mut c2 = connect(&mut task, 2);
        join(&mut task, &mut c1, "p1", "Alice");
        join(&mut task, &mut c2, "p2", "Bob");
        c2.drain();

        send(
            &mut task,
            &c1,
            Message::Ping(PingPayload {
                timestamp: 1_234_567_890,
            }),
        );
        match c1.last_of(MessageType::Pong) {
            Some(Message::Pong(pong)) => assert_eq!(pong.timestamp, 1_234_567_890),
            other => panic!("expected PONG, got {other:?}"),
        }
        assert!(c2.last_of(MessageType::Pong).is_none());
    }

    #[tokio::test]
    async fn leave_drops_the_seat_and_notifies_the_rest() {
        let mut task = task();
        let mut c1 = connect(&mut task, 1);
        let mut c2 = connect(&mut task, 2);
        join(&mut task, &mut c1, "p1", "Alice");
        join(&mut task, &mut c2, "p2", "Bob");
        c2.drain();

        send(&mut task, &c1, Message::Leave(LeavePayload::new("p1")));
        let frames = c2.drain();
        let leave = frames
            .iter()
            .find_map(|e| match &e.message {
                Message::Leave(leave) => Some(leave.clone()),
                _ => None,
            })
            .expect("missing LEAVE broadcast");
        assert_eq!(leave.player_id, "p1");

        let lobby = frames
            .iter()
            .rev()
            .find_map(|e| match &e.message {
                Message::LobbyState(lobby) => Some(lobby.clone()),
                _ => None,
            })
            .expect("missing LOBBY_STATE");
        assert_eq!(lobby.players.len(), 1);
        assert_eq!(lobby.players[0].player_id, "p2");
    }

    #[tokio::test]
    async fn a_dropped_socket_keeps_the_seat_as_disconnected() {
        let mut task = task();
        let mut c1 = connect(&mut task, 1);
        let mut c2 = connect(&mut task, 2);
        join(&mut task, &mut c1, "p1", "Alice");
        join(&mut task, &mut c2, "p2", "Bob");

        task.handle(SessionCommand::Closed { conn_id: 1 });
        match c2.last_of(MessageType::LobbyState) {
            Some(Message::LobbyState(lobby)) => {
                let p1 = lobby
                    .players
                    .iter()
                    .find(|p| p.player_id == "p1")
                    .expect("p1 keeps a seat");
                assert!(!p1.is_connected);
            }
            other => panic!("expected LOBBY_STATE, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn a_superseded_socket_close_changes_nothing() {
        let mut task = task();
        let mut c1 = connect(&mut task, 1);
        let token = join(&mut task, &mut c1, "p1", "Alice");

        // The player reconnects on a new socket before the old one closes.
        let mut c2 = connect(&mut task, 2);
        let mut payload = JoinPayload::new("p1");
        payload.reconnect_token = Some(token);
        send(&mut task, &c2, Message::Join(payload));
        c2.drain();

        task.handle(SessionCommand::Closed { conn_id: 1 });
        assert!(task.manager.is_connected("p1"));
        assert!(c2.last_of(MessageType::LobbyState).is_none());
    }

    #[tokio::test]
    async fn malformed_frames_get_an_error_and_keep_the_socket() {
        let mut task = task();
        let mut c1 = connect(&mut task, 1);

        task.handle(SessionCommand::Frame {
            conn_id: 1,
            text: "this is not json".to_string(),
        });
        assert!(c1.last_of(MessageType::Error).is_some());

        // Socket still works afterwards.
        join(&mut task, &mut c1, "p1", "Alice");
    }

    #[tokio::test]
    async fn a_mid_game_reconnect_sees_its_hand_immediately() {
        let mut task = task();
        let (mut c1, _c2) = start_two_player_game(&mut task);
        let token = {
            let snapshot = task.session.players.get("p1").unwrap();
            snapshot.reconnect_token.clone()
        };
        c1.drain();
        task.handle(SessionCommand::Closed { conn_id: 1 });

        let mut c3 = connect(&mut task, 3);
        let mut payload = JoinPayload::new("whatever");
        payload.reconnect_token = Some(token);
        send(&mut task, &c3, Message::Join(payload));

        match c3.last_of(MessageType::PlayerView) {
            Some(Message::PlayerView(view)) => {
                assert_eq!(view.player_view.player_id, "p1");
                assert_eq!(view.player_view.hand.len(), 5);
            }
            other => panic!("expected PLAYER_VIEW, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn start_game_is_accepted_over_the_wire_once() {
        let mut task = task();
        let mut c1 = connect(&mut task, 1);
        join(&mut task, &mut c1, "p1", "Alice");

        send(
            &mut task,
            &c1,
            Message::StartGame(StartGamePayload { pack_id: None }),
        );
        assert_eq!(task.session.phase, SessionPhase::InGame);
        assert!(c1
            .drain()
            .iter()
            .any(|e| e.message.message_type() == MessageType::BoardView));

        // A second start is refused with a soft error.
        send(
            &mut task,
            &c1,
            Message::StartGame(StartGamePayload { pack_id: None }),
        );
        assert!(c1.last_of(MessageType::Error).is_some());
    }

    #[tokio::test]
    async fn actions_persist_the_session_best_effort() {
        let (mut task, store) = task_with_store();
        let (mut c1, _c2) = start_two_player_game(&mut task);

        send(&mut task, &c1, action("p1", "END_TURN", None));
        c1.drain();
        // The save runs on a blocking task; give it a moment.
        for _ in 0..50 {
            if store.row_count() > 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let saved = store.load("s-test").unwrap().expect("session was saved");
        assert_eq!(saved.session_id, "s-test");
        assert!(saved.version > 0);
    }
}
