//! Matchmaking & relay engine.
//!
//! Pairs waiting connections into rooms, relays negotiation and chat
//! frames between room partners, and tears pairings down on hangup or
//! disconnect. All queue / room / registry mutations triggered by one
//! inbound event happen under a single lock, so no other event can
//! observe partial state. Outbound events are pushed while that lock is
//! still held: a push is a non-blocking unbounded-channel send (no I/O
//! waits under the lock, a slow client never stalls matchmaking), and
//! emitting inside the lock keeps each client's event order consistent
//! with the state transitions that produced it. Releasing the lock
//! first would let a competing operation deliver, say, `matched` to a
//! client before that client's own `waiting` acknowledgment.
//!
//! Malformed or out-of-order requests (duplicate find-match, relay to a
//! stale room, end-call while idle) degrade to silent no-ops: the
//! dominant failure mode is benign raciness around disconnects, not
//! client error.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use tsugai_shared::time::now_unix_millis;

use crate::domain::{
    ConnectionId, ConnectionRegistry, DisplayName, MessagePusher, Participant, PusherChannel,
    Room, RoomId, WaitEntry, WaitQueue,
};
use crate::infrastructure::dto::websocket::ServerEvent;

/// Kind of an opaque negotiation frame relayed between room partners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

/// Counters reported by the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    /// Currently connected clients.
    pub connected: usize,
    /// Connections in the wait queue.
    pub waiting: usize,
    /// Active two-party calls.
    pub active_calls: usize,
    /// Enqueue time (unix millis) of the longest-waiting connection.
    pub oldest_waiting_since: Option<i64>,
}

/// Registry, wait queue and room map, guarded together.
#[derive(Default)]
struct EngineState {
    registry: ConnectionRegistry,
    wait_queue: WaitQueue,
    rooms: HashMap<RoomId, Room>,
}

/// The matchmaking and relay engine.
///
/// One instance serves all connections. State lives behind a single
/// `Mutex`, injected `MessagePusher` handles delivery.
pub struct MatchmakingEngine {
    state: Mutex<EngineState>,
    pusher: Arc<dyn MessagePusher>,
}

impl MatchmakingEngine {
    pub fn new(pusher: Arc<dyn MessagePusher>) -> Self {
        Self {
            state: Mutex::new(EngineState::default()),
            pusher,
        }
    }

    /// Register a newly accepted transport connection and tell the client
    /// its server-assigned id.
    pub async fn connect(&self, connection_id: ConnectionId, sender: PusherChannel) {
        {
            let mut state = self.state.lock().await;
            state.registry.register(connection_id.clone());
        }
        self.pusher
            .register_client(connection_id.clone(), sender)
            .await;

        tracing::info!("Client '{}' connected and registered", connection_id);

        self.emit(
            &connection_id,
            ServerEvent::Connected {
                connection_id: connection_id.as_str().to_string(),
            },
        )
        .await;
    }

    /// Find a partner for `connection_id`, or enqueue it.
    ///
    /// Ignored if the connection is already waiting or paired (tolerates
    /// duplicate client-side triggers). Selection is oldest-waiting-first.
    /// The requester of the successful match is the initiator.
    pub async fn find_match(&self, connection_id: &ConnectionId, name: Option<String>) {
        let display_name = DisplayName::from_option(name);

        // Lock held through emission, see the module docs.
        let mut state = self.state.lock().await;

        if !state.registry.contains(connection_id) {
            tracing::warn!(
                "find-match from unregistered connection '{}', ignoring",
                connection_id
            );
            return;
        }
        if state.registry.is_waiting(connection_id) || state.registry.is_paired(connection_id) {
            tracing::debug!("Duplicate find-match from '{}', ignoring", connection_id);
            return;
        }

        match state.wait_queue.claim_partner(connection_id) {
            Some(partner) => {
                let room = Room::create(
                    Participant {
                        connection_id: connection_id.clone(),
                        display_name: display_name.clone(),
                    },
                    Participant {
                        connection_id: partner.connection_id.clone(),
                        display_name: partner.display_name.clone(),
                    },
                );
                let room_id = room.id.clone();

                state.registry.mark_paired(connection_id, room_id.clone());
                state
                    .registry
                    .mark_paired(&partner.connection_id, room_id.clone());
                state.rooms.insert(room_id.clone(), room);

                tracing::info!(
                    "Matched '{}' with '{}' in room '{}'",
                    connection_id,
                    partner.connection_id,
                    room_id
                );

                self.emit(
                    connection_id,
                    ServerEvent::Matched {
                        room_id: room_id.as_str().to_string(),
                        partner_id: partner.connection_id.as_str().to_string(),
                        partner_name: partner.display_name.as_str().to_string(),
                        is_initiator: true,
                    },
                )
                .await;
                self.emit(
                    &partner.connection_id,
                    ServerEvent::Matched {
                        room_id: room_id.as_str().to_string(),
                        partner_id: connection_id.as_str().to_string(),
                        partner_name: display_name.as_str().to_string(),
                        is_initiator: false,
                    },
                )
                .await;
            }
            None => {
                state
                    .wait_queue
                    .enqueue(WaitEntry::new(connection_id.clone(), display_name));
                state.registry.mark_waiting(connection_id);

                tracing::info!("Client '{}' is waiting for a partner", connection_id);

                self.emit(connection_id, ServerEvent::Waiting).await;
            }
        }
    }

    /// Leave the wait queue. Silent no-op if not queued. No event emitted.
    pub async fn cancel_match(&self, connection_id: &ConnectionId) {
        let mut state = self.state.lock().await;
        if state.wait_queue.remove(connection_id) {
            state.registry.mark_idle(connection_id);
            tracing::info!("Client '{}' cancelled matchmaking", connection_id);
        }
    }

    /// Relay an opaque negotiation frame to the sender's room partner.
    ///
    /// Dropped silently unless the sender is a participant of `room_id`;
    /// late frames after teardown are expected, not an error.
    pub async fn relay_signal(
        &self,
        connection_id: &ConnectionId,
        kind: SignalKind,
        payload: Value,
        room_id: &RoomId,
    ) {
        let state = self.state.lock().await;
        let Some(target) = Self::partner_in_room(&state, connection_id, room_id) else {
            tracing::debug!(
                "Dropping {:?} from '{}' for stale or foreign room '{}'",
                kind,
                connection_id,
                room_id
            );
            return;
        };

        let from = connection_id.as_str().to_string();
        let event = match kind {
            SignalKind::Offer => ServerEvent::Offer {
                offer: payload,
                from,
            },
            SignalKind::Answer => ServerEvent::Answer {
                answer: payload,
                from,
            },
            SignalKind::IceCandidate => ServerEvent::IceCandidate {
                candidate: payload,
                from,
            },
        };

        tracing::debug!(
            "Relaying {:?} from '{}' to '{}' in room '{}'",
            kind,
            connection_id,
            target,
            room_id
        );
        self.emit(&target, event).await;
    }

    /// Relay a chat message to the sender's room partner, annotated with
    /// the sender id and a server-assigned timestamp. No echo back.
    pub async fn relay_chat(
        &self,
        connection_id: &ConnectionId,
        message: String,
        sender_name: Option<String>,
        room_id: &RoomId,
    ) {
        let state = self.state.lock().await;
        let Some(target) = Self::partner_in_room(&state, connection_id, room_id) else {
            tracing::debug!(
                "Dropping chat from '{}' for stale or foreign room '{}'",
                connection_id,
                room_id
            );
            return;
        };

        let event = ServerEvent::ChatMessage {
            message,
            sender_name: DisplayName::from_option(sender_name).as_str().to_string(),
            sender_id: connection_id.as_str().to_string(),
            timestamp: now_unix_millis(),
        };
        self.emit(&target, event).await;
    }

    /// Hang up: notify the partner, destroy the room, mark both idle.
    ///
    /// Silent no-op (and idempotent) if the connection is not paired.
    pub async fn end_call(&self, connection_id: &ConnectionId) {
        let mut state = self.state.lock().await;
        let emissions = Self::teardown_pairing(&mut state, connection_id);
        self.emit_all(emissions).await;
    }

    /// Transport-level disconnect.
    ///
    /// Removes the connection from the wait queue if waiting, performs
    /// end-call teardown if paired, then discards all registry state.
    /// Safe for connections that never issued a request, and safe to
    /// invoke twice.
    pub async fn disconnect(&self, connection_id: &ConnectionId) {
        let mut state = self.state.lock().await;

        state.wait_queue.remove(connection_id);
        let emissions = Self::teardown_pairing(&mut state, connection_id);
        state.registry.unregister(connection_id);
        self.emit_all(emissions).await;
        drop(state);

        self.pusher.unregister_client(connection_id).await;
        tracing::info!("Client '{}' disconnected", connection_id);
    }

    /// Whether the connection is currently in the wait queue.
    pub async fn is_waiting(&self, connection_id: &ConnectionId) -> bool {
        self.state.lock().await.registry.is_waiting(connection_id)
    }

    /// Whether the connection is currently paired in a room.
    pub async fn is_paired(&self, connection_id: &ConnectionId) -> bool {
        self.state.lock().await.registry.is_paired(connection_id)
    }

    /// Counters for the status endpoint.
    pub async fn stats(&self) -> EngineStats {
        let state = self.state.lock().await;
        EngineStats {
            connected: state.registry.len(),
            waiting: state.wait_queue.len(),
            active_calls: state.rooms.len(),
            oldest_waiting_since: state.wait_queue.oldest_enqueued_at(),
        }
    }

    /// Destroy the pairing of `connection_id`, if any: both sides go
    /// idle atomically and the surviving partner gets `call-ended`.
    fn teardown_pairing(
        state: &mut EngineState,
        connection_id: &ConnectionId,
    ) -> Vec<(ConnectionId, ServerEvent)> {
        let Some(room_id) = state.registry.paired_room(connection_id) else {
            return Vec::new();
        };
        let Some(room) = state.rooms.remove(&room_id) else {
            // Registry said paired but the room is gone. Should not
            // happen while all mutations share one lock; recover by
            // going idle.
            tracing::warn!(
                "Room '{}' missing during teardown for '{}'",
                room_id,
                connection_id
            );
            state.registry.mark_idle(connection_id);
            return Vec::new();
        };

        for participant in room.participants() {
            state.registry.mark_idle(&participant.connection_id);
        }

        tracing::info!("Room '{}' destroyed", room_id);

        room.partner_of(connection_id)
            .map(|partner| (partner.connection_id.clone(), ServerEvent::CallEnded))
            .into_iter()
            .collect()
    }

    /// Resolve the partner of `connection_id` in `room_id`, or `None` if
    /// the room does not exist or the connection is not its participant.
    fn partner_in_room(
        state: &EngineState,
        connection_id: &ConnectionId,
        room_id: &RoomId,
    ) -> Option<ConnectionId> {
        let room = state.rooms.get(room_id)?;
        room.partner_of(connection_id)
            .map(|p| p.connection_id.clone())
    }

    async fn emit(&self, target: &ConnectionId, event: ServerEvent) {
        let json = match serde_json::to_string(&event) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to serialize event for '{}': {}", target, e);
                return;
            }
        };
        if let Err(e) = self.pusher.push_to(target, &json).await {
            tracing::warn!("Failed to push event to '{}': {}", target, e);
        }
    }

    async fn emit_all(&self, emissions: Vec<(ConnectionId, ServerEvent)>) {
        for (target, event) in emissions {
            self.emit(&target, event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MockMessagePusher;
    use crate::infrastructure::message_pusher::WebSocketMessagePusher;
    use serde_json::{Value, json};
    use tokio::sync::mpsc;

    /// Engine wired to a real channel-backed pusher; tests read the
    /// receiving end of each peer's channel.
    fn create_test_engine() -> MatchmakingEngine {
        MatchmakingEngine::new(Arc::new(WebSocketMessagePusher::new()))
    }

    /// Connect a peer and drain its `connected` event.
    async fn connect_peer(engine: &MatchmakingEngine) -> (ConnectionId, mpsc::UnboundedReceiver<String>) {
        let connection_id = ConnectionId::generate();
        let (tx, mut rx) = mpsc::unbounded_channel();
        engine.connect(connection_id.clone(), tx).await;

        let connected = next_event(&mut rx);
        assert_eq!(connected["type"], "connected");
        assert_eq!(connected["connectionId"], connection_id.as_str());

        (connection_id, rx)
    }

    /// Pop the next already-delivered event. Pushes happen synchronously
    /// on the unbounded channel, so anything emitted by a completed
    /// engine call is available immediately.
    fn next_event(rx: &mut mpsc::UnboundedReceiver<String>) -> Value {
        let raw = rx.try_recv().expect("expected a delivered event");
        serde_json::from_str(&raw).expect("event should be valid JSON")
    }

    fn assert_no_event(rx: &mut mpsc::UnboundedReceiver<String>) {
        assert!(rx.try_recv().is_err(), "expected no event");
    }

    /// Pair two fresh peers: the first waits, the second's request
    /// completes the match (so the second is the initiator).
    async fn connect_and_pair(
        engine: &MatchmakingEngine,
    ) -> (
        (ConnectionId, mpsc::UnboundedReceiver<String>),
        (ConnectionId, mpsc::UnboundedReceiver<String>),
        RoomId,
    ) {
        let (x, mut x_rx) = connect_peer(engine).await;
        let (y, mut y_rx) = connect_peer(engine).await;

        engine.find_match(&x, Some("x".to_string())).await;
        assert_eq!(next_event(&mut x_rx)["type"], "waiting");

        engine.find_match(&y, Some("y".to_string())).await;
        let matched_y = next_event(&mut y_rx);
        let matched_x = next_event(&mut x_rx);
        assert_eq!(matched_y["type"], "matched");
        assert_eq!(matched_x["type"], "matched");
        let room_id = RoomId::new(matched_y["roomId"].as_str().unwrap());

        ((x, x_rx), (y, y_rx), room_id)
    }

    #[tokio::test]
    async fn test_find_match_with_empty_queue_acknowledges_waiting() {
        // テスト項目: 待機者がいない場合は waiting が返る
        // given:
        let engine = create_test_engine();
        let (x, mut x_rx) = connect_peer(&engine).await;

        // when:
        engine.find_match(&x, Some("alice".to_string())).await;

        // then: requester gets waiting, nothing else
        assert_eq!(next_event(&mut x_rx)["type"], "waiting");
        assert_no_event(&mut x_rx);
        assert!(engine.is_waiting(&x).await);

        let stats = engine.stats().await;
        assert_eq!(stats.waiting, 1);
        assert!(stats.oldest_waiting_since.is_some());
    }

    #[tokio::test]
    async fn test_second_requester_pairs_with_waiting_peer() {
        // Scenario A: X waits, Y's request pairs them.
        // given:
        let engine = create_test_engine();
        let (x, mut x_rx) = connect_peer(&engine).await;
        let (y, mut y_rx) = connect_peer(&engine).await;

        engine.find_match(&x, Some("alice".to_string())).await;
        assert_eq!(next_event(&mut x_rx)["type"], "waiting");

        // when:
        engine.find_match(&y, Some("bob".to_string())).await;

        // then: Y (the successful requester) is the initiator
        let matched_y = next_event(&mut y_rx);
        assert_eq!(matched_y["type"], "matched");
        assert_eq!(matched_y["partnerId"], x.as_str());
        assert_eq!(matched_y["partnerName"], "alice");
        assert_eq!(matched_y["isInitiator"], true);

        let matched_x = next_event(&mut x_rx);
        assert_eq!(matched_x["type"], "matched");
        assert_eq!(matched_x["partnerId"], y.as_str());
        assert_eq!(matched_x["partnerName"], "bob");
        assert_eq!(matched_x["isInitiator"], false);

        // both sides share the room id
        assert_eq!(matched_x["roomId"], matched_y["roomId"]);

        // queue drained, one active call
        let stats = engine.stats().await;
        assert_eq!(stats.waiting, 0);
        assert_eq!(stats.active_calls, 1);
        assert_eq!(stats.oldest_waiting_since, None);
        assert!(engine.is_paired(&x).await);
        assert!(engine.is_paired(&y).await);
    }

    #[tokio::test]
    async fn test_connections_pair_in_fifo_order_and_odd_one_waits() {
        // given: five connections requesting matches in order
        let engine = create_test_engine();
        let mut peers = Vec::new();
        for _ in 0..5 {
            peers.push(connect_peer(&engine).await);
        }

        // when:
        for (id, _) in &peers {
            engine.find_match(id, None).await;
        }

        // then: (0,1) and (2,3) are paired, 4 still waits
        let expected_partner = [1usize, 0, 3, 2];
        for (i, expected) in expected_partner.iter().enumerate() {
            // first event is waiting for even indexes, matched follows
            let mut event = next_event(&mut peers[i].1);
            if event["type"] == "waiting" {
                event = next_event(&mut peers[i].1);
            }
            assert_eq!(event["type"], "matched");
            assert_eq!(event["partnerId"], peers[*expected].0.as_str());
            // the later requester of each pair is the initiator
            assert_eq!(event["isInitiator"], i % 2 == 1);
        }

        let last = &mut peers[4];
        assert_eq!(next_event(&mut last.1)["type"], "waiting");
        assert_no_event(&mut last.1);
        assert!(engine.is_waiting(&last.0).await);

        let stats = engine.stats().await;
        assert_eq!(stats.active_calls, 2);
        assert_eq!(stats.waiting, 1);
    }

    #[tokio::test]
    async fn test_duplicate_find_match_while_waiting_is_ignored() {
        // given:
        let engine = create_test_engine();
        let (x, mut x_rx) = connect_peer(&engine).await;
        engine.find_match(&x, None).await;
        assert_eq!(next_event(&mut x_rx)["type"], "waiting");

        // when: the client triggers find-match again
        engine.find_match(&x, None).await;

        // then: no second ack, still queued exactly once
        assert_no_event(&mut x_rx);
        assert_eq!(engine.stats().await.waiting, 1);
    }

    #[tokio::test]
    async fn test_find_match_while_paired_is_ignored() {
        // given: a paired peer
        let engine = create_test_engine();
        let ((x, mut x_rx), _y, _room) = connect_and_pair(&engine).await;

        // when:
        engine.find_match(&x, None).await;

        // then: still paired, never queued
        assert_no_event(&mut x_rx);
        assert!(engine.is_paired(&x).await);
        assert_eq!(engine.stats().await.waiting, 0);
    }

    #[tokio::test]
    async fn test_find_match_never_pairs_a_connection_with_itself() {
        // given: x alone in the queue
        let engine = create_test_engine();
        let (x, mut x_rx) = connect_peer(&engine).await;
        engine.find_match(&x, None).await;
        assert_eq!(next_event(&mut x_rx)["type"], "waiting");
        engine.cancel_match(&x).await;

        // when: x requests again with an empty queue
        engine.find_match(&x, None).await;

        // then: waiting again, no self-pairing
        assert_eq!(next_event(&mut x_rx)["type"], "waiting");
        assert_eq!(engine.stats().await.active_calls, 0);
    }

    #[tokio::test]
    async fn test_cancel_match_removes_from_queue() {
        // Scenario D: cancel before a partner arrives.
        // given:
        let engine = create_test_engine();
        let (x, mut x_rx) = connect_peer(&engine).await;
        let (z, mut z_rx) = connect_peer(&engine).await;
        engine.find_match(&x, None).await;
        assert_eq!(next_event(&mut x_rx)["type"], "waiting");

        // when: x cancels, then z requests a match
        engine.cancel_match(&x).await;
        engine.find_match(&z, None).await;

        // then: no event for the cancel, z does not pair with x
        assert_no_event(&mut x_rx);
        assert_eq!(next_event(&mut z_rx)["type"], "waiting");
        assert!(!engine.is_waiting(&x).await);
        assert!(engine.is_waiting(&z).await);
    }

    #[tokio::test]
    async fn test_cancel_match_while_not_waiting_is_noop() {
        // given:
        let engine = create_test_engine();
        let (x, mut x_rx) = connect_peer(&engine).await;

        // when:
        engine.cancel_match(&x).await;

        // then:
        assert_no_event(&mut x_rx);
    }

    #[tokio::test]
    async fn test_signal_relay_reaches_partner_only() {
        // given: a paired room
        let engine = create_test_engine();
        let ((x, mut x_rx), (y, mut y_rx), room_id) = connect_and_pair(&engine).await;

        // when: the initiator sends an offer
        let offer = json!({"sdp": "v=0...", "kind": "offer"});
        engine
            .relay_signal(&y, SignalKind::Offer, offer.clone(), &room_id)
            .await;

        // then: x receives it annotated with the sender, y gets no echo
        let event = next_event(&mut x_rx);
        assert_eq!(event["type"], "offer");
        assert_eq!(event["offer"], offer);
        assert_eq!(event["from"], y.as_str());
        assert_no_event(&mut y_rx);

        // answer flows the other way
        engine
            .relay_signal(&x, SignalKind::Answer, json!({"sdp": "v=0..."}), &room_id)
            .await;
        let event = next_event(&mut y_rx);
        assert_eq!(event["type"], "answer");
        assert_eq!(event["from"], x.as_str());

        // and ICE candidates pass through opaquely
        engine
            .relay_signal(
                &x,
                SignalKind::IceCandidate,
                json!({"candidate": "candidate:0 1 UDP ..."}),
                &room_id,
            )
            .await;
        let event = next_event(&mut y_rx);
        assert_eq!(event["type"], "ice-candidate");
        assert_eq!(event["candidate"]["candidate"], "candidate:0 1 UDP ...");
    }

    #[tokio::test]
    async fn test_chat_relay_annotates_and_does_not_echo() {
        // Scenario B: chat "hi" from x reaches only y.
        // given:
        let engine = create_test_engine();
        let ((x, mut x_rx), (_y, mut y_rx), room_id) = connect_and_pair(&engine).await;

        // when:
        engine
            .relay_chat(&x, "hi".to_string(), Some("alice".to_string()), &room_id)
            .await;

        // then:
        let event = next_event(&mut y_rx);
        assert_eq!(event["type"], "chat-message");
        assert_eq!(event["message"], "hi");
        assert_eq!(event["senderName"], "alice");
        assert_eq!(event["senderId"], x.as_str());
        assert!(event["timestamp"].as_i64().unwrap() > 1_704_067_200_000);
        assert_no_event(&mut x_rx);
    }

    #[tokio::test]
    async fn test_relay_with_foreign_room_is_dropped() {
        // given: two independent rooms
        let engine = create_test_engine();
        let ((x, mut x_rx), (_y, mut y_rx), _room_xy) = connect_and_pair(&engine).await;
        let ((_a, mut a_rx), (_b, mut b_rx), room_ab) = connect_and_pair(&engine).await;

        // when: x relays into a room it does not belong to
        engine
            .relay_signal(&x, SignalKind::Offer, json!({}), &room_ab)
            .await;
        engine
            .relay_chat(&x, "hi".to_string(), None, &room_ab)
            .await;

        // then: dropped; nobody in either room receives anything
        assert_no_event(&mut x_rx);
        assert_no_event(&mut y_rx);
        assert_no_event(&mut a_rx);
        assert_no_event(&mut b_rx);
        assert_eq!(engine.stats().await.active_calls, 2);
    }

    #[tokio::test]
    async fn test_relay_with_unknown_room_is_dropped() {
        // given:
        let engine = create_test_engine();
        let ((x, mut x_rx), (_y, mut y_rx), _room) = connect_and_pair(&engine).await;

        // when:
        engine
            .relay_signal(&x, SignalKind::Offer, json!({}), &RoomId::new("nope"))
            .await;

        // then:
        assert_no_event(&mut x_rx);
        assert_no_event(&mut y_rx);
    }

    #[tokio::test]
    async fn test_end_call_notifies_partner_and_destroys_room() {
        // given:
        let engine = create_test_engine();
        let ((x, mut x_rx), (y, mut y_rx), room_id) = connect_and_pair(&engine).await;

        // when:
        engine.end_call(&x).await;

        // then: only the partner is notified
        assert_eq!(next_event(&mut y_rx)["type"], "call-ended");
        assert_no_event(&mut x_rx);

        // room destroyed, both idle
        assert!(!engine.is_paired(&x).await);
        assert!(!engine.is_paired(&y).await);
        assert_eq!(engine.stats().await.active_calls, 0);

        // late frames into the dead room are dropped
        engine
            .relay_signal(&y, SignalKind::Offer, json!({}), &room_id)
            .await;
        assert_no_event(&mut x_rx);
    }

    #[tokio::test]
    async fn test_end_call_is_idempotent() {
        // given: a call already ended by x
        let engine = create_test_engine();
        let ((x, mut x_rx), (_y, mut y_rx), _room) = connect_and_pair(&engine).await;
        engine.end_call(&x).await;
        assert_eq!(next_event(&mut y_rx)["type"], "call-ended");

        // when: x ends again
        engine.end_call(&x).await;

        // then: no second call-ended, no error
        assert_no_event(&mut y_rx);
        assert_no_event(&mut x_rx);
    }

    #[tokio::test]
    async fn test_end_call_while_idle_is_noop() {
        // given:
        let engine = create_test_engine();
        let (x, mut x_rx) = connect_peer(&engine).await;

        // when:
        engine.end_call(&x).await;

        // then:
        assert_no_event(&mut x_rx);
    }

    #[tokio::test]
    async fn test_disconnect_while_paired_strands_partner_cleanly() {
        // Scenario C: x disconnects mid-call.
        // given:
        let engine = create_test_engine();
        let ((x, _x_rx), (y, mut y_rx), room_id) = connect_and_pair(&engine).await;

        // when:
        engine.disconnect(&x).await;

        // then: y is told the call ended and reverts to idle
        assert_eq!(next_event(&mut y_rx)["type"], "call-ended");
        assert!(!engine.is_paired(&y).await);

        // y's late relays into the old room are dropped
        engine
            .relay_signal(&y, SignalKind::IceCandidate, json!({}), &room_id)
            .await;
        assert_no_event(&mut y_rx);

        // no automatic re-queuing: y must issue a fresh find-match
        assert!(!engine.is_waiting(&y).await);
        engine.find_match(&y, None).await;
        assert_eq!(next_event(&mut y_rx)["type"], "waiting");
    }

    #[tokio::test]
    async fn test_disconnect_while_waiting_removes_queue_entry() {
        // given:
        let engine = create_test_engine();
        let (x, mut x_rx) = connect_peer(&engine).await;
        let (z, mut z_rx) = connect_peer(&engine).await;
        engine.find_match(&x, None).await;
        assert_eq!(next_event(&mut x_rx)["type"], "waiting");

        // when: x drops, then z requests
        engine.disconnect(&x).await;
        engine.find_match(&z, None).await;

        // then: z cannot pair with the departed x
        assert_eq!(next_event(&mut z_rx)["type"], "waiting");
        assert_eq!(engine.stats().await.waiting, 1);
        assert_eq!(engine.stats().await.connected, 1);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent_and_safe_when_idle() {
        // given: one peer that never sent a request, one unknown id
        let engine = create_test_engine();
        let (x, _x_rx) = connect_peer(&engine).await;

        // when: disconnect twice, plus a connection that never existed
        engine.disconnect(&x).await;
        engine.disconnect(&x).await;
        engine.disconnect(&ConnectionId::new("ghost")).await;

        // then: total no-op beyond the first removal
        let stats = engine.stats().await;
        assert_eq!(stats.connected, 0);
        assert_eq!(stats.waiting, 0);
        assert_eq!(stats.active_calls, 0);
    }

    #[tokio::test]
    async fn test_peers_can_rematch_after_call_ends() {
        // given: a call torn down by end-call
        let engine = create_test_engine();
        let ((x, mut x_rx), (y, mut y_rx), first_room) = connect_and_pair(&engine).await;
        engine.end_call(&y).await;
        assert_eq!(next_event(&mut x_rx)["type"], "call-ended");

        // when: both request again
        engine.find_match(&x, None).await;
        assert_eq!(next_event(&mut x_rx)["type"], "waiting");
        engine.find_match(&y, None).await;

        // then: a fresh room with a fresh id, initiator flipped to y
        let matched_y = next_event(&mut y_rx);
        assert_eq!(matched_y["type"], "matched");
        assert_eq!(matched_y["partnerId"], x.as_str());
        assert_eq!(matched_y["isInitiator"], true);
        assert_ne!(matched_y["roomId"], first_room.as_str());
        assert_eq!(next_event(&mut x_rx)["type"], "matched");
    }

    #[tokio::test]
    async fn test_waiting_and_paired_states_are_mutually_exclusive() {
        // A connection id never sits in the queue and a room at once.
        let engine = create_test_engine();
        let (x, mut x_rx) = connect_peer(&engine).await;
        let (y, mut y_rx) = connect_peer(&engine).await;

        engine.find_match(&x, None).await;
        assert!(engine.is_waiting(&x).await && !engine.is_paired(&x).await);

        engine.find_match(&y, None).await;
        assert!(!engine.is_waiting(&x).await && engine.is_paired(&x).await);
        assert!(!engine.is_waiting(&y).await && engine.is_paired(&y).await);

        engine.end_call(&x).await;
        assert!(!engine.is_waiting(&x).await && !engine.is_paired(&x).await);

        // x saw waiting then matched; y saw matched then call-ended
        assert_eq!(next_event(&mut x_rx)["type"], "waiting");
        assert_eq!(next_event(&mut x_rx)["type"], "matched");
        assert_eq!(next_event(&mut y_rx)["type"], "matched");
        assert_eq!(next_event(&mut y_rx)["type"], "call-ended");
    }

    #[tokio::test]
    async fn test_per_connection_event_order_survives_concurrent_requests() {
        // given: many peers racing their match requests
        let engine = Arc::new(create_test_engine());
        let mut peers = Vec::new();
        for _ in 0..16 {
            peers.push(connect_peer(&engine).await);
        }

        // when: every find-match runs as its own task
        let mut handles = Vec::new();
        for (id, _) in &peers {
            let engine = Arc::clone(&engine);
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                engine.find_match(&id, None).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // then: each peer sees waiting strictly before matched, never
        // after, and everyone ends up matched
        let mut matched = 0;
        for (_, rx) in &mut peers {
            let mut seen_matched = false;
            while let Ok(raw) = rx.try_recv() {
                let event: Value = serde_json::from_str(&raw).unwrap();
                match event["type"].as_str().unwrap() {
                    "waiting" => assert!(!seen_matched, "waiting delivered after matched"),
                    "matched" => {
                        seen_matched = true;
                        matched += 1;
                    }
                    other => panic!("unexpected event '{other}'"),
                }
            }
            assert!(seen_matched);
        }
        assert_eq!(matched, 16);

        let stats = engine.stats().await;
        assert_eq!(stats.active_calls, 8);
        assert_eq!(stats.waiting, 0);
    }

    #[tokio::test]
    async fn test_slow_or_closed_client_does_not_stall_matchmaking() {
        // given: x whose receiver is already gone
        let engine = create_test_engine();
        let x = ConnectionId::generate();
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        engine.connect(x.clone(), tx).await;

        // when: matchmaking proceeds involving the dead channel
        engine.find_match(&x, None).await;
        let (y, mut y_rx) = connect_peer(&engine).await;
        engine.find_match(&y, None).await;

        // then: y is matched normally despite x's push failures
        let matched_y = next_event(&mut y_rx);
        assert_eq!(matched_y["type"], "matched");
        assert_eq!(matched_y["partnerId"], x.as_str());
    }

    #[tokio::test]
    async fn test_stale_relay_emits_nothing_on_the_pusher_seam() {
        // mockall: a relay into a nonexistent room never reaches push_to.
        // given: a pusher that expects registration and the connected
        // event only
        let mut pusher = MockMessagePusher::new();
        pusher.expect_register_client().times(1).return_const(());
        pusher
            .expect_push_to()
            .times(1) // the "connected" event
            .returning(|_, _| Ok(()));

        let engine = MatchmakingEngine::new(Arc::new(pusher));
        let x = ConnectionId::generate();
        let (tx, _rx) = mpsc::unbounded_channel();
        engine.connect(x.clone(), tx).await;

        // when:
        engine
            .relay_signal(&x, SignalKind::Offer, json!({}), &RoomId::new("stale"))
            .await;

        // then: mock expectations are verified on drop; push_to was never
        // called for the stale relay
    }
}
