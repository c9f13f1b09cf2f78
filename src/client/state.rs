//! 클라이언트 상태 관리
//!
//! 연결 상태, 방 이벤트 저장소, 구독자 목록을 한 곳에서 소유한다.
//! 모든 변경과 그에 따른 알림은 같은 잠금 구간 안에서 일어나므로
//! 구독자는 항상 일관된 스냅샷만 본다.

use crate::client::broadcast::{Callback, Snapshot, SubscriberId, SubscriberRegistry};
use crate::client::store::{RoomEventLog, RoomEventStore};
use crate::protocol::{Frame, SignalKind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};

const NOTICE_CAPACITY: usize = 64;

/// 연결 상태 머신
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Connecting,
    Connected,
    Disconnected,
}

/// 트랜스포트가 보고하는 이벤트
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    Message(String),
}

/// 사용자에게 보여줄 상태 알림 (토스트)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub description: Option<String>,
}

impl Notice {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

pub struct ClientState {
    connection: ConnectionState,
    store: RoomEventStore,
    subscribers: SubscriberRegistry,
    watch_tx: watch::Sender<Snapshot>,
    notice_tx: broadcast::Sender<Notice>,
}

impl ClientState {
    pub fn new(room_log_cap: Option<usize>) -> Self {
        let (watch_tx, _) = watch::channel(Snapshot::default());
        let (notice_tx, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            connection: ConnectionState::Uninitialized,
            store: RoomEventStore::new(room_log_cap),
            subscribers: SubscriberRegistry::default(),
            watch_tx,
            notice_tx,
        }
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            connected: self.is_connected(),
            rooms: self.store.rooms().clone(),
        }
    }

    pub fn room(&self, room_id: &str) -> RoomEventLog {
        self.store.get(room_id)
    }

    pub fn register(&mut self, callback: Callback) -> SubscriberId {
        let current = self.snapshot();
        self.subscribers.register(callback, &current)
    }

    pub fn unregister(&mut self, id: SubscriberId) -> bool {
        self.subscribers.unregister(id)
    }

    /// 구독자가 없을 때는 발행을 건너뛰므로 새 수신자를 만들기 전에 최신 값으로 맞춘다.
    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.watch_tx.send_replace(self.snapshot());
        self.watch_tx.subscribe()
    }

    /// 잠금 없이 알림을 보낼 수 있도록 송신 핸들을 복제해 준다.
    pub fn notice_sender(&self) -> broadcast::Sender<Notice> {
        self.notice_tx.clone()
    }

    /// `Uninitialized -> Connecting`. 연결 플래그는 바뀌지 않으므로 알림 없음.
    pub(crate) fn mark_connecting(&mut self) {
        if self.connection == ConnectionState::Uninitialized {
            self.connection = ConnectionState::Connecting;
        }
    }

    fn announce(&self, notice: Notice) {
        announce(&self.notice_tx, notice);
    }

    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                self.connection = ConnectionState::Connected;
                self.publish();
                self.announce(Notice::new("Connected to server"));
            }
            TransportEvent::Disconnected => {
                self.connection = ConnectionState::Disconnected;
                self.publish();
                self.announce(
                    Notice::new("Disconnected from server").with_description("Trying to reconnect..."),
                );
            }
            TransportEvent::Message(text) => match Frame::from_text(&text) {
                Ok(frame) => self.record(frame),
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping undecodable frame");
                }
            },
        }
    }

    /// 수신 프레임을 방 로그에 추가하고 구독자에게 알린다.
    pub fn record(&mut self, frame: Frame) {
        let Some(kind) = frame.signal_kind() else {
            tracing::debug!(frame_type = %frame.kind, "Ignoring unknown frame type");
            return;
        };

        let Some(room_id) = frame.room_id().map(str::to_string) else {
            tracing::warn!(kind = %kind, "Dropping signal without room_id");
            return;
        };

        self.store.append(&room_id, kind, frame.payload());
        self.publish();

        tracing::debug!(room_id = %room_id, kind = %kind, "Signal recorded");

        match kind {
            SignalKind::Offer => self.announce(Notice::new(format!("New offer in room {room_id}"))),
            SignalKind::Answer => {
                self.announce(Notice::new(format!("Answer received in room {room_id}")))
            }
            SignalKind::IceCandidate => {}
        }
    }

    fn publish(&mut self) {
        if self.subscribers.is_empty() && self.watch_tx.receiver_count() == 0 {
            return;
        }
        let snapshot = self.snapshot();
        self.subscribers.notify(&snapshot);
        self.watch_tx.send_replace(snapshot);
    }
}

/// 상태 알림 발행. 수신자가 없으면 버려진다.
pub fn announce(notice_tx: &broadcast::Sender<Notice>, notice: Notice) {
    tracing::info!(title = %notice.title, "Status notice");
    let _ = notice_tx.send(notice);
}

/// 여러 태스크가 공유하는 클라이언트 상태 핸들
#[derive(Clone)]
pub struct SharedState(Arc<Mutex<ClientState>>);

impl SharedState {
    pub fn new(room_log_cap: Option<usize>) -> Self {
        Self(Arc::new(Mutex::new(ClientState::new(room_log_cap))))
    }

    /// 구독자 콜백은 이 잠금 안에서 실행되므로 콜백에서 클라이언트를 다시 호출하면 안 된다.
    pub fn lock(&self) -> MutexGuard<'_, ClientState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn counting(count: &Arc<Mutex<Vec<Snapshot>>>) -> Callback {
        let count = count.clone();
        Box::new(move |s: &Snapshot| count.lock().unwrap().push(s.clone()))
    }

    #[test]
    fn connected_flag_follows_transport_events_only() {
        let mut state = ClientState::new(None);
        assert_eq!(state.connection(), ConnectionState::Uninitialized);

        state.mark_connecting();
        assert_eq!(state.connection(), ConnectionState::Connecting);
        assert!(!state.snapshot().connected);

        state.handle_event(TransportEvent::Connected);
        assert!(state.snapshot().connected);

        state.handle_event(TransportEvent::Message(
            r#"{"type":"offer","room_id":"A","sdp":"x"}"#.to_string(),
        ));
        assert!(state.snapshot().connected);

        state.handle_event(TransportEvent::Disconnected);
        assert_eq!(state.connection(), ConnectionState::Disconnected);
        assert!(!state.snapshot().connected);

        state.handle_event(TransportEvent::Connected);
        assert_eq!(state.connection(), ConnectionState::Connected);
    }

    #[test]
    fn inbound_signals_are_grouped_by_room() {
        let mut state = ClientState::new(None);
        for text in [
            r#"{"type":"offer","room_id":"A","sdp":"P1"}"#,
            r#"{"type":"answer","room_id":"A","sdp":"P2"}"#,
            r#"{"type":"offer","room_id":"B","sdp":"P3"}"#,
        ] {
            state.handle_event(TransportEvent::Message(text.to_string()));
        }

        let a = state.room("A");
        assert_eq!(a.offers, vec![json!({"room_id": "A", "sdp": "P1"})]);
        assert_eq!(a.answers, vec![json!({"room_id": "A", "sdp": "P2"})]);
        assert!(a.ice_candidates.is_empty());

        let b = state.room("B");
        assert_eq!(b.offers, vec![json!({"room_id": "B", "sdp": "P3"})]);
        assert!(b.answers.is_empty());
    }

    #[test]
    fn unknown_and_malformed_frames_are_ignored() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut state = ClientState::new(None);
        state.register(counting(&seen));

        state.handle_event(TransportEvent::Message(r#"{"type":"presence","room_id":"A"}"#.to_string()));
        state.handle_event(TransportEvent::Message("garbage".to_string()));
        state.handle_event(TransportEvent::Message(r#"{"type":"offer","sdp":"x"}"#.to_string()));

        assert_eq!(seen.lock().unwrap().len(), 1);
        assert!(state.snapshot().rooms.is_empty());
    }

    #[test]
    fn every_notification_sees_the_triggering_mutation() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut state = ClientState::new(None);
        state.register(counting(&seen));

        state.handle_event(TransportEvent::Message(
            r#"{"type":"ice-candidate","room_id":"A","candidate":"c1"}"#.to_string(),
        ));
        state.handle_event(TransportEvent::Message(
            r#"{"type":"ice-candidate","room_id":"A","candidate":"c2"}"#.to_string(),
        ));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen[0].rooms.is_empty());
        assert_eq!(seen[1].room("A").ice_candidates.len(), 1);
        assert_eq!(seen[2].room("A").ice_candidates.len(), 2);
    }

    #[test]
    fn late_watcher_sees_events_published_without_listeners() {
        let mut state = ClientState::new(None);
        state.handle_event(TransportEvent::Connected);
        state.handle_event(TransportEvent::Message(
            r#"{"type":"answer","room_id":"A","sdp":"s"}"#.to_string(),
        ));

        let rx = state.watch();
        assert!(rx.borrow().connected);
        assert_eq!(rx.borrow().room("A").answers.len(), 1);
    }

    #[test]
    fn long_sessions_do_not_copy_history_per_event() {
        let seen = Arc::new(Mutex::new(0usize));
        let counter = seen.clone();
        let mut state = ClientState::new(None);
        state.register(Box::new(move |s: &Snapshot| {
            *counter.lock().unwrap() = s.rooms.get("R").map_or(0, |log| log.ice_candidates.len());
        }));
        let rx = state.watch();

        let candidate = "a".repeat(200);
        let started = std::time::Instant::now();
        for _ in 0..20_000 {
            state.handle_event(TransportEvent::Message(
                json!({"type": "ice-candidate", "room_id": "R", "candidate": candidate}).to_string(),
            ));
        }

        assert!(started.elapsed() < std::time::Duration::from_secs(60));
        assert_eq!(rx.borrow().room("R").ice_candidates.len(), 20_000);
        assert_eq!(*seen.lock().unwrap(), 20_000);
    }

    #[test]
    fn watch_receiver_tracks_latest_snapshot() {
        let mut state = ClientState::new(None);
        let rx = state.watch();
        state.handle_event(TransportEvent::Connected);
        assert!(rx.borrow().connected);
    }

    #[test]
    fn notices_mirror_status_changes() {
        let mut state = ClientState::new(None);
        let mut notices = state.notice_sender().subscribe();

        state.handle_event(TransportEvent::Connected);
        state.handle_event(TransportEvent::Message(
            r#"{"type":"offer","room_id":"A"}"#.to_string(),
        ));
        state.handle_event(TransportEvent::Message(
            r#"{"type":"ice-candidate","room_id":"A"}"#.to_string(),
        ));
        state.handle_event(TransportEvent::Disconnected);

        assert_eq!(notices.try_recv().unwrap(), Notice::new("Connected to server"));
        assert_eq!(notices.try_recv().unwrap(), Notice::new("New offer in room A"));
        let dropped = notices.try_recv().unwrap();
        assert_eq!(dropped.title, "Disconnected from server");
        assert_eq!(dropped.description.as_deref(), Some("Trying to reconnect..."));
        assert!(notices.try_recv().is_err());
    }
}
