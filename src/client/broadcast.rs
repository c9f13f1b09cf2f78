//! 구독자 브로드캐스트

use crate::client::store::RoomEventLog;
use std::collections::HashMap;
use std::sync::Arc;

/// 구독자에게 전달되는 전체 상태
///
/// 방 로그는 저장소와 공유되므로 복제 비용은 방 개수에 비례한다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub connected: bool,
    pub rooms: HashMap<String, Arc<RoomEventLog>>,
}

impl Snapshot {
    pub fn room(&self, room_id: &str) -> RoomEventLog {
        self.rooms
            .get(room_id)
            .map(|log| RoomEventLog::clone(log))
            .unwrap_or_default()
    }
}

pub type Callback = Box<dyn FnMut(&Snapshot) + Send>;

/// `register` 가 돌려주는 구독 핸들
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// 등록 순서대로 스냅샷을 전달하는 구독자 목록
#[derive(Default)]
pub struct SubscriberRegistry {
    next_id: u64,
    subscribers: Vec<(SubscriberId, Callback)>,
}

impl SubscriberRegistry {
    /// 등록 후 현재 스냅샷으로 즉시 한 번 호출한다.
    pub fn register(&mut self, mut callback: Callback, current: &Snapshot) -> SubscriberId {
        let id = SubscriberId(self.next_id);
        self.next_id += 1;

        callback(current);
        self.subscribers.push((id, callback));

        tracing::debug!(subscriber = id.0, total = self.subscribers.len(), "Subscriber registered");
        id
    }

    /// 없는 구독자면 아무 일도 하지 않는다.
    pub fn unregister(&mut self, id: SubscriberId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        let removed = self.subscribers.len() != before;
        if removed {
            tracing::debug!(subscriber = id.0, total = self.subscribers.len(), "Subscriber removed");
        }
        removed
    }

    pub fn notify(&mut self, snapshot: &Snapshot) {
        for (_, callback) in self.subscribers.iter_mut() {
            callback(snapshot);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}
