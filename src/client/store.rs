//! 방별 시그널링 이벤트 저장소
//!
//! 로그는 고정 크기 청크를 `Arc` 로 공유한다. 스냅샷을 복제해도 청크 포인터만
//! 복사되고, 추가는 마지막 청크만 (공유 중이면) 복사한다.

use crate::protocol::SignalKind;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

const CHUNK_LEN: usize = 32;

/// 추가 전용 이벤트 시퀀스 (도착 순서 유지)
#[derive(Debug, Clone, Default)]
pub struct EventSeq {
    chunks: VecDeque<Arc<Vec<Value>>>,
    /// 첫 청크에서 이미 버려진 항목 수
    head: usize,
    len: usize,
}

impl EventSeq {
    fn push(&mut self, value: Value) {
        match self.chunks.back_mut() {
            Some(last) if last.len() < CHUNK_LEN => Arc::make_mut(last).push(value),
            _ => {
                let mut chunk = Vec::with_capacity(CHUNK_LEN);
                chunk.push(value);
                self.chunks.push_back(Arc::new(chunk));
            }
        }
        self.len += 1;
    }

    /// 앞에서부터 `count` 개를 버린다.
    fn evict_front(&mut self, count: usize) {
        let count = count.min(self.len);
        self.len -= count;
        self.head += count;

        while let Some(first) = self.chunks.front() {
            if self.head < first.len() {
                break;
            }
            self.head -= first.len();
            self.chunks.pop_front();
        }
        if self.chunks.is_empty() {
            self.head = 0;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.chunks.iter().enumerate().flat_map(move |(i, chunk)| {
            let start = if i == 0 { self.head } else { 0 };
            chunk[start..].iter()
        })
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.iter().cloned().collect()
    }
}

impl PartialEq for EventSeq {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl PartialEq<Vec<Value>> for EventSeq {
    fn eq(&self, other: &Vec<Value>) -> bool {
        self.len == other.len() && self.iter().eq(other.iter())
    }
}

/// 한 방에 도착한 시그널링 메시지 로그 (종류별, 도착 순서 유지)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomEventLog {
    pub offers: EventSeq,
    pub answers: EventSeq,
    pub ice_candidates: EventSeq,
}

impl RoomEventLog {
    pub fn events(&self, kind: SignalKind) -> &EventSeq {
        match kind {
            SignalKind::Offer => &self.offers,
            SignalKind::Answer => &self.answers,
            SignalKind::IceCandidate => &self.ice_candidates,
        }
    }

    fn events_mut(&mut self, kind: SignalKind) -> &mut EventSeq {
        match kind {
            SignalKind::Offer => &mut self.offers,
            SignalKind::Answer => &mut self.answers,
            SignalKind::IceCandidate => &mut self.ice_candidates,
        }
    }

    pub fn len(&self) -> usize {
        self.offers.len() + self.answers.len() + self.ice_candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// room_id -> RoomEventLog
///
/// 방은 처음 이벤트가 도착할 때 생성되고 삭제되지 않는다.
/// `cap` 이 설정되면 종류별로 가장 오래된 항목부터 버린다.
#[derive(Debug, Clone, Default)]
pub struct RoomEventStore {
    rooms: HashMap<String, Arc<RoomEventLog>>,
    cap: Option<usize>,
}

impl RoomEventStore {
    pub fn new(cap: Option<usize>) -> Self {
        Self {
            rooms: HashMap::new(),
            cap: cap.filter(|c| *c > 0),
        }
    }

    /// 페이로드를 방 로그의 해당 종류 끝에 추가
    pub fn append(&mut self, room_id: &str, kind: SignalKind, payload: Value) {
        let log = self.rooms.entry(room_id.to_string()).or_insert_with(|| {
            tracing::debug!(room_id = %room_id, "Room log created");
            Arc::default()
        });

        let events = Arc::make_mut(log).events_mut(kind);
        events.push(payload);

        if let Some(cap) = self.cap {
            if events.len() > cap {
                let excess = events.len() - cap;
                events.evict_front(excess);
                tracing::trace!(room_id = %room_id, kind = %kind, evicted = excess, "Room log capped");
            }
        }
    }

    /// 방 로그 조회. 없는 방이면 빈 로그.
    pub fn get(&self, room_id: &str) -> RoomEventLog {
        self.rooms
            .get(room_id)
            .map(|log| RoomEventLog::clone(log))
            .unwrap_or_default()
    }

    pub fn rooms(&self) -> &HashMap<String, Arc<RoomEventLog>> {
        &self.rooms
    }
}
