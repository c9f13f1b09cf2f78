//! 방 관리 핸들러

use crate::state::{AppState, Room};
use std::sync::Arc;
use std::time::Instant;

/// 방 참여 처리. 방이 없으면 만든다.
pub fn handle_join_room(state: &Arc<AppState>, peer_id: &str, room_id: &str) {
    let room_id = room_id.trim();
    if room_id.is_empty() {
        tracing::warn!(peer_id = %peer_id, "join_room without room_id ignored");
        return;
    }

    let user_count = {
        let mut room = state.rooms.entry(room_id.to_string()).or_insert_with(|| {
            tracing::info!(room_id = %room_id, "Room created");
            Room::new()
        });
        room.users.insert(peer_id.to_string());
        room.touch();
        room.users.len()
    };

    tracing::info!(
        peer_id = %peer_id,
        room_id = %room_id,
        user_count = user_count,
        "User joined room"
    );
}

/// 방 멤버 목록
pub fn room_members(state: &AppState, room_id: &str) -> Option<Vec<String>> {
    state
        .rooms
        .get(room_id)
        .map(|room| room.users.iter().cloned().collect())
}

/// 유휴 시간이 TTL 을 넘긴 빈 방 정리
pub fn cleanup_idle_rooms(state: &AppState) -> usize {
    let ttl = state.config.room.ttl;
    let now = Instant::now();
    let mut deleted = 0;

    state.rooms.retain(|room_id, room| {
        let idle = now.duration_since(room.last_active);
        if room.users.is_empty() && idle > ttl {
            tracing::info!(room_id = %room_id, idle_secs = idle.as_secs(), "Deleted idle room");
            deleted += 1;
            false
        } else {
            true
        }
    });

    if deleted > 0 {
        tracing::info!(deleted_rooms = deleted, "Cleanup completed");
    }
    deleted
}
