//! 연결 핸들러

use crate::protocol::Frame;
use crate::state::{AppState, PeerSession};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// 새 연결 처리
pub fn handle_connection(state: &Arc<AppState>, sender: UnboundedSender<Frame>) -> String {
    let peer_id = Uuid::new_v4().to_string();

    state.peers.insert(
        peer_id.clone(),
        PeerSession {
            sender,
            connected_at: Instant::now(),
        },
    );

    tracing::info!(peer_id = %peer_id, "New connection established");
    peer_id
}

/// 연결 해제 처리. 피어가 속한 모든 방에서 제거한다.
pub fn handle_disconnect(state: &Arc<AppState>, peer_id: &str) {
    let session = state.peers.remove(peer_id).map(|(_, session)| session);

    for mut room in state.rooms.iter_mut() {
        if room.users.remove(peer_id) {
            room.touch();
            tracing::info!(
                peer_id = %peer_id,
                room_id = %room.key(),
                remaining = room.users.len(),
                "Peer removed from room"
            );
        }
    }

    let connected_secs = session
        .map(|s| s.connected_at.elapsed().as_secs())
        .unwrap_or_default();
    tracing::info!(peer_id = %peer_id, connected_secs, "Connection closed");
}
