//! WebRTC 시그널링 중계 핸들러

use crate::protocol::Frame;
use crate::state::AppState;
use std::sync::Arc;

/// offer / answer / ice-candidate 중계
///
/// `room_id` 는 방 참여와 같은 규칙으로 앞뒤 공백을 무시한다. 프레임은 수정 없이 전달된다. `target_sid` 가 있으면 방 안의 해당 피어에게만,
/// 없으면 보낸 피어를 제외한 방 전체에 보낸다.
pub fn handle_signal(state: &Arc<AppState>, from_peer_id: &str, frame: Frame) {
    let Some(room_id) = frame
        .room_id()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
    else {
        tracing::warn!(from = %from_peer_id, frame_type = %frame.kind, "Signal without room_id dropped");
        return;
    };

    let recipients: Vec<String> = {
        let Some(room) = state.rooms.get(&room_id) else {
            tracing::warn!(from = %from_peer_id, room_id = %room_id, "Signal for unknown room dropped");
            return;
        };
        match frame.target_sid() {
            Some(target) => room
                .users
                .iter()
                .filter(|peer_id| peer_id.as_str() == target)
                .cloned()
                .collect(),
            None => room
                .users
                .iter()
                .filter(|peer_id| peer_id.as_str() != from_peer_id)
                .cloned()
                .collect(),
        }
    };

    for peer_id in &recipients {
        send_to_peer(state, peer_id, frame.clone());
    }

    tracing::debug!(
        from = %from_peer_id,
        room_id = %room_id,
        frame_type = %frame.kind,
        target = ?frame.target_sid(),
        recipients = recipients.len(),
        "Relayed signal"
    );
}

/// 특정 피어에게 메시지 전송
fn send_to_peer(state: &AppState, peer_id: &str, frame: Frame) {
    if let Some(session) = state.peers.get(peer_id) {
        if session.sender.send(frame).is_err() {
            tracing::debug!(peer_id = %peer_id, "Peer channel closed");
        }
    }
}
