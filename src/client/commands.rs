//! 송신 명령

use crate::client::state::Notice;
use crate::client::SignalingClient;
use crate::protocol::{Frame, SignalKind};
use serde_json::Value;

impl SignalingClient {
    /// 방 참여 요청을 보내고 곧바로 "참여함" 알림을 발행한다.
    ///
    /// 알림은 서버 확인을 기다리지 않는 낙관적 신호다. 방 로그는 건드리지 않는다.
    /// 상태 잠금을 잡지 않으므로 구독자 콜백 안에서도 호출할 수 있다.
    pub fn join_room(&self, room_id: &str) {
        self.connection.send(Frame::join_room(room_id));
        self.connection
            .announce(Notice::new(format!("Joined room {room_id}")));
    }

    pub fn send_offer(&self, data: Value) {
        self.send_signal(SignalKind::Offer, data);
    }

    pub fn send_answer(&self, data: Value) {
        self.send_signal(SignalKind::Answer, data);
    }

    pub fn send_ice_candidate(&self, data: Value) {
        self.send_signal(SignalKind::IceCandidate, data);
    }

    /// `data` 는 검증 없이 그대로 전달된다.
    pub fn send_signal(&self, kind: SignalKind, data: Value) {
        self.connection.send(Frame::signal(kind, data));
    }
}
