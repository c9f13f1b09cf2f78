//! 클라이언트-서버 메시지 프로토콜 정의
//!
//! 모든 프레임은 `type` 필드를 가진 JSON 객체다. 시그널 데이터는 보통 평평하게
//! 펼쳐 보내고, 객체가 아니거나 자체 `type` 필드를 가진 데이터는
//! `{room_id, target_sid, payload}` 형태로 감싸 보낸다.
//! `type` 이외의 필드는 해석하지 않고 그대로 중계/저장한다.

use crate::error::SignalingError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub const JOIN_ROOM: &str = "join_room";
pub const ROOM_ID: &str = "room_id";
pub const TARGET_SID: &str = "target_sid";
pub const PAYLOAD: &str = "payload";
const TYPE: &str = "type";

/// 방 단위로 누적되는 시그널링 메시지 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

impl SignalKind {
    pub const ALL: [SignalKind; 3] = [SignalKind::Offer, SignalKind::Answer, SignalKind::IceCandidate];

    pub fn as_str(self) -> &'static str {
        match self {
            SignalKind::Offer => "offer",
            SignalKind::Answer => "answer",
            SignalKind::IceCandidate => "ice-candidate",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 와이어 프레임: `{ "type": ..., ...body }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Frame {
    /// `{type: "join_room", room_id}`
    pub fn join_room(room_id: &str) -> Self {
        let mut body = Map::new();
        body.insert(ROOM_ID.to_string(), Value::String(room_id.to_string()));
        Self {
            kind: JOIN_ROOM.to_string(),
            body,
        }
    }

    /// 시그널 프레임
    ///
    /// 객체 데이터는 그대로 펼친다. 객체가 아니거나 `type` 키를 가진 데이터는
    /// `payload` 필드에 담고, 라우팅에 필요한 `room_id`/`target_sid` 만 바깥으로 복사한다.
    pub fn signal(kind: SignalKind, data: Value) -> Self {
        let body = match data {
            Value::Object(map) if !map.contains_key(TYPE) => map,
            other => wrap(other),
        };
        Self {
            kind: kind.as_str().to_string(),
            body,
        }
    }

    pub fn signal_kind(&self) -> Option<SignalKind> {
        SignalKind::parse(&self.kind)
    }

    pub fn room_id(&self) -> Option<&str> {
        self.body.get(ROOM_ID).and_then(Value::as_str)
    }

    pub fn target_sid(&self) -> Option<&str> {
        self.body
            .get(TARGET_SID)
            .and_then(Value::as_str)
            .filter(|sid| !sid.is_empty())
    }

    /// 본문이 라우팅 필드와 `payload` 로만 이루어진 감싼 프레임인지
    pub fn is_wrapped(&self) -> bool {
        self.body.contains_key(PAYLOAD)
            && self
                .body
                .keys()
                .all(|key| key == PAYLOAD || key == ROOM_ID || key == TARGET_SID)
    }

    /// 저장용 페이로드. 감싼 프레임이면 안쪽 데이터, 아니면 `type` 을 제외한 본문.
    pub fn payload(&self) -> Value {
        match self.body.get(PAYLOAD) {
            Some(inner) if self.is_wrapped() => inner.clone(),
            _ => Value::Object(self.body.clone()),
        }
    }

    pub fn to_text(&self) -> Result<String, SignalingError> {
        serde_json::to_string(self).map_err(SignalingError::Encode)
    }

    pub fn from_text(text: &str) -> Result<Self, SignalingError> {
        serde_json::from_str(text).map_err(SignalingError::Decode)
    }
}

fn wrap(data: Value) -> Map<String, Value> {
    let mut body = Map::new();
    if let Value::Object(inner) = &data {
        for key in [ROOM_ID, TARGET_SID] {
            if let Some(value) = inner.get(key) {
                body.insert(key.to_string(), value.clone());
            }
        }
    }
    body.insert(PAYLOAD.to_string(), data);
    body
}
