//! 시그널링 클라이언트
//!
//! 하나의 연결 관리자와 방 이벤트 저장소 위에 두 가지 소비 방식을 제공한다.
//! - `register`/`unregister`: 콜백 기반 구독
//! - `watch`: `tokio::sync::watch` 기반 반응형 바인딩
//!
//! `SignalingClient` 는 애플리케이션 시작 시 한 번 만들고 복제해서 넘긴다.
//! 복제본은 모두 같은 연결과 상태를 공유한다.

pub mod broadcast;
mod commands;
pub mod connection;
pub mod state;
pub mod store;
pub mod transport;

pub use broadcast::{Snapshot, SubscriberId};
pub use connection::{ConnectionManager, Connector};
pub use state::{ConnectionState, Notice, SharedState, TransportEvent};
pub use store::{EventSeq, RoomEventLog, RoomEventStore};
pub use transport::WebSocketConnector;

use crate::config::ClientConfig;
use crate::error::{Result, SignalingError};
use std::sync::Arc;

#[derive(Clone)]
pub struct SignalingClient {
    connection: Arc<ConnectionManager>,
}

impl SignalingClient {
    /// 설정의 백엔드 URL + 소켓 경로로 WebSocket 클라이언트를 만든다. 연결은 아직 열지 않는다.
    pub fn new(config: &ClientConfig, socket_path: &str) -> Result<Self> {
        let endpoint = config.endpoint(socket_path);
        if !(endpoint.starts_with("ws://") || endpoint.starts_with("wss://")) {
            return Err(SignalingError::InvalidEndpoint(endpoint));
        }

        Ok(Self::with_connector(
            Arc::new(WebSocketConnector::from_config(config)),
            endpoint,
            config.room_log_cap,
        ))
    }

    pub fn with_connector(
        connector: Arc<dyn Connector>,
        endpoint: impl Into<String>,
        room_log_cap: Option<usize>,
    ) -> Self {
        let state = SharedState::new(room_log_cap);
        Self {
            connection: Arc::new(ConnectionManager::new(connector, endpoint, state)),
        }
    }

    pub fn initialize(&self) {
        self.connection.initialize();
    }

    pub fn endpoint(&self) -> &str {
        self.connection.endpoint()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state().lock().connection()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.connection.state().lock().snapshot()
    }

    pub fn room(&self, room_id: &str) -> RoomEventLog {
        self.connection.state().lock().room(room_id)
    }

    /// 구독자를 등록하고 현재 스냅샷으로 즉시 한 번 호출한다.
    /// 첫 구독 시 연결이 열린다.
    ///
    /// 콜백은 상태 잠금 안에서 실행된다. 콜백 안에서는 송신 명령(`join_room`, `send_*`)만
    /// 호출할 수 있고, 등록이나 조회처럼 상태를 읽는 메서드는 호출하면 안 된다.
    pub fn register<F>(&self, callback: F) -> SubscriberId
    where
        F: FnMut(&Snapshot) + Send + 'static,
    {
        self.initialize();
        self.connection.state().lock().register(Box::new(callback))
    }

    pub fn unregister(&self, id: SubscriberId) {
        self.connection.state().lock().unregister(id);
    }

    /// 반응형 바인딩. 연결을 열고 최신 스냅샷을 담은 수신자를 돌려준다.
    pub fn watch(&self) -> tokio::sync::watch::Receiver<Snapshot> {
        self.initialize();
        self.connection.state().lock().watch()
    }

    /// 상태 알림(토스트) 구독
    pub fn notices(&self) -> tokio::sync::broadcast::Receiver<Notice> {
        self.connection.notices()
    }
}
