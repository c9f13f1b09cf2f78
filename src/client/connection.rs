//! 연결 관리자
//!
//! 클라이언트당 하나의 트랜스포트 연결만 만든다. 연결 핸들(송신 채널)은
//! 이 모듈만 소유하고, 나머지는 `send` 와 상태 이벤트로만 접근한다.

use crate::client::state::{self, Notice, SharedState, TransportEvent};
use crate::protocol::Frame;
use std::sync::{Arc, OnceLock};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// 실제 연결을 여는 트랜스포트
///
/// `open` 은 연결 수명 동안 `events` 로 상태와 수신 메시지를 보고하고,
/// 반환한 채널로 들어오는 프레임을 전송한다. 재연결은 구현체 책임이다.
pub trait Connector: Send + Sync + 'static {
    fn open(&self, endpoint: &str, events: UnboundedSender<TransportEvent>) -> UnboundedSender<Frame>;
}

pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    endpoint: String,
    state: SharedState,
    notice_tx: broadcast::Sender<Notice>,
    outbound: OnceLock<UnboundedSender<Frame>>,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>, endpoint: impl Into<String>, state: SharedState) -> Self {
        let notice_tx = state.lock().notice_sender();
        Self {
            connector,
            endpoint: endpoint.into(),
            state,
            notice_tx,
            outbound: OnceLock::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// 상태 잠금 없이 알림 발행. 구독자 콜백 안에서도 호출할 수 있다.
    pub fn announce(&self, notice: Notice) {
        state::announce(&self.notice_tx, notice);
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notice_tx.subscribe()
    }

    /// 연결을 연다. 이미 열려 있으면 아무 일도 하지 않는다.
    ///
    /// tokio 런타임 밖에서 호출하면 경고만 남기고 `Uninitialized` 상태로 둔다.
    pub fn initialize(&self) {
        if self.outbound.get().is_some() {
            return;
        }
        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!(endpoint = %self.endpoint, "No tokio runtime, signaling connection not opened");
            return;
        };

        self.outbound.get_or_init(|| {
            self.state.lock().mark_connecting();

            let (events_tx, events_rx) = mpsc::unbounded_channel();
            let outbound = self.connector.open(&self.endpoint, events_tx);
            runtime.spawn(dispatch_events(self.state.clone(), events_rx));

            tracing::info!(endpoint = %self.endpoint, "Signaling connection initialized");
            outbound
        });
    }

    /// 프레임 전송 (fire-and-forget). 초기화 전이면 조용히 무시한다.
    pub fn send(&self, frame: Frame) {
        let Some(outbound) = self.outbound.get() else {
            tracing::debug!(frame_type = %frame.kind, "Send before initialize ignored");
            return;
        };

        let kind = frame.kind.clone();
        if outbound.send(frame).is_err() {
            tracing::warn!(frame_type = %kind, "Transport closed, frame dropped");
        }
    }
}

/// 트랜스포트 이벤트를 도착 순서대로 상태에 반영
async fn dispatch_events(state: SharedState, mut events: UnboundedReceiver<TransportEvent>) {
    while let Some(event) = events.recv().await {
        state.lock().handle_event(event);
    }
    tracing::debug!("Transport event stream ended");
}
