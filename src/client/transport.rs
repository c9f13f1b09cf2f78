//! WebSocket 트랜스포트 (tokio-tungstenite)
//!
//! 연결이 끊기면 지수 백오프로 재연결한다. 끊긴 동안 보낸 프레임은
//! 채널에 남아 있다가 재연결 후 전송된다.

use crate::client::connection::Connector;
use crate::client::state::TransportEvent;
use crate::config::ClientConfig;
use crate::error::SignalingError;
use crate::protocol::Frame;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    reconnect_delay: Duration,
    reconnect_max_delay: Duration,
}

/// 한 번의 연결이 끝난 이유
enum SessionEnd {
    /// 서버 쪽 종료나 I/O 에러. 재연결한다.
    Dropped,
    /// 클라이언트가 사라짐. 태스크를 끝낸다.
    Shutdown,
}

impl WebSocketConnector {
    pub fn new(reconnect_delay: Duration, reconnect_max_delay: Duration) -> Self {
        Self {
            reconnect_delay,
            reconnect_max_delay: reconnect_max_delay.max(reconnect_delay),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.reconnect_delay, config.reconnect_max_delay)
    }

    fn next_delay(&self, current: Duration) -> Duration {
        (current * 2).min(self.reconnect_max_delay)
    }

    async fn run(
        self,
        endpoint: String,
        events: UnboundedSender<TransportEvent>,
        mut outbound: UnboundedReceiver<Frame>,
    ) {
        let mut delay = self.reconnect_delay;

        loop {
            match connect_async(endpoint.as_str()).await {
                Ok((ws, _)) => {
                    delay = self.reconnect_delay;
                    tracing::info!(endpoint = %endpoint, "WebSocket connected");
                    if events.send(TransportEvent::Connected).is_err() {
                        return;
                    }

                    match pump(ws, &events, &mut outbound).await {
                        SessionEnd::Shutdown => return,
                        SessionEnd::Dropped => {
                            tracing::warn!(endpoint = %endpoint, "WebSocket disconnected");
                            if events.send(TransportEvent::Disconnected).is_err() {
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    let err = SignalingError::from(e);
                    tracing::warn!(endpoint = %endpoint, error = %err, retry_ms = delay.as_millis() as u64, "WebSocket connect failed");
                }
            }

            if events.is_closed() || outbound.is_closed() {
                return;
            }
            tokio::time::sleep(delay).await;
            delay = self.next_delay(delay);
        }
    }
}

impl Connector for WebSocketConnector {
    fn open(&self, endpoint: &str, events: UnboundedSender<TransportEvent>) -> UnboundedSender<Frame> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(self.clone().run(endpoint.to_string(), events, rx));
        tx
    }
}

async fn pump(
    ws: WsStream,
    events: &UnboundedSender<TransportEvent>,
    outbound: &mut UnboundedReceiver<Frame>,
) -> SessionEnd {
    let (mut ws_sender, mut ws_receiver) = ws.split();

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    let _ = ws_sender.close().await;
                    return SessionEnd::Shutdown;
                };
                let text = match frame.to_text() {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(error = %e, "Skipping unencodable frame");
                        continue;
                    }
                };
                if let Err(e) = ws_sender.send(Message::Text(text)).await {
                    tracing::warn!(error = %e, frame_type = %frame.kind, "WebSocket send failed");
                    return SessionEnd::Dropped;
                }
            }
            incoming = ws_receiver.next() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                        Ok(text) => text,
                        Err(_) => continue,
                    },
                    Some(Ok(Message::Close(_))) | None => return SessionEnd::Dropped,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "WebSocket read failed");
                        return SessionEnd::Dropped;
                    }
                };
                if events.send(TransportEvent::Message(text)).is_err() {
                    return SessionEnd::Shutdown;
                }
            }
        }
    }
}
