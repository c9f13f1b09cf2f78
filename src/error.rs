//! 에러 타입

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode frame: {0}")]
    Decode(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SignalingError>;
