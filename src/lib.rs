//! Virtual Studio 시그널링
//!
//! - `client`: 시그널링 연결, 방별 이벤트 로그, 구독자 브로드캐스트
//! - `server`: 같은 프로토콜을 중계하는 WebSocket 릴레이 서버

pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod protocol;
pub mod server;
pub mod state;

pub use client::SignalingClient;
pub use config::Config;
pub use error::{Result, SignalingError};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 로깅 초기화
pub fn init_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
