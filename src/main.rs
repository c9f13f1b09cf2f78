//! Virtual Studio 시그널링 릴레이 서버

use anyhow::Context;
use std::sync::Arc;
use studio_signaling::{server, state::AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    // 로깅 초기화
    studio_signaling::init_tracing(&config.log_level);

    let state = Arc::new(AppState::new(config.clone()));

    // 빈 방 정리 스케줄러
    server::spawn_room_cleanup(state.clone());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("Virtual Studio signaling relay started");
    tracing::info!("Address: {}", addr);
    tracing::info!("WebSocket: ws://{}{}", addr, config.socket_path);

    let signal_state = state.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_state.shutdown();
        }
    });

    server::serve(listener, state).await.context("server error")?;
    tracing::info!("Signaling relay stopped");
    Ok(())
}
