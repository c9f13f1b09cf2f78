//! 릴레이 서버 라우터와 WebSocket 세션 처리

use crate::handlers;
use crate::protocol::{Frame, JOIN_ROOM};
use crate::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::HeaderValue,
    response::{Html, IntoResponse, Json},
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// 라우터 설정
pub fn router(state: Arc<AppState>) -> Router {
    let socket_path = state.config.socket_path.clone();

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route(&socket_path, get(ws_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.cors_origins)),
        )
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// `state.shutdown()` 이 호출될 때까지 요청을 처리한다.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    let shutdown = shutdown_requested(state.shutdown_signal());
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// 종료 플래그가 켜지면 완료된다. 상태가 먼저 사라져도 완료된다.
pub async fn shutdown_requested(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// 빈 방 정리 스케줄러
pub fn spawn_room_cleanup(state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(state.config.room.cleanup_interval);
        loop {
            interval.tick().await;
            handlers::cleanup_idle_rooms(&state);
        }
    })
}

async fn index_handler() -> Html<&'static str> {
    Html("<h1>Virtual Studio Signaling Relay</h1><p>WebSocket endpoint: see SOCKET_PATH (default /ws)</p>")
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "server": "studio-signaling",
        "rooms": state.rooms.len(),
        "peers": state.peers.len(),
        "timestamp": SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();

    // 연결 처리
    let peer_id = handlers::handle_connection(&state, tx);

    // 송신 태스크
    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if let Ok(text) = frame.to_text() {
                if ws_sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        }
    });

    // 수신 처리 (서버 종료 시 중단)
    let shutdown = shutdown_requested(state.shutdown_signal());
    tokio::pin!(shutdown);
    loop {
        let result = tokio::select! {
            _ = &mut shutdown => {
                tracing::debug!(peer_id = %peer_id, "Closing session for shutdown");
                break;
            }
            result = ws_receiver.next() => match result {
                Some(result) => result,
                None => break,
            },
        };
        match result {
            Ok(Message::Text(text)) => match Frame::from_text(&text) {
                Ok(frame) => handle_client_frame(&state, &peer_id, frame),
                Err(e) => {
                    tracing::warn!(peer_id = %peer_id, error = %e, "Undecodable frame ignored");
                }
            },
            Ok(Message::Close(_)) => break,
            Err(_) => break,
            _ => {}
        }
    }

    // 연결 해제
    handlers::handle_disconnect(&state, &peer_id);
    send_task.abort();
}

fn handle_client_frame(state: &Arc<AppState>, peer_id: &str, frame: Frame) {
    if frame.kind == JOIN_ROOM {
        let room_id = frame.room_id().unwrap_or_default();
        handlers::handle_join_room(state, peer_id, room_id);
    } else if frame.signal_kind().is_some() {
        handlers::handle_signal(state, peer_id, frame);
    } else {
        tracing::debug!(peer_id = %peer_id, frame_type = %frame.kind, "Unknown frame type ignored");
    }
}
