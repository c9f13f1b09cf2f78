//! 실제 릴레이 서버와 WebSocket 클라이언트로 전체 경로를 검증한다.

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use studio_signaling::client::{ConnectionState, Snapshot};
use studio_signaling::config::{ClientConfig, Config};
use studio_signaling::handlers::room_members;
use studio_signaling::state::AppState;
use studio_signaling::{server, SignalingClient};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

/// 빈 포트에 서버를 띄우고 (포트, 상태)를 돌려준다.
async fn start_server() -> (u16, Arc<AppState>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (state, _server) = serve_on(listener);
    (port, state)
}

fn serve_on(listener: TcpListener) -> (Arc<AppState>, JoinHandle<std::io::Result<()>>) {
    let mut config = Config::from_env();
    config.socket_path = "/ws".to_string();
    config.cors_origins = vec![];
    let state = Arc::new(AppState::new(config));

    let server = tokio::spawn(server::serve(listener, state.clone()));
    (state, server)
}

async fn rebind(port: u16) -> TcpListener {
    timeout(Duration::from_secs(5), async {
        loop {
            match TcpListener::bind(("127.0.0.1", port)).await {
                Ok(listener) => return listener,
                Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
            }
        }
    })
    .await
    .expect("port not released")
}

fn client_for(port: u16) -> SignalingClient {
    let config = ClientConfig {
        backend_url: format!("ws://127.0.0.1:{port}"),
        reconnect_delay: Duration::from_millis(50),
        reconnect_max_delay: Duration::from_millis(200),
        room_log_cap: None,
    };
    SignalingClient::new(&config, "/ws").unwrap()
}

async fn wait_for(rx: &mut watch::Receiver<Snapshot>, f: impl FnMut(&Snapshot) -> bool) {
    timeout(Duration::from_secs(5), rx.wait_for(f))
        .await
        .expect("timed out waiting for snapshot")
        .expect("client dropped");
}

async fn wait_for_members(state: &AppState, room_id: &str, count: usize) {
    timeout(Duration::from_secs(5), async {
        loop {
            if room_members(state, room_id).map(|m| m.len()) == Some(count) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("timed out waiting for room members");
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let (port, _state) = start_server().await;

    let mut stream = tokio::net::TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    stream
        .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains(r#""status":"ok""#));
}

#[tokio::test]
async fn client_connects_and_reports_connected() {
    let (port, _state) = start_server().await;
    let client = client_for(port);

    let mut rx = client.watch();
    wait_for(&mut rx, |s| s.connected).await;
}

#[tokio::test]
async fn offers_and_candidates_reach_the_other_peer_in_room() {
    let (port, state) = start_server().await;
    let director = client_for(port);
    let guest = client_for(port);

    let mut director_rx = director.watch();
    let mut guest_rx = guest.watch();
    wait_for(&mut director_rx, |s| s.connected).await;
    wait_for(&mut guest_rx, |s| s.connected).await;

    director.join_room("studio-1");
    guest.join_room("studio-1");
    wait_for_members(&state, "studio-1", 2).await;

    director.send_offer(json!({"room_id": "studio-1", "sdp": "v=0 offer"}));
    director.send_ice_candidate(json!({"room_id": "studio-1", "candidate": "c1"}));
    director.send_ice_candidate(json!({"room_id": "studio-1", "candidate": "c2"}));

    wait_for(&mut guest_rx, |s| s.room("studio-1").ice_candidates.len() == 2).await;

    let log = guest.room("studio-1");
    assert_eq!(log.offers, vec![json!({"room_id": "studio-1", "sdp": "v=0 offer"})]);
    assert_eq!(
        log.ice_candidates,
        vec![
            json!({"room_id": "studio-1", "candidate": "c1"}),
            json!({"room_id": "studio-1", "candidate": "c2"}),
        ]
    );
    assert!(log.answers.is_empty());

    // 보낸 쪽에는 되돌아오지 않는다
    assert!(director.room("studio-1").is_empty());
}

#[tokio::test]
async fn raw_socket_receives_relayed_answer() {
    let (port, state) = start_server().await;
    let url = format!("ws://127.0.0.1:{port}/ws");

    let (mut raw, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    raw.send(Message::Text(json!({"type": "join_room", "room_id": "R"}).to_string()))
        .await
        .unwrap();

    let client = client_for(port);
    let mut rx = client.watch();
    wait_for(&mut rx, |s| s.connected).await;
    client.join_room("R");
    wait_for_members(&state, "R", 2).await;

    client.send_answer(json!({"room_id": "R", "sdp": "answer"}));

    let received = timeout(Duration::from_secs(5), async {
        loop {
            match raw.next().await {
                Some(Ok(Message::Text(text))) => return text,
                Some(Ok(_)) => continue,
                other => panic!("unexpected: {other:?}"),
            }
        }
    })
    .await
    .unwrap();

    let value: Value = serde_json::from_str(&received).unwrap();
    assert_eq!(value, json!({"type": "answer", "room_id": "R", "sdp": "answer"}));
}

#[tokio::test]
async fn client_without_server_stays_disconnected() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = client_for(port);
    let rx = client.watch();
    client.send_offer(json!({"room_id": "A"}));
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(!rx.borrow().connected);
    assert!(client.snapshot().rooms.is_empty());
}

#[tokio::test]
async fn frames_sent_while_disconnected_arrive_after_reconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (state, server) = serve_on(listener);

    let client = client_for(port);
    let mut rx = client.watch();
    wait_for(&mut rx, |s| s.connected).await;
    client.join_room("before");
    wait_for_members(&state, "before", 1).await;

    state.shutdown();
    timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
    wait_for(&mut rx, |s| !s.connected).await;

    // 끊긴 동안 보낸 프레임은 재연결 후 전송된다
    client.join_room("after");

    let (restarted, _server) = serve_on(rebind(port).await);
    wait_for(&mut rx, |s| s.connected).await;
    wait_for_members(&restarted, "after", 1).await;

    assert!(room_members(&restarted, "before").is_none());
    assert_eq!(client.connection_state(), ConnectionState::Connected);
}

#[tokio::test]
async fn shutdown_closes_open_sessions() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (state, server) = serve_on(listener);

    let client = client_for(port);
    let mut rx = client.watch();
    wait_for(&mut rx, |s| s.connected).await;
    client.join_room("R");
    wait_for_members(&state, "R", 1).await;

    state.shutdown();
    wait_for(&mut rx, |s| !s.connected).await;
    timeout(Duration::from_secs(5), server).await.unwrap().unwrap().unwrap();

    assert_eq!(room_members(&state, "R"), Some(vec![]));
    assert!(state.peers.is_empty());
}
