//! 릴레이 서버 상태 관리

use crate::config::Config;
use crate::protocol::Frame;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::watch;

/// 전역 서버 상태
pub struct AppState {
    /// 방 정보 (room_id -> Room)
    pub rooms: DashMap<String, Room>,
    /// 피어 세션 (peer_id -> PeerSession)
    pub peers: DashMap<String, PeerSession>,
    /// 설정
    pub config: Arc<Config>,
    /// 종료 요청 플래그
    shutdown: watch::Sender<bool>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            rooms: DashMap::new(),
            peers: DashMap::new(),
            config: Arc::new(config),
            shutdown: watch::Sender::new(false),
        }
    }

    /// 리스너와 열려 있는 모든 WebSocket 세션에 종료를 요청한다.
    pub fn shutdown(&self) {
        if !self.shutdown.send_replace(true) {
            tracing::info!(peers = self.peers.len(), "Shutdown requested");
        }
    }

    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }
}

/// 방 정보
pub struct Room {
    pub users: HashSet<String>,
    /// 마지막으로 누가 들어오거나 나간 시각
    pub last_active: Instant,
}

impl Room {
    pub fn new() -> Self {
        Self {
            users: HashSet::new(),
            last_active: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }
}

impl Default for Room {
    fn default() -> Self {
        Self::new()
    }
}

/// 피어 세션 정보
pub struct PeerSession {
    pub sender: UnboundedSender<Frame>,
    pub connected_at: Instant,
}
