//! 환경 변수 기반 설정 관리

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// 전체 설정
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub cors_origins: Vec<String>,
    /// WebSocket 업그레이드 경로 (서버와 클라이언트 공통)
    pub socket_path: String,
    pub room: RoomConfig,
    pub client: ClientConfig,
    pub log_level: String,
}

/// 방 설정
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// 비어 있는 방이 삭제되기까지의 유휴 시간
    pub ttl: Duration,
    pub cleanup_interval: Duration,
}

/// 클라이언트 설정
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub backend_url: String,
    pub reconnect_delay: Duration,
    pub reconnect_max_delay: Duration,
    /// 방 로그의 종류별 최대 항목 수 (None 이면 무제한)
    pub room_log_cap: Option<usize>,
}

impl ClientConfig {
    /// 접속할 WebSocket 엔드포인트 (base URL + 고정 경로)
    pub fn endpoint(&self, socket_path: &str) -> String {
        format!(
            "{}/{}",
            self.backend_url.trim_end_matches('/'),
            socket_path.trim_start_matches('/')
        )
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: "ws://127.0.0.1:10000".to_string(),
            reconnect_delay: Duration::from_millis(1000),
            reconnect_max_delay: Duration::from_millis(5000),
            room_log_cap: None,
        }
    }
}

impl Config {
    /// 환경 변수에서 설정 로드
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            port: parse_var("PORT", 10000),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            socket_path: normalize_path(&env::var("SOCKET_PATH").unwrap_or_else(|_| "/ws".to_string())),
            room: RoomConfig {
                ttl: Duration::from_secs(parse_var("ROOM_TTL_SECS", 300)),
                cleanup_interval: Duration::from_secs(parse_var("ROOM_CLEANUP_INTERVAL_SECS", 30)),
            },
            client: ClientConfig {
                backend_url: env::var("BACKEND_URL")
                    .unwrap_or_else(|_| "ws://127.0.0.1:10000".to_string()),
                reconnect_delay: Duration::from_millis(parse_var("RECONNECT_DELAY_MS", 1000)),
                reconnect_max_delay: Duration::from_millis(parse_var(
                    "RECONNECT_MAX_DELAY_MS",
                    5000,
                )),
                room_log_cap: env::var("STUDIO_ROOM_LOG_CAP")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|cap: &usize| *cap > 0),
            },
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

fn normalize_path(path: &str) -> String {
    format!("/{}", path.trim().trim_start_matches('/'))
}

fn parse_var<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
