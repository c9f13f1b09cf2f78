//! 시그널링 콘솔: 릴레이에 접속해 스냅샷과 알림을 로그로 출력한다.
//!
//! 사용법: `studio-console [ROOM_ID]`

use anyhow::Context;
use studio_signaling::{Config, SignalingClient};
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();
    studio_signaling::init_tracing(&config.log_level);

    let client = SignalingClient::new(&config.client, &config.socket_path)
        .context("invalid signaling endpoint")?;
    let mut notices = client.notices();
    let mut snapshots = client.watch();

    tracing::info!(endpoint = %client.endpoint(), "Signaling console started");

    if let Some(room_id) = std::env::args().nth(1) {
        client.join_room(&room_id);
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                let events: usize = snapshot.rooms.values().map(|log| log.len()).sum();
                tracing::info!(
                    connected = snapshot.connected,
                    rooms = snapshot.rooms.len(),
                    events,
                    "Snapshot updated"
                );
            }
            notice = notices.recv() => match notice {
                Ok(notice) => tracing::info!(
                    title = %notice.title,
                    description = ?notice.description,
                    "Notice"
                ),
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "Notices lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    Ok(())
}
