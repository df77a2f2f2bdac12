use crate::handlers::SessionStore;
use log::info;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

const CHECK_INTERVAL_SECONDS: u64 = 60;
const MAX_IDLE_MINUTES: u64 = 30;

/// Drops voting sessions nobody has clicked on for a while. Quota lives in the
/// database, so a dropped session only loses its pair and session count.
pub async fn prune_idle_sessions_task(sessions: Arc<SessionStore>) {
    info!("Starting background task to prune idle voting sessions...");
    let max_idle = Duration::from_secs(MAX_IDLE_MINUTES * 60);
    let mut interval = interval(Duration::from_secs(CHECK_INTERVAL_SECONDS));

    loop {
        interval.tick().await;
        let pruned = sessions.prune_idle(max_idle).await;
        if pruned > 0 {
            info!("Pruned {} idle voting session(s).", pruned);
        }
    }
}
