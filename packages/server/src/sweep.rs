//! Liveness sweep.
//!
//! Clients that disappear without a leave (crash, network loss) stay in
//! the roster as ghosts until this sweep expires them. Expiry reuses the
//! normal removal path, so the remaining members see the same
//! presence-left delta and sync snapshot an explicit leave produces.

use std::sync::Arc;
use std::time::Duration;

use yoriai_shared::time::get_jst_timestamp;

use super::domain::expired_member_ids;
use super::handler::remove_member;
use super::state::AppState;

/// How long a member may stay silent before being expired
pub const LIVENESS_TIMEOUT: Duration = Duration::from_secs(45);

/// How often the sweep runs
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(15);

/// Run the periodic liveness sweep until the process shuts down
pub async fn run_liveness_sweep(state: Arc<AppState>) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);
    // The first tick fires immediately; skip it so a fresh server does
    // not sweep before anyone had a chance to heartbeat.
    interval.tick().await;

    loop {
        interval.tick().await;
        sweep_once(&state, LIVENESS_TIMEOUT).await;
    }
}

/// One sweep pass over every session
pub async fn sweep_once(state: &Arc<AppState>, timeout: Duration) {
    let now = get_jst_timestamp();
    let timeout_millis = timeout.as_millis() as i64;

    let expired: Vec<(String, String)> = {
        let sessions = state.sessions.lock().await;
        sessions
            .iter()
            .flat_map(|(session_id, hub)| {
                expired_member_ids(&hub.members, now, timeout_millis)
                    .into_iter()
                    .map(|user_id| (session_id.clone(), user_id))
            })
            .collect()
    };

    for (session_id, user_id) in expired {
        tracing::warn!(
            "Expiring silent member '{}' from session '{}'",
            user_id,
            session_id
        );
        remove_member(state, &session_id, &user_id).await;
    }
}
