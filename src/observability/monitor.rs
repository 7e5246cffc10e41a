//! Status observer task
//!
//! Waits on the session status flag, clears it, and logs whatever the status
//! channel holds at that moment. Events that arrive while the observer is
//! logging collapse into a single wakeup; the channel only ever keeps the
//! latest status anyway.

use crate::context::ConnectivityContext;
use crate::flags::{WaitOptions, SESSION_STATUS_BIT};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Spawn the observer; abort the handle to stop it
pub fn spawn_status_monitor(ctx: Arc<ConnectivityContext>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match ctx
                .session_flags()
                .wait(SESSION_STATUS_BIT, WaitOptions::default().clearing())
                .await
            {
                Ok(_) => {
                    let snapshot = ctx.snapshot();
                    info!(
                        link_up = snapshot.link_up,
                        online = snapshot.session_online,
                        "Connectivity status: {}",
                        ctx.status().text()
                    );
                }
                Err(e) => {
                    debug!("Status monitor stopping: {}", e);
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::ConnectivityStatus;
    use std::time::Duration;

    #[tokio::test]
    async fn test_monitor_consumes_status_flag() {
        let ctx = Arc::new(ConnectivityContext::new());
        let handle = spawn_status_monitor(ctx.clone());

        ctx.status().write(ConnectivityStatus::Connected);
        ctx.session_flags().set(SESSION_STATUS_BIT);

        tokio::time::timeout(Duration::from_secs(2), async {
            while ctx.session_flags().is_set(SESSION_STATUS_BIT) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("monitor should clear the status flag");

        assert_eq!(ctx.status().text(), "CONNECTED");
        handle.abort();
    }
}
