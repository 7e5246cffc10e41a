//! Status HTTP server
//!
//! Read-only view of the connectivity context for operators and supervisors.
//!
//! - `GET /status` - link, session and latest status word
//! - `GET /ready` - 200 once the link is up and the session is online, else 503
//! - `GET /live` - always 200 while the process runs

use crate::context::{ConnectivityContext, ConnectivitySnapshot};
use chrono::Utc;
use serde::Serialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::Filter;

/// HTTP status server
pub struct StatusServer {
    ctx: Arc<ConnectivityContext>,
    port: u16,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    #[serde(flatten)]
    snapshot: ConnectivitySnapshot,
    timestamp: u64,
}

#[derive(Debug, Serialize)]
struct ReadinessResponse {
    ready: bool,
    timestamp: u64,
}

#[derive(Debug, Serialize)]
struct LivenessResponse {
    alive: bool,
    timestamp: u64,
}

impl StatusServer {
    pub fn new(ctx: Arc<ConnectivityContext>, port: u16) -> Self {
        Self { ctx, port }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// All routes, without binding a socket
    pub fn routes(
        &self,
    ) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
        let status_ctx = self.ctx.clone();
        let ready_ctx = self.ctx.clone();

        let status_route = warp::path("status")
            .and(warp::path::end())
            .and(warp::get())
            .and_then(move || {
                let ctx = status_ctx.clone();
                async move {
                    let response = StatusResponse {
                        snapshot: ctx.snapshot(),
                        timestamp: current_timestamp(),
                    };
                    Ok::<_, Infallible>(warp::reply::json(&response))
                }
            });

        let ready_route = warp::path("ready")
            .and(warp::path::end())
            .and(warp::get())
            .and_then(move || {
                let ctx = ready_ctx.clone();
                async move {
                    let snapshot = ctx.snapshot();
                    let ready = snapshot.link_up && snapshot.session_online;
                    let status_code = if ready {
                        StatusCode::OK
                    } else {
                        StatusCode::SERVICE_UNAVAILABLE
                    };
                    Ok::<_, Infallible>(warp::reply::with_status(
                        warp::reply::json(&ReadinessResponse {
                            ready,
                            timestamp: current_timestamp(),
                        }),
                        status_code,
                    ))
                }
            });

        let live_route = warp::path("live")
            .and(warp::path::end())
            .and(warp::get())
            .and_then(|| async {
                Ok::<_, Infallible>(warp::reply::json(&LivenessResponse {
                    alive: true,
                    timestamp: current_timestamp(),
                }))
            });

        status_route.or(ready_route).or(live_route)
    }

    /// Serve until the process exits
    pub async fn start(self) {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        tracing::info!("Starting status server on port {}", self.port);
        warp::serve(self.routes()).run(addr).await;
    }
}

/// Unix seconds; clamps a pre-epoch clock to zero
fn current_timestamp() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or_default()
}
