use crate::status_bridge::model::StatusModel;
use anyhow::{anyhow, Context, Result};
use serde_json::json;
use std::{
    net::SocketAddr,
    sync::{mpsc, Arc, RwLock},
    thread,
};
use tokio::runtime::Builder;
use warp::{http::StatusCode, Filter};
use waterfallcore::telemetry::StatusSummary;

type SharedModel = Arc<RwLock<StatusModel>>;

fn read_model(state: &SharedModel) -> StatusModel {
    state
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

/// `POST /status` stores a summary, `GET /status` returns the model.
fn routes(
    state: SharedModel,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let state_filter = warp::any().map(move || state.clone());

    let get_route = warp::path("status")
        .and(warp::path::end())
        .and(warp::get())
        .and(state_filter.clone())
        .map(|state: SharedModel| warp::reply::json(&read_model(&state)));

    let post_route = warp::path("status")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(state_filter)
        .map(|summary: StatusSummary, state: SharedModel| {
            log::debug!(
                "status from bucket {:?}: {} detections",
                summary.bucket,
                summary.detections.len()
            );
            let mut guard = state.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.record(summary);
            warp::reply::with_status(
                warp::reply::json(&json!({"status": "ok", "received": guard.received})),
                StatusCode::OK,
            )
        });

    get_route.or(post_route)
}

/// Local HTTP endpoint that collects the engine's status summaries.
pub struct StatusBridge {
    addr: SocketAddr,
    state: SharedModel,
}

impl StatusBridge {
    /// Binds `addr` (port 0 picks a free port) and serves on a background thread.
    pub fn spawn(addr: SocketAddr) -> Result<Self> {
        let state: SharedModel = Arc::new(RwLock::new(StatusModel::default()));
        let filter = routes(state.clone());
        let (ready_tx, ready_rx) = mpsc::channel::<std::result::Result<SocketAddr, String>>();

        thread::Builder::new()
            .name("status-bridge".into())
            .spawn(move || {
                let runtime = match Builder::new_current_thread().enable_all().build() {
                    Ok(runtime) => runtime,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err.to_string()));
                        return;
                    }
                };
                runtime.block_on(async move {
                    match warp::serve(filter).try_bind_ephemeral(addr) {
                        Ok((bound, server)) => {
                            let _ = ready_tx.send(Ok(bound));
                            server.await;
                        }
                        Err(err) => {
                            let _ = ready_tx.send(Err(err.to_string()));
                        }
                    }
                });
            })
            .context("spawning status bridge thread")?;

        let bound = ready_rx
            .recv()
            .context("status bridge thread exited before binding")?
            .map_err(|err| anyhow!("binding status bridge on {}: {}", addr, err))?;
        log::info!("status bridge listening on http://{}/status", bound);
        Ok(Self {
            addr: bound,
            state,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// URL to hand the engine as its `api_endpoint`.
    pub fn endpoint(&self) -> String {
        format!("http://{}/status", self.addr)
    }

    pub fn snapshot(&self) -> StatusModel {
        read_model(&self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waterfallcore::scan::Detection;
    use waterfallcore::telemetry::{HttpStatusReporter, MetricsSnapshot, StatusReporter};

    fn summary() -> StatusSummary {
        StatusSummary {
            timestamp: 10.0,
            bucket: Some("2026-10-19/1792368000".into()),
            freq_min: 1.0,
            freq_max: 2.0,
            detections: vec![Detection::new(10.0, 1.5, 1.52, -10.0, "narrowband")],
            metrics: MetricsSnapshot::default(),
            config_vars: None,
        }
    }

    #[tokio::test]
    async fn post_then_get_returns_latest_summary() {
        let state: SharedModel = Arc::new(RwLock::new(StatusModel::default()));
        let filter = routes(state.clone());

        let posted = warp::test::request()
            .method("POST")
            .path("/status")
            .json(&summary())
            .reply(&filter)
            .await;
        assert_eq!(posted.status(), StatusCode::OK);

        let fetched = warp::test::request()
            .method("GET")
            .path("/status")
            .reply(&filter)
            .await;
        let model: StatusModel = serde_json::from_slice(fetched.body()).unwrap();
        assert_eq!(model.received, 1);
        assert_eq!(model.detections_seen, 1);
        assert_eq!(model.latest, Some(summary()));
    }

    #[tokio::test]
    async fn malformed_summary_is_rejected() {
        let state: SharedModel = Arc::new(RwLock::new(StatusModel::default()));
        let filter = routes(state.clone());
        let response = warp::test::request()
            .method("POST")
            .path("/status")
            .body("{\"timestamp\": \"soon\"}")
            .reply(&filter)
            .await;
        assert!(response.status().is_client_error());
        assert_eq!(read_model(&state).received, 0);
    }

    #[test]
    fn bridge_accepts_engine_reports() {
        let bridge = StatusBridge::spawn(SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();
        assert_ne!(bridge.addr().port(), 0);

        let mut reporter = HttpStatusReporter::new(&bridge.endpoint()).unwrap();
        reporter.report(&summary()).unwrap();
        reporter.report(&summary()).unwrap();

        let model = bridge.snapshot();
        assert_eq!(model.received, 2);
        assert_eq!(model.latest.unwrap().freq_max, 2.0);
    }
}
