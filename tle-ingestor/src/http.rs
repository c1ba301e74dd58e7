use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::IngestError;
use crate::ingest::{IngestReport, StageReport};

/// Outcome of the latest ingestion cycle, as served on `/_status`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleStatus {
    pub cycles: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub last_successful_run: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub decoded: usize,
    pub decode_failures: usize,
    pub drag_term_unparseable: usize,
    pub satellites: Option<StageReport>,
    pub telemetry: Option<StageReport>,
}

/// State shared between the ingestion loop and the HTTP handlers.
#[derive(Debug)]
pub struct AppState {
    status: Mutex<CycleStatus>,
    started_at: DateTime<Utc>,
    // The service is considered dead when no cycle finished for this long
    liveness_deadline: Duration,
}

impl AppState {
    pub fn new(ingest_interval: std::time::Duration) -> Self {
        let interval = Duration::from_std(ingest_interval).unwrap_or(Duration::hours(1));

        Self {
            status: Mutex::new(CycleStatus::default()),
            started_at: Utc::now(),
            liveness_deadline: interval * 3,
        }
    }

    pub async fn record(&self, result: &Result<IngestReport, IngestError>, now: DateTime<Utc>) {
        let mut status = self.status.lock().await;
        status.cycles += 1;
        status.last_run = Some(now);

        match result {
            Ok(report) => {
                status.decoded = report.decoded;
                status.decode_failures = report.decode_failures;
                status.drag_term_unparseable = report.drag_term_unparseable;
                status.satellites = report.satellites.as_ref().ok().cloned();
                status.telemetry = report.telemetry.as_ref().ok().cloned();

                let stage_errors: Vec<String> = [&report.satellites, &report.telemetry]
                    .into_iter()
                    .filter_map(|stage| stage.as_ref().err())
                    .map(|e| e.to_string())
                    .collect();
                if stage_errors.is_empty() {
                    status.last_successful_run = Some(now);
                    status.last_error = None;
                } else {
                    status.last_error = Some(stage_errors.join("; "));
                }
            }
            Err(e) => {
                // Nothing was decoded or written in this cycle
                status.decoded = 0;
                status.decode_failures = 0;
                status.drag_term_unparseable = 0;
                status.satellites = None;
                status.telemetry = None;
                status.last_error = Some(e.to_string());
            }
        }
    }

    pub async fn status(&self) -> CycleStatus {
        self.status.lock().await.clone()
    }

    pub async fn is_live(&self, now: DateTime<Utc>) -> bool {
        let last_run = self.status.lock().await.last_run;
        now - last_run.unwrap_or(self.started_at) <= self.liveness_deadline
    }
}

pub async fn listen(app: Router, bind: String) -> eyre::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;

    axum::serve(listener, app).await?;

    Ok(())
}

pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    const EXPONENTIAL_SECONDS: &[f64] = &[
        0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0,
    ];

    PrometheusBuilder::new()
        .set_buckets(EXPONENTIAL_SECONDS)?
        .install_recorder()
}

async fn index() -> &'static str {
    "tle ingestor"
}

async fn liveness(State(state): State<Arc<AppState>>) -> Response {
    if state.is_live(Utc::now()).await {
        (StatusCode::OK, "ok").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "no recent ingestion cycle").into_response()
    }
}

async fn status(State(state): State<Arc<AppState>>) -> Json<CycleStatus> {
    Json(state.status().await)
}

/// Build the service router. The metrics route is only mounted when a recorder is installed,
/// which tests leave out since the recorder is process global.
pub fn app(state: Arc<AppState>, metrics: Option<PrometheusHandle>) -> Router {
    let router = Router::new()
        .route("/", get(index))
        .route("/_readiness", get(index))
        .route("/_liveness", get(liveness))
        .route("/_status", get(status));

    let router = match metrics {
        Some(recorder_handle) => router.route(
            "/metrics",
            get(move || std::future::ready(recorder_handle.render())),
        ),
        None => router,
    };

    router.with_state(state)
}
