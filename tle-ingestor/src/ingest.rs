use std::future::Future;
use std::time;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tle_common::{
    parse_batch, select_new_entities, select_new_facts, ElementSet, ParsedBatch, RecentWindow,
    TelemetryFact,
};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{IngestError, Stage, StoreError};
use crate::fetch::ElementSource;
use crate::metrics_consts::*;
use crate::store::ElementStore;

/// Settings an `Ingestor` needs from the service configuration.
#[derive(Debug, Clone, Copy)]
pub struct IngestSettings {
    /// Trailing interval of stored epochs checked for duplicate telemetry.
    pub dedup_window: chrono::Duration,
    /// Upper bound for every individual store call.
    pub store_timeout: time::Duration,
}

impl From<&Config> for IngestSettings {
    fn from(config: &Config) -> Self {
        Self {
            dedup_window: config.dedup_window(),
            store_timeout: config.store_timeout.0,
        }
    }
}

/// Counts for one reconcile-and-persist stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageReport {
    /// Records selected as new by the reconciler.
    pub candidates: usize,
    /// Rows the store reported as written.
    pub inserted: u64,
    /// Decoded records the reconciler dropped as already known.
    pub skipped: usize,
}

/// What a single ingestion cycle did.
#[derive(Debug)]
pub struct IngestReport {
    pub fetched_at: DateTime<Utc>,
    pub decoded: usize,
    pub decode_failures: usize,
    pub drag_term_unparseable: usize,
    pub satellites: Result<StageReport, IngestError>,
    pub telemetry: Result<StageReport, IngestError>,
}

impl IngestReport {
    fn new(fetched_at: DateTime<Utc>, batch: &ParsedBatch) -> Self {
        Self {
            fetched_at,
            decoded: batch.records.len(),
            decode_failures: batch.failures.len(),
            drag_term_unparseable: batch.drag_term_unparseable(),
            satellites: Ok(StageReport::default()),
            telemetry: Ok(StageReport::default()),
        }
    }

    /// Whether both stages ran to completion.
    pub fn is_complete(&self) -> bool {
        self.satellites.is_ok() && self.telemetry.is_ok()
    }
}

/// Runs fetch, decode, reconcile and persist cycles against a source and a store.
pub struct Ingestor<S, D> {
    source: S,
    store: D,
    settings: IngestSettings,
}

impl<S, D> Ingestor<S, D>
where
    S: ElementSource + Send + Sync,
    D: ElementStore + Send + Sync,
{
    pub fn new(source: S, store: D, settings: IngestSettings) -> Self {
        Self {
            source,
            store,
            settings,
        }
    }

    /// Run one ingestion cycle.
    ///
    /// A failed fetch fails the whole cycle before anything touches the store. Once the payload is
    /// decoded, the satellites and telemetry stages run concurrently and independently: a store
    /// failure in one of them is reported in its slot of the returned `IngestReport` and does not
    /// stop the other. A payload without any decodable record is a successful no-op.
    pub async fn run_once(&self) -> Result<IngestReport, IngestError> {
        let start = time::Instant::now();
        let result = self.cycle().await;
        metrics::histogram!(CYCLE_TIME).record(start.elapsed().as_secs_f64());

        result
    }

    async fn cycle(&self) -> Result<IngestReport, IngestError> {
        info!("Fetching element sets");

        let payload = match self.source.fetch().await {
            Ok(payload) => payload,
            Err(e) => {
                metrics::counter!(FETCH_FAILURES).increment(1);
                metrics::counter!(CYCLES, &[("result", "fetch_failed")]).increment(1);
                return Err(IngestError::FetchFailed(e));
            }
        };
        metrics::histogram!(PAYLOAD_BYTES).record(payload.len() as f64);

        let fetched_at = Utc::now();
        let batch = parse_batch(&payload, fetched_at);
        let mut report = IngestReport::new(fetched_at, &batch);

        metrics::counter!(RECORDS_DECODED).increment(report.decoded as u64);
        metrics::counter!(DECODE_FAILURES).increment(report.decode_failures as u64);
        metrics::counter!(DRAG_TERM_UNPARSEABLE).increment(report.drag_term_unparseable as u64);
        info!(
            decoded = report.decoded,
            decode_failures = report.decode_failures,
            drag_term_unparseable = report.drag_term_unparseable,
            "Decoded element sets"
        );

        if batch.is_empty() {
            info!("No valid element sets found, nothing to persist");
            metrics::counter!(CYCLES, &[("result", "empty")]).increment(1);
            return Ok(report);
        }

        let (satellites, telemetry) = tokio::join!(
            self.ingest_satellites(&batch.records),
            self.ingest_telemetry(&batch.records, fetched_at)
        );
        report.satellites = record_stage(Stage::Satellites, satellites);
        report.telemetry = record_stage(Stage::Telemetry, telemetry);

        let result = if report.is_complete() {
            "complete"
        } else {
            "partial"
        };
        metrics::counter!(CYCLES, &[("result", result)]).increment(1);

        Ok(report)
    }

    async fn ingest_satellites(&self, records: &[ElementSet]) -> Result<StageReport, IngestError> {
        let existing_ids = self
            .bounded("existing_catalog_ids", self.store.existing_catalog_ids())
            .await
            .map_err(|error| IngestError::StoreQueryFailed {
                stage: Stage::Satellites,
                error,
            })?;

        let new_satellites = select_new_entities(records, &existing_ids);

        let inserted = self
            .bounded("insert_satellites", self.store.insert_satellites(&new_satellites))
            .await
            .map_err(|error| IngestError::StorePersistFailed {
                stage: Stage::Satellites,
                error,
            })?;

        Ok(StageReport {
            candidates: new_satellites.len(),
            inserted,
            skipped: records.len() - new_satellites.len(),
        })
    }

    async fn ingest_telemetry(
        &self,
        records: &[ElementSet],
        fetched_at: DateTime<Utc>,
    ) -> Result<StageReport, IngestError> {
        let since = fetched_at - self.settings.dedup_window;
        let rows = self
            .bounded("recent_epochs", self.store.recent_epochs(since))
            .await
            .map_err(|error| IngestError::StoreQueryFailed {
                stage: Stage::Telemetry,
                error,
            })?;
        let window = RecentWindow::from_rows(rows);

        let facts: Vec<TelemetryFact> = records.iter().map(TelemetryFact::from).collect();
        let selection = select_new_facts(facts, &window);
        if selection.skipped_in_batch > 0 {
            warn!(
                duplicates = selection.skipped_in_batch,
                "Payload repeats element sets for the same epoch"
            );
        }

        let inserted = self
            .bounded("insert_facts", self.store.insert_facts(&selection.new))
            .await
            .map_err(|error| IngestError::StorePersistFailed {
                stage: Stage::Telemetry,
                error,
            })?;

        Ok(StageReport {
            candidates: selection.new.len(),
            inserted,
            skipped: selection.skipped(),
        })
    }

    async fn bounded<T, F>(&self, command: &'static str, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.settings.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout { command }),
        }
    }
}

fn record_stage(
    stage: Stage,
    result: Result<StageReport, IngestError>,
) -> Result<StageReport, IngestError> {
    let labels = [("stage", stage.as_str())];

    match &result {
        Ok(stage_report) => {
            metrics::counter!(ROWS_INSERTED, &labels).increment(stage_report.inserted);
            metrics::counter!(ROWS_SKIPPED, &labels).increment(stage_report.skipped as u64);
            info!(
                stage = stage.as_str(),
                candidates = stage_report.candidates,
                inserted = stage_report.inserted,
                skipped = stage_report.skipped,
                "Stage complete"
            );
        }
        Err(e) => {
            let labels = [("stage", stage.as_str()), ("kind", e.kind())];
            metrics::counter!(STAGE_FAILURES, &labels).increment(1);
            error!(stage = stage.as_str(), "Stage failed: {}", e);
        }
    }

    result
}
