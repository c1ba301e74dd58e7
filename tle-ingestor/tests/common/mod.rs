#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Timelike, Utc};
use tle_common::{SatelliteDimension, TelemetryFact};
use tle_ingestor::error::{FetchError, StoreError};
use tle_ingestor::fetch::ElementSource;
use tle_ingestor::ingest::IngestSettings;
use tle_ingestor::store::ElementStore;

pub fn settings() -> IngestSettings {
    IngestSettings {
        dedup_window: chrono::Duration::hours(72),
        store_timeout: Duration::from_secs(5),
    }
}

/// Format a name line and both element lines for `catalog_id` at `epoch`.
pub fn element_set(catalog_id: u32, epoch: DateTime<Utc>) -> [String; 3] {
    let day = epoch.ordinal() as f64 + epoch.num_seconds_from_midnight() as f64 / 86_400.0;
    let year = epoch.year() % 100;

    [
        format!("STARLINK-{}", catalog_id),
        format!(
            "1 {:05}U 24001A   {:02}{:012.8} -.00002182  00000-0 -11606-4 0  9991",
            catalog_id, year, day
        ),
        format!(
            "2 {:05}  53.0546 110.2364 0001420  86.4319 273.6828 15.06393178231001",
            catalog_id
        ),
    ]
}

pub fn payload(element_sets: &[[String; 3]]) -> String {
    let mut payload = String::new();
    for lines in element_sets {
        for line in lines {
            payload.push_str(line);
            payload.push_str("\r\n");
        }
    }
    payload
}

/// Always returns the same payload, or always fails.
pub struct StaticSource {
    payload: Option<String>,
}

impl StaticSource {
    pub fn new(payload: String) -> Self {
        Self {
            payload: Some(payload),
        }
    }

    pub fn failing() -> Self {
        Self { payload: None }
    }
}

#[async_trait]
impl ElementSource for StaticSource {
    async fn fetch(&self) -> Result<String, FetchError> {
        self.payload
            .clone()
            .ok_or(FetchError::Status(reqwest::StatusCode::SERVICE_UNAVAILABLE))
    }
}

#[derive(Debug, Default)]
pub struct MemoryState {
    pub satellites: HashMap<i64, SatelliteDimension>,
    pub facts: Vec<TelemetryFact>,
    pub calls: Vec<&'static str>,
}

/// Store operations to fail on purpose.
#[derive(Debug, Clone, Copy, Default)]
pub struct Failures {
    pub existing_catalog_ids: bool,
    pub recent_epochs: bool,
    pub insert_satellites: bool,
    pub insert_facts: bool,
}

/// An in memory `ElementStore`. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    pub failures: Failures,
    pub delay: Option<Duration>,
}

impl MemoryStore {
    pub fn failing(failures: Failures) -> Self {
        Self {
            failures,
            ..Default::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn satellite_count(&self) -> usize {
        self.state.lock().unwrap().satellites.len()
    }

    pub fn fact_count(&self) -> usize {
        self.state.lock().unwrap().facts.len()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().calls.clone()
    }

    async fn enter(&self, command: &'static str, fail: bool) -> Result<(), StoreError> {
        self.state.lock().unwrap().calls.push(command);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if fail {
            return Err(StoreError::Query {
                command,
                error: sqlx::Error::Protocol(format!("{} failed on purpose", command)),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ElementStore for MemoryStore {
    async fn existing_catalog_ids(&self) -> Result<HashSet<i64>, StoreError> {
        self.enter("existing_catalog_ids", self.failures.existing_catalog_ids).await?;

        Ok(self.state.lock().unwrap().satellites.keys().copied().collect())
    }

    async fn recent_epochs(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<(i64, DateTime<Utc>)>, StoreError> {
        self.enter("recent_epochs", self.failures.recent_epochs).await?;

        Ok(self
            .state
            .lock()
            .unwrap()
            .facts
            .iter()
            .filter(|fact| fact.epoch >= since)
            .map(|fact| (fact.catalog_id, fact.epoch))
            .collect())
    }

    async fn insert_satellites(
        &self,
        satellites: &[SatelliteDimension],
    ) -> Result<u64, StoreError> {
        self.enter("insert_satellites", self.failures.insert_satellites).await?;

        let mut state = self.state.lock().unwrap();
        let mut inserted = 0;
        for satellite in satellites {
            if !state.satellites.contains_key(&satellite.catalog_id) {
                state
                    .satellites
                    .insert(satellite.catalog_id, satellite.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn insert_facts(&self, facts: &[TelemetryFact]) -> Result<u64, StoreError> {
        self.enter("insert_facts", self.failures.insert_facts).await?;

        self.state.lock().unwrap().facts.extend_from_slice(facts);
        Ok(facts.len() as u64)
    }
}
