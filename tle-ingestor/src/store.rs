use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tle_common::{SatelliteDimension, TelemetryFact};

use crate::error::StoreError;

/// The storage operations an ingestion cycle needs. Inserts are append only.
#[async_trait]
pub trait ElementStore {
    /// Every catalog id present in the satellites table.
    async fn existing_catalog_ids(&self) -> Result<HashSet<i64>, StoreError>;

    /// `(catalog_id, epoch)` of every stored telemetry row with an epoch at or after `since`.
    async fn recent_epochs(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<(i64, DateTime<Utc>)>, StoreError>;

    /// Returns the number of rows actually written.
    async fn insert_satellites(&self, satellites: &[SatelliteDimension])
        -> Result<u64, StoreError>;

    /// Write all facts in a single statement. Returns the number of rows written.
    async fn insert_facts(&self, facts: &[TelemetryFact]) -> Result<u64, StoreError>;
}

/// An `ElementStore` backed by the `satellites` and `satellite_telemetry` Postgres tables.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Initialize a new PgStore backed by a lazily connected pool.
    pub fn new(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(database_url)
            .map_err(|error| StoreError::Query {
                command: "CONNECT",
                error,
            })?;

        Ok(Self { pool })
    }

    pub fn new_from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ElementStore for PgStore {
    async fn existing_catalog_ids(&self) -> Result<HashSet<i64>, StoreError> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT catalog_id FROM satellites")
            .fetch_all(&self.pool)
            .await
            .map_err(|error| StoreError::Query {
                command: "SELECT",
                error,
            })?;

        Ok(ids.into_iter().collect())
    }

    async fn recent_epochs(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<(i64, DateTime<Utc>)>, StoreError> {
        sqlx::query_as(
            r#"
SELECT catalog_id, epoch
FROM satellite_telemetry
WHERE epoch >= $1
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| StoreError::Query {
            command: "SELECT",
            error,
        })
    }

    async fn insert_satellites(
        &self,
        satellites: &[SatelliteDimension],
    ) -> Result<u64, StoreError> {
        if satellites.is_empty() {
            return Ok(0);
        }

        let mut catalog_ids = Vec::with_capacity(satellites.len());
        let mut names = Vec::with_capacity(satellites.len());
        let mut designators = Vec::with_capacity(satellites.len());
        for satellite in satellites {
            catalog_ids.push(satellite.catalog_id);
            names.push(satellite.name.as_str());
            designators.push(satellite.international_designator.as_str());
        }

        // Satellites already stored keep their first name.
        let result = sqlx::query(
            r#"
INSERT INTO satellites (catalog_id, name, international_designator)
    (SELECT * FROM UNNEST(
        $1::bigint[],
        $2::text[],
        $3::text[]))
ON CONFLICT (catalog_id) DO NOTHING
            "#,
        )
        .bind(&catalog_ids)
        .bind(&names)
        .bind(&designators)
        .execute(&self.pool)
        .await
        .map_err(|error| StoreError::Query {
            command: "INSERT",
            error,
        })?;

        Ok(result.rows_affected())
    }

    async fn insert_facts(&self, facts: &[TelemetryFact]) -> Result<u64, StoreError> {
        if facts.is_empty() {
            return Ok(0);
        }

        let batch = FactColumns::from(facts);

        let result = sqlx::query(
            r#"
INSERT INTO satellite_telemetry (
    catalog_id, epoch, fetched_at, classification,
    inclination_deg, raan_deg, eccentricity, arg_perigee_deg, mean_anomaly_deg,
    mean_motion_rev_per_day, mean_motion_dot, mean_motion_ddot, drag_term,
    rev_number, line1, line2)
    (SELECT * FROM UNNEST(
        $1::bigint[],
        $2::timestamptz[],
        $3::timestamptz[],
        $4::text[],
        $5::float8[],
        $6::float8[],
        $7::float8[],
        $8::float8[],
        $9::float8[],
        $10::float8[],
        $11::float8[],
        $12::float8[],
        $13::float8[],
        $14::int[],
        $15::text[],
        $16::text[]))
            "#,
        )
        .bind(&batch.catalog_ids)
        .bind(&batch.epochs)
        .bind(&batch.fetched_ats)
        .bind(&batch.classifications)
        .bind(&batch.inclinations)
        .bind(&batch.raans)
        .bind(&batch.eccentricities)
        .bind(&batch.arg_perigees)
        .bind(&batch.mean_anomalies)
        .bind(&batch.mean_motions)
        .bind(&batch.mean_motion_dots)
        .bind(&batch.mean_motion_ddots)
        .bind(&batch.drag_terms)
        .bind(&batch.rev_numbers)
        .bind(&batch.line1s)
        .bind(&batch.line2s)
        .execute(&self.pool)
        .await
        .map_err(|error| StoreError::Query {
            command: "INSERT",
            error,
        })?;

        Ok(result.rows_affected())
    }
}

/// Column-wise copy of a fact batch, bound as arrays for `UNNEST`.
#[derive(Default)]
struct FactColumns {
    catalog_ids: Vec<i64>,
    epochs: Vec<DateTime<Utc>>,
    fetched_ats: Vec<DateTime<Utc>>,
    classifications: Vec<String>,
    inclinations: Vec<f64>,
    raans: Vec<f64>,
    eccentricities: Vec<f64>,
    arg_perigees: Vec<f64>,
    mean_anomalies: Vec<f64>,
    mean_motions: Vec<f64>,
    mean_motion_dots: Vec<Option<f64>>,
    mean_motion_ddots: Vec<Option<f64>>,
    drag_terms: Vec<Option<f64>>,
    rev_numbers: Vec<i32>,
    line1s: Vec<String>,
    line2s: Vec<String>,
}

impl From<&[TelemetryFact]> for FactColumns {
    fn from(facts: &[TelemetryFact]) -> Self {
        let mut columns = FactColumns::default();
        for fact in facts {
            columns.catalog_ids.push(fact.catalog_id);
            columns.epochs.push(fact.epoch);
            columns.fetched_ats.push(fact.fetched_at);
            columns.classifications.push(fact.classification.to_string());
            columns.inclinations.push(fact.inclination_deg);
            columns.raans.push(fact.raan_deg);
            columns.eccentricities.push(fact.eccentricity);
            columns.arg_perigees.push(fact.arg_perigee_deg);
            columns.mean_anomalies.push(fact.mean_anomaly_deg);
            columns.mean_motions.push(fact.mean_motion_rev_per_day);
            columns.mean_motion_dots.push(fact.mean_motion_dot);
            columns.mean_motion_ddots.push(fact.mean_motion_ddot);
            columns.drag_terms.push(fact.drag_term);
            columns.rev_numbers.push(fact.rev_number);
            columns.line1s.push(fact.line1.clone());
            columns.line2s.push(fact.line2.clone());
        }
        columns
    }
}
