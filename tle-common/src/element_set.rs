use chrono::{DateTime, Utc};
use serde::Serialize;

/// A single decoded element set.
///
/// `epoch` is the instant the orbital elements are valid for, while `fetched_at` is when the
/// fetch cycle that produced this record ran. They are unrelated and must not be mixed up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementSet {
    pub catalog_id: i64,
    pub name: String,
    pub classification: char,
    pub international_designator: String,
    pub epoch: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
    pub mean_motion_dot: Option<f64>,
    pub mean_motion_ddot: Option<f64>,
    pub drag_term: Option<f64>,
    pub inclination_deg: f64,
    pub raan_deg: f64,
    pub eccentricity: f64,
    pub arg_perigee_deg: f64,
    pub mean_anomaly_deg: f64,
    pub mean_motion_rev_per_day: f64,
    pub rev_number: i32,
    pub line1: String,
    pub line2: String,
}

/// A row of the satellites dimension table. Written once per catalog id, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SatelliteDimension {
    pub catalog_id: i64,
    pub name: String,
    pub international_designator: String,
}

/// A row of the telemetry fact table, one per `(catalog_id, epoch)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryFact {
    pub catalog_id: i64,
    pub epoch: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
    pub classification: char,
    pub inclination_deg: f64,
    pub raan_deg: f64,
    pub eccentricity: f64,
    pub arg_perigee_deg: f64,
    pub mean_anomaly_deg: f64,
    pub mean_motion_rev_per_day: f64,
    pub mean_motion_dot: Option<f64>,
    pub mean_motion_ddot: Option<f64>,
    pub drag_term: Option<f64>,
    pub rev_number: i32,
    pub line1: String,
    pub line2: String,
}

impl From<&ElementSet> for SatelliteDimension {
    fn from(element_set: &ElementSet) -> Self {
        Self {
            catalog_id: element_set.catalog_id,
            name: element_set.name.clone(),
            international_designator: element_set.international_designator.clone(),
        }
    }
}

impl From<&ElementSet> for TelemetryFact {
    fn from(element_set: &ElementSet) -> Self {
        Self {
            catalog_id: element_set.catalog_id,
            epoch: element_set.epoch,
            fetched_at: element_set.fetched_at,
            classification: element_set.classification,
            inclination_deg: element_set.inclination_deg,
            raan_deg: element_set.raan_deg,
            eccentricity: element_set.eccentricity,
            arg_perigee_deg: element_set.arg_perigee_deg,
            mean_anomaly_deg: element_set.mean_anomaly_deg,
            mean_motion_rev_per_day: element_set.mean_motion_rev_per_day,
            mean_motion_dot: element_set.mean_motion_dot,
            mean_motion_ddot: element_set.mean_motion_ddot,
            drag_term: element_set.drag_term,
            rev_number: element_set.rev_number,
            line1: element_set.line1.clone(),
            line2: element_set.line2.clone(),
        }
    }
}
