use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Timelike, Utc};

use crate::element_set::TelemetryFact;

const KEY_SEPARATOR: char = '_';

/// Identity of a telemetry fact: the catalog id and the epoch in canonical text form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FactKey(String);

impl FactKey {
    pub fn new(catalog_id: i64, epoch: &DateTime<Utc>) -> Self {
        Self::from_parts(catalog_id, &canonical_epoch(epoch))
    }

    /// Build a key from an epoch that is already text. The text is used verbatim, so it only
    /// matches keys from `FactKey::new` when it is in the exact form `canonical_epoch` produces.
    pub fn from_parts(catalog_id: i64, epoch: &str) -> Self {
        Self(format!("{catalog_id}{KEY_SEPARATOR}{epoch}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&TelemetryFact> for FactKey {
    fn from(fact: &TelemetryFact) -> Self {
        FactKey::new(fact.catalog_id, &fact.epoch)
    }
}

/// Render an epoch as `YYYY-MM-DDTHH:MM:SS`, with a six digit fraction only when the epoch is
/// not on a whole second.
pub fn canonical_epoch(epoch: &DateTime<Utc>) -> String {
    if epoch.nanosecond() / 1_000 == 0 {
        epoch.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        epoch.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}

/// Keys of the facts stored within a trailing interval of epochs.
#[derive(Debug, Clone, Default)]
pub struct RecentWindow {
    keys: HashSet<FactKey>,
}

impl RecentWindow {
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (i64, DateTime<Utc>)>,
    {
        rows.into_iter()
            .map(|(catalog_id, epoch)| FactKey::new(catalog_id, &epoch))
            .collect()
    }

    pub fn contains(&self, key: &FactKey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl FromIterator<FactKey> for RecentWindow {
    fn from_iter<T: IntoIterator<Item = FactKey>>(iter: T) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Default)]
pub struct FactSelection {
    /// Facts to insert, in batch order.
    pub new: Vec<TelemetryFact>,
    /// Facts dropped because the window already holds their key.
    pub skipped_in_window: usize,
    /// Facts dropped because an earlier fact in the same batch had the same key.
    pub skipped_in_batch: usize,
}

impl FactSelection {
    pub fn skipped(&self) -> usize {
        self.skipped_in_window + self.skipped_in_batch
    }
}

/// Select the telemetry facts that are not stored yet.
///
/// A fact is dropped when its key is in `window` or was already selected earlier in the batch.
///
/// This does not guarantee that no duplicate is ever inserted: `window` only covers the epochs
/// of a trailing interval, and a fact whose epoch is older than that interval is not checked
/// against the store at all, so re-ingesting it inserts it again.
pub fn select_new_facts(decoded: Vec<TelemetryFact>, window: &RecentWindow) -> FactSelection {
    let mut selection = FactSelection::default();
    let mut batch_keys = HashSet::with_capacity(decoded.len());

    for fact in decoded {
        let key = FactKey::from(&fact);
        if window.contains(&key) {
            selection.skipped_in_window += 1;
        } else if !batch_keys.insert(key) {
            selection.skipped_in_batch += 1;
        } else {
            selection.new.push(fact);
        }
    }

    selection
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn fact(catalog_id: i64, epoch: DateTime<Utc>) -> TelemetryFact {
        TelemetryFact {
            catalog_id,
            epoch,
            fetched_at: epoch + Duration::hours(6),
            classification: 'U',
            inclination_deg: 53.05,
            raan_deg: 110.23,
            eccentricity: 0.000142,
            arg_perigee_deg: 86.43,
            mean_anomaly_deg: 273.68,
            mean_motion_rev_per_day: 15.06,
            mean_motion_dot: Some(0.00001103),
            mean_motion_ddot: Some(0.0),
            drag_term: Some(0.94143e-4),
            rev_number: 23100,
            line1: String::new(),
            line2: String::new(),
        }
    }

    fn new_year() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_fact_key_format() {
        assert_eq!(
            FactKey::new(100, &new_year()).as_str(),
            "100_2024-01-01T00:00:00"
        );

        let epoch = new_year() + Duration::microseconds(104_192);
        assert_eq!(
            FactKey::new(100, &epoch).to_string(),
            "100_2024-01-01T00:00:00.104192"
        );
    }

    #[test]
    fn test_canonical_epoch_ignores_sub_microsecond_noise() {
        let epoch = new_year() + Duration::nanoseconds(999);
        assert_eq!(canonical_epoch(&epoch), "2024-01-01T00:00:00");
    }

    #[test]
    fn test_select_new_facts_drops_window_matches() {
        let window = RecentWindow::from_rows([(100, new_year())]);
        let decoded = vec![
            fact(100, new_year()),
            fact(100, new_year() + Duration::hours(12)),
            fact(200, new_year()),
        ];

        let selection = select_new_facts(decoded, &window);

        assert_eq!(selection.skipped_in_window, 1);
        assert_eq!(selection.new.len(), 2);
        assert_eq!(selection.new[0].epoch, new_year() + Duration::hours(12));
        assert_eq!(selection.new[1].catalog_id, 200);
    }

    #[test]
    fn test_window_key_from_canonical_text_matches() {
        let window: RecentWindow = [FactKey::from_parts(100, "2024-01-01T00:00:00")]
            .into_iter()
            .collect();

        let selection = select_new_facts(vec![fact(100, new_year())], &window);

        assert!(selection.new.is_empty());
        assert_eq!(selection.skipped(), 1);
    }

    // A window whose epochs were rendered without the time of day silently misses real
    // duplicates. Keys must be built from timestamps through `FactKey::new` on both sides.
    #[test]
    fn test_window_key_with_other_canonicalization_misses_duplicate() {
        let window: RecentWindow = [FactKey::from_parts(100, "2024-01-01")]
            .into_iter()
            .collect();

        let selection = select_new_facts(vec![fact(100, new_year())], &window);

        assert_eq!(selection.new.len(), 1);
        assert_eq!(selection.skipped(), 0);

        let window: RecentWindow = [FactKey::from_parts(100, "2024-01-01 00:00:00+00:00")]
            .into_iter()
            .collect();

        let selection = select_new_facts(vec![fact(100, new_year())], &window);

        assert_eq!(selection.new.len(), 1);
    }

    #[test]
    fn test_select_new_facts_drops_duplicates_within_batch() {
        let decoded = vec![
            fact(100, new_year()),
            fact(100, new_year()),
            fact(100, new_year() + Duration::minutes(90)),
        ];

        let selection = select_new_facts(decoded, &RecentWindow::default());

        assert_eq!(selection.new.len(), 2);
        assert_eq!(selection.skipped_in_batch, 1);
        assert_eq!(selection.skipped_in_window, 0);
    }

    #[test]
    fn test_select_new_facts_outside_window_is_not_detected() {
        // The stored copy is older than the window, so the snapshot does not contain it.
        let stored_epoch = new_year() - Duration::days(30);
        let window = RecentWindow::from_rows([(100, new_year())]);

        let selection = select_new_facts(vec![fact(100, stored_epoch)], &window);

        assert_eq!(selection.new.len(), 1);
    }

    #[test]
    fn test_recent_window_len() {
        let window = RecentWindow::from_rows([
            (1, new_year()),
            (1, new_year()),
            (2, new_year()),
        ]);

        assert_eq!(window.len(), 2);
        assert!(!window.is_empty());
        assert!(RecentWindow::default().is_empty());
    }
}
