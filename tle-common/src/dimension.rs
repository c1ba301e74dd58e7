use std::collections::HashSet;

use crate::element_set::{ElementSet, SatelliteDimension};

/// Select the satellites that have to be added to the dimension table.
///
/// Records whose catalog id is already stored are dropped, and within the batch only the first
/// occurrence of a catalog id is kept. Later records for the same id are ignored even if their
/// name differs: the first name seen for a satellite is the one that sticks.
pub fn select_new_entities(
    decoded: &[ElementSet],
    existing_ids: &HashSet<i64>,
) -> Vec<SatelliteDimension> {
    let mut seen = HashSet::with_capacity(decoded.len());

    decoded
        .iter()
        .filter(|record| !existing_ids.contains(&record.catalog_id))
        .filter(|record| seen.insert(record.catalog_id))
        .map(SatelliteDimension::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn element_set(catalog_id: i64, name: &str) -> ElementSet {
        let epoch = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        ElementSet {
            catalog_id,
            name: name.to_owned(),
            classification: 'U',
            international_designator: format!("24{catalog_id:03}A"),
            epoch,
            fetched_at: epoch,
            mean_motion_dot: None,
            mean_motion_ddot: None,
            drag_term: None,
            inclination_deg: 53.0,
            raan_deg: 110.0,
            eccentricity: 0.0001,
            arg_perigee_deg: 86.0,
            mean_anomaly_deg: 273.0,
            mean_motion_rev_per_day: 15.06,
            rev_number: 1,
            line1: String::new(),
            line2: String::new(),
        }
    }

    #[test]
    fn test_select_new_entities_filters_existing_and_duplicates() {
        let decoded = vec![
            element_set(100, "KNOWN"),
            element_set(200, "FIRST NAME"),
            element_set(200, "SECOND NAME"),
            element_set(300, "OTHER"),
        ];
        let existing_ids = HashSet::from([100]);

        let selected = select_new_entities(&decoded, &existing_ids);

        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].catalog_id, 200);
        assert_eq!(selected[0].name, "FIRST NAME");
        assert_eq!(selected[1].catalog_id, 300);
    }

    #[test]
    fn test_select_new_entities_all_known() {
        let decoded = vec![element_set(1, "A"), element_set(2, "B")];
        let existing_ids = HashSet::from([1, 2, 3]);

        assert!(select_new_entities(&decoded, &existing_ids).is_empty());
    }

    #[test]
    fn test_select_new_entities_empty_store() {
        let decoded = vec![element_set(7, "A"), element_set(7, "A"), element_set(8, "B")];

        let selected = select_new_entities(&decoded, &HashSet::new());
        let ids: Vec<i64> = selected.iter().map(|s| s.catalog_id).collect();

        assert_eq!(ids, vec![7, 8]);
        assert_eq!(selected[0].international_designator, "24007A");
    }

    #[test]
    fn test_select_new_entities_leaves_input_untouched() {
        let decoded = vec![element_set(5, "A"), element_set(5, "B")];
        let before = decoded.clone();

        select_new_entities(&decoded, &HashSet::new());

        assert_eq!(decoded, before);
    }
}
