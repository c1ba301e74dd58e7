pub const CYCLES: &str = "tle_ingest_cycles_total";
pub const CYCLE_TIME: &str = "tle_ingest_cycle_duration_seconds";
pub const LAST_CYCLE_TIMESTAMP: &str = "tle_ingest_last_cycle_timestamp_seconds";
pub const FETCH_FAILURES: &str = "tle_ingest_fetch_failures_total";
pub const PAYLOAD_BYTES: &str = "tle_ingest_payload_bytes";
pub const RECORDS_DECODED: &str = "tle_ingest_records_decoded_total";
pub const DECODE_FAILURES: &str = "tle_ingest_decode_failures_total";
pub const DRAG_TERM_UNPARSEABLE: &str = "tle_ingest_drag_term_unparseable_total";
pub const ROWS_INSERTED: &str = "tle_ingest_rows_inserted_total";
pub const ROWS_SKIPPED: &str = "tle_ingest_rows_skipped_total";
pub const STAGE_FAILURES: &str = "tle_ingest_stage_failures_total";
