use chrono::{DateTime, Utc};
use rayon::prelude::*;
use tracing::warn;

use crate::decode::{decode, DecodeError};
use crate::element_set::ElementSet;

/// Lines per record: a name line followed by the two data lines.
pub const LINES_PER_RECORD: usize = 3;

/// The outcome of decoding a whole payload.
#[derive(Debug, Default)]
pub struct ParsedBatch {
    /// Successfully decoded records, in source order.
    pub records: Vec<ElementSet>,
    /// Zero-based record index within the payload and the reason it was rejected.
    pub failures: Vec<(usize, DecodeError)>,
}

impl ParsedBatch {
    /// Number of complete records found in the payload, decoded or not.
    pub fn attempted(&self) -> usize {
        self.records.len() + self.failures.len()
    }

    /// Records that were kept but lost their drag term to an unparseable encoding.
    pub fn drag_term_unparseable(&self) -> usize {
        self.records
            .iter()
            .filter(|record| record.drag_term.is_none())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Split a raw payload into name/line 1/line 2 groups and decode each of them.
///
/// A group that fails to decode is logged and collected in `failures`, it never stops the rest of
/// the batch. A trailing group with fewer than three lines is an incomplete tail and is dropped
/// without being reported.
pub fn parse_batch(raw: &str, fetched_at: DateTime<Utc>) -> ParsedBatch {
    let lines: Vec<&str> = raw.trim().lines().map(str::trim).collect();

    let decoded: Vec<(usize, Result<ElementSet, DecodeError>)> = lines
        .par_chunks_exact(LINES_PER_RECORD)
        .enumerate()
        .map(|(index, group)| (index, decode(group[1], group[2], group[0], fetched_at)))
        .collect();

    let mut batch = ParsedBatch::default();
    for (index, result) in decoded {
        match result {
            Ok(record) => batch.records.push(record),
            Err(error) => {
                let name = lines[index * LINES_PER_RECORD];
                warn!(index, name, "failed to decode element set: {}", error);
                batch.failures.push((index, error));
            }
        }
    }

    batch
}
