//! Decoding and reconciliation of two-line element sets.
//!
//! Everything in this crate is synchronous and free of I/O: the ingestor crate owns the
//! network fetch and the store, and hands raw text and store snapshots in here.
pub mod batch;
pub mod decode;
pub mod dimension;
pub mod element_set;
pub mod fact;

pub use batch::{parse_batch, ParsedBatch};
pub use decode::{decode, DecodeError, Field};
pub use dimension::select_new_entities;
pub use element_set::{ElementSet, SatelliteDimension, TelemetryFact};
pub use fact::{select_new_facts, FactKey, FactSelection, RecentWindow};
