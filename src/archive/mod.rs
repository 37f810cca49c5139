//! Archival core
//!
//! Normalization of inbound events into canonical records, capture upserts,
//! challenge-based reconciliation against the live service, and point-in-time
//! export.

pub mod capture;
pub mod export;
pub mod normalizer;
pub mod record;
pub mod reconcile;

pub use export::Exporter;
pub use normalizer::{extract_media, parse_message};
pub use reconcile::{ReconcileSummary, Reconciler};
pub use record::{ChatType, Media, Record};
