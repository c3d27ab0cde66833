//! Data Model
//!
//! The fixed-shape record types every other module moves around.
//!
//! ## Record Layout
//! ```text
//! ┌─────────────────────────────┬──────────────────────────────┐
//! │ HistorianKey                │ HistorianValue               │
//! │   timestamp: u64 (ticks)    │   value:   f64 (measurement) │
//! │   point_id:  u64            │   quality: u32 (flags)       │
//! └─────────────────────────────┴──────────────────────────────┘
//! ```
//!
//! Keys sort by (timestamp, point_id). Values carry no ordering.

mod key;
mod value;

pub use key::HistorianKey;
pub use value::{HistorianValue, ValueStruct};
