//! # histkv
//!
//! Storage and query core of a time-series historian:
//! - Delta codecs for (timestamp, point id) keys and (value, quality) values
//! - Seek, key-match and value-match filters with a tagged binary format
//! - Cancellable point streams over any sorted-tree engine
//! - Frame merge: one frame of point values per timestamp
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Query                                │
//! │      PointStream · PointStreamExt · merge_to_frames          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  ScanFilters (seek / match / value)
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                 Sorted-Tree Engine Contract                  │
//! │        SortedTreeEngine → EngineReader → TreeStream          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌──────────────┐          ┌──────────────┐
//!   │ MemoryArchive│ ──flush─►│ ArchiveFile  │
//!   │ (Arc + RwLock│          │ (blocks +    │
//!   │  snapshots)  │          │  sparse idx) │
//!   └──────────────┘          └──────┬───────┘
//!                                    │
//!                                    ▼
//!                             ┌─────────────┐
//!                             │  Encoding   │
//!                             │ (key+value) │
//!                             └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod model;
pub mod encoding;
pub mod filters;
pub mod storage;
pub mod query;
pub mod diagnostics;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{HistError, Result};
pub use config::Config;
pub use model::{HistorianKey, HistorianValue, ValueStruct};
pub use query::{merge_to_frames, open_point_stream, FrameData, PointStream, PointStreamExt};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of histkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
