//! Diagnostics Module
//!
//! Level-gated reporting for in-process consumers, mirrored to `tracing`.
//!
//! ## Flow
//! ```text
//! LogReporter::log_message(level, ..)
//!     │
//!     ├──► tracing event (always)
//!     │
//!     └──► Logger ──► LogSubscriber channels whose mask contains `level`
//! ```
//!
//! The logger keeps one union mask of all subscriber masks, recomputed on
//! every subscribe and unsubscribe. Reporters read it to skip building
//! messages nobody receives.

mod level;
mod logger;

pub use level::VerboseLevel;
pub use logger::{LogMessage, LogReporter, LogSubscriber, Logger};

use crate::config::Config;

impl Logger {
    /// Reporter capped to the levels enabled in `config`
    pub fn reporter_for(&self, source: impl Into<String>, config: &Config) -> LogReporter {
        self.reporter_with_limit(source, config.verbose)
    }
}
