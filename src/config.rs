//! Configuration for histkv
//!
//! Centralized configuration with sensible defaults.

use crate::diagnostics::VerboseLevel;
use crate::encoding::EncodingDefinition;
use crate::error::{HistError, Result};
use crate::storage::ReaderOptions;

/// Upper bound on records per archive block
pub const MAX_RECORDS_PER_BLOCK: u32 = 1 << 20;

/// Main configuration for a histkv instance
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Archive Configuration
    // -------------------------------------------------------------------------
    /// Codec pair used when writing archives
    pub encoding: EncodingDefinition,

    /// Records per compressed block. Each block restarts the delta chain,
    /// so this is also the granularity of a seek.
    pub records_per_block: u32,

    // -------------------------------------------------------------------------
    // Query Configuration
    // -------------------------------------------------------------------------
    /// Default limits applied to point streams
    pub reader_options: ReaderOptions,

    // -------------------------------------------------------------------------
    // Diagnostics Configuration
    // -------------------------------------------------------------------------
    /// Levels a `LogReporter` built from this config forwards to subscribers
    pub verbose: VerboseLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            encoding: EncodingDefinition::default(),
            records_per_block: 256,
            reader_options: ReaderOptions::default(),
            verbose: VerboseLevel::ALL,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.records_per_block == 0 || self.records_per_block > MAX_RECORDS_PER_BLOCK {
            return Err(HistError::Config(format!(
                "records_per_block must be in 1..={}, got {}",
                MAX_RECORDS_PER_BLOCK, self.records_per_block
            )));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn encoding(mut self, encoding: EncodingDefinition) -> Self {
        self.config.encoding = encoding;
        self
    }

    pub fn records_per_block(mut self, count: u32) -> Self {
        self.config.records_per_block = count;
        self
    }

    pub fn reader_options(mut self, options: ReaderOptions) -> Self {
        self.config.reader_options = options;
        self
    }

    pub fn verbose(mut self, levels: VerboseLevel) -> Self {
        self.config.verbose = levels;
        self
    }

    /// Validate and build the config
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
