//! Engine configuration: ring capacity, compression level, and the
//! temp-file naming used by the atomic save protocol.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{ArchiveError, Result};

/// Default number of reversion snapshots retained per project.
pub const DEFAULT_MAX_REVERSIONS: usize = 10;

/// Default deflate level used when writing archive entries (0-9).
pub const DEFAULT_COMPRESSION_LEVEL: i64 = 6;

/// Filename stem of the scratch file used during a save attempt.
///
/// The temp file lives in the project's own working directory so the
/// final rename stays on one filesystem. Stale copies from crashed
/// saves are renamed aside with an epoch-seconds suffix, never removed.
pub const DEFAULT_TEMP_FILE_STEM: &str = "lexarc_save.tmp";

/// Configuration for an [`ArchiveEngine`](crate::save::ArchiveEngine).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of reversion snapshots kept in the ring
    pub max_reversions: usize,
    /// Deflate level for archive entries (0 = store, 9 = maximum)
    pub compression_level: i64,
    /// Filename stem for the working-directory temp save file
    pub temp_file_stem: String,
}

impl EngineConfig {
    /// Load configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_reversions == 0 {
            return Err(ArchiveError::validation(
                "max_reversions must be at least 1",
            ));
        }
        if !(0..=9).contains(&self.compression_level) {
            return Err(ArchiveError::validation(
                "compression_level must be between 0 and 9",
            ));
        }
        if self.temp_file_stem.is_empty() || self.temp_file_stem.contains(std::path::MAIN_SEPARATOR)
        {
            return Err(ArchiveError::validation(
                "temp_file_stem must be a bare file name",
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_reversions: DEFAULT_MAX_REVERSIONS,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            temp_file_stem: DEFAULT_TEMP_FILE_STEM.to_string(),
        }
    }
}
