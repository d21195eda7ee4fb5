//! File system tunables
//!
//! Configuration is plain data: it can be built in code, deserialized from a
//! TOML document, or left at its defaults. Every constructor that accepts
//! external input runs the `validator` rules before handing out a config.
//!
//! ```toml
//! io_buffer_size = 8192
//! size_probe_chunk = 65536
//! skip_buffer_size = 1024
//! verify_checksums = true
//! ```

use crate::error::{Result, Zip2Error};
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

/// Buffer size used for container reads unless configured otherwise
pub const IO_BUFFER_SIZE: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct FsConfig {
    /// Capacity of the buffered reader wrapped around each container file
    #[validate(range(min = 512))]
    pub io_buffer_size: usize,

    /// Chunk skipped per step when an entry size has to be found by exhausting it
    #[validate(range(min = 1))]
    pub size_probe_chunk: u64,

    /// Scratch buffer owned by each reader for the read-and-discard skip fallback
    #[validate(range(min = 1))]
    pub skip_buffer_size: usize,

    /// Check CRC-32 and length of every entry that is read to its end
    pub verify_checksums: bool,
}

impl Default for FsConfig {
    fn default() -> Self {
        FsConfig {
            io_buffer_size: IO_BUFFER_SIZE,
            size_probe_chunk: 16 * IO_BUFFER_SIZE as u64,
            skip_buffer_size: 1024,
            verify_checksums: true,
        }
    }
}

impl FsConfig {
    /// Parse and validate a TOML document; missing keys keep their defaults
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: FsConfig =
            toml::from_str(source).map_err(|e| Zip2Error::Config(e.to_string()))?;
        config.checked()
    }

    /// Load a TOML config file from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&source)
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Zip2Error::Config(e.to_string()))
    }

    /// Run validation rules, returning the config unchanged when they pass
    pub fn checked(self) -> Result<Self> {
        self.validate()
            .map_err(|e| Zip2Error::Config(e.to_string()))?;
        Ok(self)
    }

    pub fn with_io_buffer_size(mut self, size: usize) -> Self {
        self.io_buffer_size = size;
        self
    }

    pub fn with_size_probe_chunk(mut self, chunk: u64) -> Self {
        self.size_probe_chunk = chunk;
        self
    }

    pub fn with_skip_buffer_size(mut self, size: usize) -> Self {
        self.skip_buffer_size = size;
        self
    }

    pub fn with_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = FsConfig::default();
        assert_eq!(config.io_buffer_size, 4096);
        assert_eq!(config.size_probe_chunk, 65536);
        assert_eq!(config.skip_buffer_size, 1024);
        assert!(config.verify_checksums);
        assert!(config.checked().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = FsConfig::from_toml_str("skip_buffer_size = 64").unwrap();
        assert_eq!(config.skip_buffer_size, 64);
        assert_eq!(config.io_buffer_size, IO_BUFFER_SIZE);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let err = FsConfig::from_toml_str("skip_buffer_size = 0").unwrap_err();
        assert!(matches!(err, Zip2Error::Config(_)));

        let err = FsConfig::from_toml_str("io_buffer_size = 16").unwrap_err();
        assert!(matches!(err, Zip2Error::Config(_)));

        let err = FsConfig::from_toml_str("unknown_key = 1").unwrap_err();
        assert!(matches!(err, Zip2Error::Config(_)));
    }

    #[test]
    fn test_load_round_trip_through_file() {
        let config = FsConfig::default()
            .with_io_buffer_size(8192)
            .with_checksums(false);

        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), config.to_toml_string().unwrap()).unwrap();

        let loaded = FsConfig::load(file.path()).unwrap();
        assert_eq!(loaded, config);
    }
}
