//! TOML configuration for the decoder and the mapper.
//!
//! Every field has a default, so an empty file (or no file) gives the stock behaviour:
//!
//! ```toml
//! [mapper]
//! scan_attempts = 30
//! scan_interval_secs = 1
//! settle = true
//! volume_name_hints = []
//! mapper_dir = "/dev/mapper"
//!
//! [decoder]
//! xz = "auto"
//! xzcat = "xzcat"
//! reap_timeout_secs = 60
//! ```

use crate::{ImgmapError, ImgmapResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mapper: MapperConfig,
    pub decoder: DecoderConfig,
}

impl Config {
    pub fn load(path: &Path) -> ImgmapResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
            .map_err(|err| ImgmapError::Config(format!("{}: {}", path.display(), err)))
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// How many times `lsblk` is asked for partitions before giving up.
    pub scan_attempts: u32,
    /// Pause between `lsblk` attempts.
    pub scan_interval_secs: u64,
    /// Run `udevadm settle` after attaching.
    pub settle: bool,
    /// Substrings marking a device-mapper entry as part of the image, on top of the
    /// sysfs holder chain (e.g. `"ubuntu--vg"`).
    pub volume_name_hints: Vec<String>,
    pub mapper_dir: PathBuf,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            scan_attempts: 30,
            scan_interval_secs: 1,
            settle: true,
            volume_name_hints: Vec::new(),
            mapper_dir: PathBuf::from("/dev/mapper"),
        }
    }
}

impl MapperConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }
}

/// How xz images are decompressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum XzStrategy {
    /// Pipe through `xzcat` when it is installed, otherwise decode in-process.
    #[default]
    Auto,
    /// Always use `xzcat`; fail when it is missing.
    External,
    /// Always decode in-process.
    InProcess,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub xz: XzStrategy,
    /// Program used for the external fast path, looked up on `PATH` unless absolute.
    pub xzcat: String,
    /// How long a closed `xzcat` stream is given to exit before it is killed.
    pub reap_timeout_secs: u64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            xz: XzStrategy::Auto,
            xzcat: "xzcat".to_string(),
            reap_timeout_secs: 60,
        }
    }
}

impl DecoderConfig {
    pub fn reap_timeout(&self) -> Duration {
        Duration::from_secs(self.reap_timeout_secs)
    }
}
