//! Configuration types for medline-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

/// Default location of the MEDLINE annual baseline
pub const DEFAULT_BASE_URL: &str = "https://ftp.ncbi.nlm.nih.gov/pubmed/baseline/";

/// Remote source settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base location of the listing; file URLs are `base_url + name`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout for establishing a connection (default: 30 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

/// Download behavior configuration (destination, concurrency, decompression)
///
/// Groups settings related to how files are fetched and stored.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Destination directory for downloaded files (default: "./xml")
    #[serde(default = "default_dest_dir")]
    pub dest_dir: PathBuf,

    /// Maximum concurrent downloads (default: 16, must be at least 1)
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    /// Decompress `.gz` files while downloading and store them without the suffix
    #[serde(default)]
    pub decompress_on_download: bool,

    /// Remove existing files from the destination directory before downloading
    #[serde(default)]
    pub clean_before_download: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            dest_dir: default_dest_dir(),
            concurrency_limit: default_concurrency_limit(),
            decompress_on_download: false,
            clean_before_download: false,
        }
    }
}

/// Main configuration for a medline-dl run
///
/// Passed explicitly into the downloader and the extraction pass; there is no
/// process-wide configuration state. Sub-config fields are flattened, so the
/// JSON form has no nesting.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote source settings
    #[serde(flatten)]
    pub source: SourceConfig,

    /// Download behavior settings
    #[serde(flatten)]
    pub download: DownloadConfig,
}

impl Config {
    /// Load a configuration from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| Error::Config {
            message: format!("failed to parse {}: {}", path.display(), e),
            key: None,
        })
    }

    /// Check the settings the core relies on.
    pub fn validate(&self) -> Result<()> {
        if self.download.concurrency_limit == 0 {
            return Err(Error::config("concurrency_limit", "must be at least 1"));
        }
        if self.source.base_url.trim().is_empty() {
            return Err(Error::config("base_url", "must not be empty"));
        }
        url::Url::parse(&self.source.base_url).map_err(|e| {
            Error::config("base_url", format!("invalid URL '{}': {}", self.source.base_url, e))
        })?;
        Ok(())
    }

    /// Destination directory
    pub fn dest_dir(&self) -> &PathBuf {
        &self.download.dest_dir
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_dest_dir() -> PathBuf {
    PathBuf::from("xml")
}

fn default_concurrency_limit() -> usize {
    16
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
