//! Configuration for the sleet writer.

mod cli;

pub use cli::CliArgs;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use snafu::prelude::*;
use std::collections::HashMap;
use std::path::Path;

use crate::encoder::{Flattening, SheetEncoder};
use crate::error::{ConfigError, EncodingError};
use sleet_core::error::{
    EmptyDestinationUrlSnafu, EmptyStreamNameSnafu, PartSizeTooLargeSnafu, ReadFileSnafu,
    YamlParseSnafu, ZeroOptionSnafu,
};
pub use sleet_core::config::{MAX_PART_SIZE, S3_MIN_PART_SIZE, interpolate};
pub use sleet_core::{KB, MB};

/// Where the output object is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DestinationConfig {
    /// Storage URL with an optional key prefix (supports S3, GCS, Azure, local, memory).
    pub url: String,
    /// Storage options for the backend builder (credentials, region, etc.).
    #[serde(default)]
    pub storage_options: HashMap<String, String>,
}

/// What to do with objects left by earlier runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Keep existing objects.
    #[default]
    Append,
    /// Delete every object under the stream prefix before writing.
    Overwrite,
}

/// The stream being written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamConfig {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub sync_mode: SyncMode,
    /// JSON schema of the record payloads. Required for root level flattening.
    #[serde(default)]
    pub json_schema: Option<Value>,
}

/// Output format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", deny_unknown_fields)]
pub enum FormatConfig {
    Csv {
        #[serde(default)]
        flattening: Flattening,
        /// Part size in MiB.
        #[serde(default = "default_part_size_mb")]
        part_size_mb: usize,
    },
}

impl Default for FormatConfig {
    fn default() -> Self {
        FormatConfig::Csv {
            flattening: Flattening::default(),
            part_size_mb: default_part_size_mb(),
        }
    }
}

impl FormatConfig {
    pub fn flattening(&self) -> Flattening {
        match self {
            FormatConfig::Csv { flattening, .. } => *flattening,
        }
    }

    pub fn part_size(&self) -> usize {
        match self {
            FormatConfig::Csv { part_size_mb, .. } => part_size_mb.saturating_mul(MB),
        }
    }
}

fn default_part_size_mb() -> usize {
    10
}

/// Upload parallelism.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadConfig {
    /// Number of upload worker tasks.
    #[serde(default = "default_upload_threads")]
    pub threads: usize,
    /// Parts that may wait for a worker before writes block.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Appended to the object name before the extension.
    #[serde(default = "default_custom_suffix")]
    pub custom_suffix: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            threads: default_upload_threads(),
            queue_capacity: default_queue_capacity(),
            custom_suffix: default_custom_suffix(),
        }
    }
}

fn default_upload_threads() -> usize {
    10
}

fn default_queue_capacity() -> usize {
    10
}

fn default_custom_suffix() -> String {
    "_0".to_string()
}

/// Construction-time tuning of a writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterOptions {
    pub upload_threads: usize,
    pub queue_capacity: usize,
    /// Part size in bytes.
    pub part_size: usize,
    pub custom_suffix: String,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            upload_threads: default_upload_threads(),
            queue_capacity: default_queue_capacity(),
            part_size: default_part_size_mb() * MB,
            custom_suffix: default_custom_suffix(),
        }
    }
}

impl WriterOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(
            self.upload_threads >= 1,
            ZeroOptionSnafu {
                option: "upload_threads"
            }
        );
        ensure!(
            self.queue_capacity >= 1,
            ZeroOptionSnafu {
                option: "queue_capacity"
            }
        );
        ensure!(self.part_size >= 1, ZeroOptionSnafu { option: "part_size" });
        ensure!(
            self.part_size <= MAX_PART_SIZE,
            PartSizeTooLargeSnafu {
                part_size: self.part_size,
                max: MAX_PART_SIZE,
            }
        );
        Ok(())
    }
}

/// Main configuration for sleet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub destination: DestinationConfig,
    pub stream: StreamConfig,
    #[serde(default)]
    pub format: FormatConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

impl Config {
    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).context(ReadFileSnafu { path })?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let text = interpolate(contents)?;
        let config: Config = serde_yaml::from_str(&text).context(YamlParseSnafu)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(
            !self.destination.url.trim().is_empty(),
            EmptyDestinationUrlSnafu
        );
        ensure!(!self.stream.name.trim().is_empty(), EmptyStreamNameSnafu);
        self.writer_options().validate()
    }

    /// Writer options derived from the format and upload sections.
    pub fn writer_options(&self) -> WriterOptions {
        WriterOptions {
            upload_threads: self.upload.threads,
            queue_capacity: self.upload.queue_capacity,
            part_size: self.format.part_size(),
            custom_suffix: self.upload.custom_suffix.clone(),
        }
    }

    /// Build the row encoder for the configured flattening.
    pub fn encoder(&self) -> Result<SheetEncoder, EncodingError> {
        SheetEncoder::new(self.format.flattening(), self.stream.json_schema.as_ref())
    }
}
