//! sleet-core: Shared components for the sleet writer.
//!
//! - `storage/` - Multi-cloud storage abstraction with multipart uploads
//!   (S3, GCS, Azure, local filesystem, in-memory)
//! - `metrics/` - Internal events recorded through the `metrics` facade
//! - `config/` - Byte size constants and environment variable interpolation
//! - `error` - Storage and configuration error types
//! - `tracing` - Subscriber initialisation for the CLI

pub mod config;
pub mod error;
pub mod metrics;
pub mod storage;
pub mod tracing;

// Re-export commonly used items
pub use config::{KB, MB, interpolate};
pub use error::{ConfigError, StorageError};
pub use storage::{BackendConfig, StorageProvider, StorageProviderRef};
pub use crate::tracing::init_tracing;
