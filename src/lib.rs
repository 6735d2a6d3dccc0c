/// Error types for the check-in runner
pub mod error;

/// Configuration management and account source
pub mod config;

/// Storage service client and response types
pub mod cloud;

/// Personal and family task runners
pub mod tasks;

/// Capacity snapshots and byte formatting
pub mod capacity;

/// Report builder
pub mod report;

/// Webhook notifiers
pub mod notify;

/// Per-account orchestration
pub mod runner;

// Re-export commonly used types
pub use error::{CloudError, ConfigError, NotifyError};
