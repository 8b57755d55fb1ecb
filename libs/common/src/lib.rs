//! Recipe workspace basic library
//!
//! Provides functions shared by the link library and the CLI:
//! - logging setup and log file maintenance
//! - configuration value resolution
//! - shutdown signal handling
//! - serde helpers for loosely typed input

pub mod config_loader;
pub mod logging;
pub mod serde_helpers;
pub mod shutdown;

// Re-export common dependencies
pub use serde;
pub use serde_json;
pub use tokio;
