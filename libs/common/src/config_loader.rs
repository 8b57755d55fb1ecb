//! Configuration loading helper functions
//! Provides utilities for resolving single values with fallback logic

use std::fmt::Display;
use std::str::FromStr;
use tracing::{debug, warn};

/// Get configuration value with priority: explicit > ENV > Default
///
/// # Arguments
/// * `explicit` - Value given explicitly (e.g. a command line flag)
/// * `env_var` - Environment variable name to check
/// * `default` - Default value to use as fallback
pub fn get_config_value<T>(explicit: Option<T>, env_var: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    // Priority 1: explicit value
    if let Some(val) = explicit {
        debug!("Using explicit value for {}", env_var);
        return val;
    }

    // Priority 2: Environment variable
    if let Ok(env_str) = std::env::var(env_var) {
        match env_str.parse::<T>() {
            Ok(val) => {
                debug!("Using {} from environment: {}", env_var, env_str);
                return val;
            },
            Err(e) => {
                warn!("Failed to parse {} from environment: {}", env_var, e);
            },
        }
    }

    // Priority 3: Default value
    debug!("Using default value for {}", env_var);
    default
}

/// Get string configuration value with priority: explicit > ENV > Default
///
/// Empty strings count as "not set" at every level.
pub fn get_string_config(explicit: Option<String>, env_var: &str, default: &str) -> String {
    if let Some(val) = explicit {
        if !val.is_empty() {
            debug!("Using explicit value for {}", env_var);
            return val;
        }
    }

    if let Ok(env_val) = std::env::var(env_var) {
        if !env_val.is_empty() {
            debug!("Using {} from environment", env_var);
            return env_val;
        }
    }

    debug!("Using default value for {}", env_var);
    default.to_string()
}
