//! Environment variable parsing utilities.
//!
//! Every tunable in the workspace (endpoints, timeouts, cache budget) is read
//! through these helpers so an unset or unparsable variable always falls back
//! to the documented default instead of failing startup.
//!
//! ```
//! use vitae_types::env_utils::{env_var, env_var_or};
//!
//! let timeout: u64 = env_var_or("VITAE_TIMEOUT_SECS", 30);
//! let budget: Option<u64> = env_var("VITAE_CACHE_MAX_BYTES");
//! ```

use std::str::FromStr;

/// Parse an environment variable into a type that implements `FromStr`.
///
/// Returns `None` if the variable is not set or cannot be parsed.
pub fn env_var<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Parse an environment variable with a default value.
pub fn env_var_or<T: FromStr>(key: &str, default: T) -> T {
    env_var(key).unwrap_or(default)
}

/// Get an environment variable as a string with a default value.
///
/// A variable that is set but blank counts as unset.
pub fn env_string_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ => default.to_string(),
    }
}

/// Parse a comma-separated environment variable into a vector.
///
/// Blank entries are dropped; an unset variable yields an empty vector.
///
/// ```
/// use vitae_types::env_utils::env_list;
///
/// // VITAE_WALRUS_PUBLISHERS="https://a, https://b" -> ["https://a", "https://b"]
/// let publishers: Vec<String> = env_list("VITAE_WALRUS_PUBLISHERS");
/// ```
pub fn env_list(key: &str) -> Vec<String> {
    std::env::var(key)
        .ok()
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}
