//! Environment variable utilities
//!
//! Generic `env_get<T>` for parsing environment variables with defaults,
//! used by the engine config and the kprint setup.

use std::str::FromStr;

/// Get environment variable parsed as type T, or return the default.
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Get environment variable as boolean.
///
/// Accepts "1", "true", "yes", "on" (case-insensitive) as true. Everything
/// else (including unset) returns the default.
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_get_default() {
        let v: usize = env_get("COSTACK_TEST_UNSET_VAR", 17);
        assert_eq!(v, 17);
    }

    #[test]
    fn test_env_get_parses() {
        std::env::set_var("COSTACK_TEST_PARSE_VAR", "32");
        let v: usize = env_get("COSTACK_TEST_PARSE_VAR", 1);
        assert_eq!(v, 32);
        std::env::remove_var("COSTACK_TEST_PARSE_VAR");
    }

    #[test]
    fn test_env_get_bool() {
        assert!(!env_get_bool("COSTACK_TEST_UNSET_BOOL", false));
        std::env::set_var("COSTACK_TEST_BOOL", "yes");
        assert!(env_get_bool("COSTACK_TEST_BOOL", false));
        std::env::remove_var("COSTACK_TEST_BOOL");
    }
}
