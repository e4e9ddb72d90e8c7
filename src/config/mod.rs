//! # Configuration
//!
//! Settings loaded from environment variables.
//!
//! - `lifecycle`: scheduling and deactivation policy shared by the job and the CLI
//! - `controller`: runtime settings of the job binary (logging, metrics, timeouts)

pub mod controller;
pub mod lifecycle;

pub use controller::ControllerConfig;
pub use lifecycle::{LifecycleConfig, ShutdownOffsetError};

/// Read environment variable or return default value
pub(crate) fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
pub(crate) fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map_or(default, |v| parse_bool(&v))
}

/// Read environment variable as string or return default
pub(crate) fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read an optional environment variable. Blank values count as unset.
pub(crate) fn env_var_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_accepts_common_spellings() {
        for value in ["true", "TRUE", "1", "yes", " on "] {
            assert!(parse_bool(value), "{value} should be true");
        }
        for value in ["false", "0", "no", "off", ""] {
            assert!(!parse_bool(value), "{value} should be false");
        }
    }

    #[test]
    fn test_env_var_or_default_falls_back_on_garbage() {
        // Unique names so parallel tests never race on the same variable
        std::env::set_var("KUBE_ESG_TEST_GARBAGE_NUMBER", "seven");
        assert_eq!(env_var_or_default("KUBE_ESG_TEST_GARBAGE_NUMBER", 7_i64), 7);
        std::env::set_var("KUBE_ESG_TEST_VALID_NUMBER", " 14 ");
        assert_eq!(env_var_or_default("KUBE_ESG_TEST_VALID_NUMBER", 7_i64), 14);
        assert_eq!(env_var_or_default("KUBE_ESG_TEST_MISSING_NUMBER", 3_u64), 3);
    }

    #[test]
    fn test_env_var_opt_treats_blank_as_unset() {
        std::env::set_var("KUBE_ESG_TEST_BLANK_LABEL", "   ");
        assert_eq!(env_var_opt("KUBE_ESG_TEST_BLANK_LABEL"), None);
        std::env::set_var("KUBE_ESG_TEST_SET_LABEL", "team");
        assert_eq!(
            env_var_opt("KUBE_ESG_TEST_SET_LABEL"),
            Some("team".to_string())
        );
    }
}
