//! Helpers shared by the `from_config` constructors of vendor drivers.
//!
//! Drivers accept an optional JSON config whose fields all have defaults.
//! API keys are never part of the JSON; the config names the environment
//! variable to read them from.

use serde::de::DeserializeOwned;
use tracing::error;

use crate::drivers::DriverError;

/// Parses `json` into the driver's config type, `T::default()` when absent.
pub fn parse_config<T: DeserializeOwned + Default>(
    driver: &'static str,
    json: Option<&str>,
) -> Result<T, DriverError> {
    match json {
        None => Ok(T::default()),
        Some(json) => serde_json::from_str(json).map_err(|e| {
            let message = format!("Failed to deserialize json config: {e}");
            error!(driver, "{message}");
            DriverError::Config { driver, message }
        }),
    }
}

/// Reads an API key from the environment variable `var`.
pub fn read_api_key(driver: &'static str, var: &str) -> Result<String, DriverError> {
    std::env::var(var).map_err(|e| {
        let message = format!("Failed to fetch env var `{var}`: {e}");
        error!(driver, "{message}");
        DriverError::Config { driver, message }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(deny_unknown_fields)]
    struct TestConfig {
        model: Option<String>,
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let config: TestConfig = parse_config("TestDriver", None).unwrap();
        assert_eq!(config, TestConfig::default());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let err = parse_config::<TestConfig>("TestDriver", Some(r#"{"modle": "x"}"#)).unwrap_err();
        assert!(matches!(err, DriverError::Config { driver: "TestDriver", .. }));
    }

    #[test]
    fn test_missing_env_var() {
        let err = read_api_key("TestDriver", "ARTIFEX_TEST_UNSET_VARIABLE").unwrap_err();
        assert!(err.to_string().contains("ARTIFEX_TEST_UNSET_VARIABLE"));
    }
}
