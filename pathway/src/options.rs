//! Graph-wide configuration.

use serde::{Deserialize, Serialize};

use crate::errors::{PathwayError, PathwayResult};
use crate::logging::LoggingOptions;
use crate::pipeline::Direction;

pub const ENV_HEALING: &str = "PATHWAY_HEALING";
pub const ENV_DIRECTION: &str = "PATHWAY_DIRECTION";

/// Options fixed when a [`Graph`](crate::Graph) is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphOptions {
    /// When false, healing makes a single attempt with every cache trusted.
    pub healing_enabled: bool,
    /// Direction of evaluations that do not choose one.
    pub default_direction: Direction,
    pub logging: LoggingOptions,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            healing_enabled: true,
            default_direction: Direction::default(),
            logging: LoggingOptions::default(),
        }
    }
}

impl GraphOptions {
    /// Defaults overridden by `PATHWAY_HEALING` and `PATHWAY_DIRECTION`.
    pub fn from_env() -> PathwayResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> PathwayResult<Self> {
        let mut options = Self::default();
        if let Some(raw) = lookup(ENV_HEALING) {
            options.healing_enabled = parse_flag(ENV_HEALING, &raw)?;
        }
        if let Some(raw) = lookup(ENV_DIRECTION) {
            options.default_direction = raw.parse()?;
        }
        Ok(options)
    }
}

fn parse_flag(key: &str, raw: &str) -> PathwayResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(PathwayError::Config(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let options = GraphOptions::default();
        assert!(options.healing_enabled);
        assert_eq!(options.default_direction, Direction::LazyRightDriven);
        assert_eq!(GraphOptions::from_lookup(lookup(&[])).unwrap(), options);
    }

    #[test]
    fn test_env_overrides() {
        let options = GraphOptions::from_lookup(lookup(&[
            (ENV_HEALING, "off"),
            (ENV_DIRECTION, "eager"),
        ]))
        .unwrap();
        assert!(!options.healing_enabled);
        assert_eq!(options.default_direction, Direction::EagerLeftFirst);
    }

    #[test]
    fn test_invalid_env_rejected() {
        let err = GraphOptions::from_lookup(lookup(&[(ENV_HEALING, "maybe")])).unwrap_err();
        assert!(matches!(err, PathwayError::Config(_)));

        let err = GraphOptions::from_lookup(lookup(&[(ENV_DIRECTION, "upward")])).unwrap_err();
        assert!(matches!(err, PathwayError::Config(_)));
    }

    #[test]
    fn test_deserialize_partial() {
        let options: GraphOptions =
            serde_json::from_str(r#"{"default_direction": "eager_left_first"}"#).unwrap();
        assert!(options.healing_enabled);
        assert_eq!(options.default_direction, Direction::EagerLeftFirst);
        assert_eq!(options.logging, LoggingOptions::default());
    }
}
