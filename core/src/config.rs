//! Mapper behavior configuration.
//!
//! Entity metadata lives in [`EntityDescriptor`](crate::EntityDescriptor);
//! this module only holds the knobs that change how the mapper treats
//! caller input. Both types are serde-serializable so applications can keep
//! them next to their own settings.
//!
//! # Example JSON
//!
//! ```json
//! { "fill_policy": "skip_empty" }
//! ```

use serde::{Deserialize, Serialize};

use crate::Value;

/// How bulk-fill treats "empty" values (`NULL`, `""`, `0`, `0.0`, `false`).
///
/// # Examples
///
/// ```
/// # use kiwi_core::{FillPolicy, Value};
/// assert!(FillPolicy::AcceptAll.accepts(&Value::from("")));
/// assert!(!FillPolicy::SkipEmpty.accepts(&Value::from("")));
/// assert!(FillPolicy::SkipEmpty.accepts(&Value::from("Gustav")));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    /// Assign every value, so a field can be cleared explicitly (the default).
    #[default]
    AcceptAll,
    /// Silently skip empty values, leaving the field untouched.
    SkipEmpty,
}

impl FillPolicy {
    /// Returns `true` if bulk-fill should assign `value`.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            FillPolicy::AcceptAll => true,
            FillPolicy::SkipEmpty => !value.is_empty(),
        }
    }
}

/// Per-model mapper settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapperConfig {
    /// Bulk-fill treatment of empty values.
    #[serde(default)]
    pub fill_policy: FillPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_from_empty_json() {
        let config: MapperConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, MapperConfig::default());
        assert_eq!(config.fill_policy, FillPolicy::AcceptAll);
    }

    #[test]
    fn test_config_parses_skip_empty() {
        let config: MapperConfig =
            serde_json::from_str(r#"{"fill_policy":"skip_empty"}"#).unwrap();
        assert_eq!(config.fill_policy, FillPolicy::SkipEmpty);
    }

    #[test]
    fn test_skip_empty_rejects_falsy_values() {
        for value in [Value::Null, Value::Integer(0), Value::Bool(false), Value::Real(0.0)] {
            assert!(!FillPolicy::SkipEmpty.accepts(&value));
        }
    }
}
