//! Typed desired-state model decoded from the configuration blob.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// The desired cluster state for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClusterConfig {
    /// Per-node hints. Informational only, never acted upon.
    pub nodes: Map<String, Value>,
    /// Raw `kind/name` tokens in deployment order.
    pub stacks: Vec<String>,
    /// Per-stack overrides keyed by stack name (not kind).
    pub overrides: BTreeMap<String, StackOverrideSpec>,
}

impl ClusterConfig {
    /// Overrides configured for a stack name, if any.
    pub fn overrides_for(&self, name: &str) -> Option<&StackOverrideSpec> {
        self.overrides.get(name)
    }
}

/// Environment variable overrides scoped to one stack name.
///
/// Entries are kept sorted by key so the materialized override file is
/// byte-for-byte reproducible across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StackOverrideSpec {
    pub envs: BTreeMap<String, String>,
}

impl StackOverrideSpec {
    pub fn is_empty(&self) -> bool {
        self.envs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.envs.len()
    }
}

impl<K, V> FromIterator<(K, V)> for StackOverrideSpec
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            envs: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Non-fatal problems noticed while decoding.
///
/// These are the named leniency policies: a malformed optional section is
/// treated as empty and the run continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecodeWarning {
    /// `stacks` was present but not an array; treated as empty.
    MalformedStacks { found: String },
    /// `nodes` was present but not an object; treated as empty.
    MalformedNodes { found: String },
    /// `config` was present but not an object; no stack gets overrides.
    MalformedConfig { found: String },
    /// One `config.<name>` entry could not be mapped; that stack gets no
    /// overrides.
    MalformedOverride { name: String, reason: String },
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeWarning::MalformedStacks { found } => {
                write!(f, "'stacks' should be an array but is {}; treating it as empty", found)
            }
            DecodeWarning::MalformedNodes { found } => {
                write!(f, "'nodes' should be an object but is {}; ignoring it", found)
            }
            DecodeWarning::MalformedConfig { found } => {
                write!(f, "'config' should be an object but is {}; ignoring it", found)
            }
            DecodeWarning::MalformedOverride { name, reason } => {
                write!(f, "{}; deploying '{}' without overrides", reason, name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_spec_collects_sorted() {
        let spec: StackOverrideSpec = [("ZETA", "1"), ("ALPHA", "2")].into_iter().collect();
        let keys: Vec<&str> = spec.envs.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["ALPHA", "ZETA"]);
        assert_eq!(spec.len(), 2);
        assert!(!spec.is_empty());
    }

    #[test]
    fn test_overrides_for_unknown_name() {
        let config = ClusterConfig::default();
        assert!(config.overrides_for("postgres").is_none());
    }

    #[test]
    fn test_decode_warning_display() {
        let warning = DecodeWarning::MalformedStacks {
            found: "a string".into(),
        };
        assert!(warning.to_string().contains("treating it as empty"));

        let warning = DecodeWarning::MalformedOverride {
            name: "web".into(),
            reason: "'config.web.envs.A' must be a scalar, found null".into(),
        };
        assert!(warning.to_string().contains("deploying 'web' without overrides"));
    }
}
