//! Configuration blob decoding.
//!
//! The blob arrives base64-encoded through the environment. Decoding happens
//! in two stages so each failure has a distinct cause:
//!
//! 1. Transport: base64 → UTF-8 text (`ConfigError::Encoding`)
//! 2. Structure: text → document via a [`DocumentParser`] (`ConfigError::Parse`)
//!
//! The document is then mapped onto [`ClusterConfig`] with explicit defaults
//! for every optional field.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::types::{ClusterConfig, DecodeWarning, StackOverrideSpec};
use crate::errors::ConfigError;

/// Turns decoded text into a generic document.
///
/// Real implementation: [`JsonDocumentParser`]. Tests can substitute a
/// double that returns a fixed document.
pub trait DocumentParser: Send + Sync {
    fn parse(&self, text: &str) -> Result<Value, String>;
}

/// Parses documents with `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDocumentParser;

impl DocumentParser for JsonDocumentParser {
    fn parse(&self, text: &str) -> Result<Value, String> {
        serde_json::from_str(text).map_err(|e| e.to_string())
    }
}

/// Result of decoding a possibly-absent blob.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// No blob was supplied. The run has nothing to do and succeeds.
    NoConfiguration,
    /// A configuration plus any leniency warnings recorded while mapping it.
    Config {
        config: ClusterConfig,
        warnings: Vec<DecodeWarning>,
    },
}

/// Decodes the configuration blob into a typed [`ClusterConfig`].
pub struct ConfigDecoder<P = JsonDocumentParser> {
    parser: P,
}

impl ConfigDecoder {
    /// Decoder backed by the `serde_json` parser.
    pub fn json() -> Self {
        Self::new(JsonDocumentParser)
    }
}

impl<P: DocumentParser> ConfigDecoder<P> {
    pub fn new(parser: P) -> Self {
        Self { parser }
    }

    /// Decode a raw blob. `None` or a blank blob yields [`Decoded::NoConfiguration`].
    pub fn decode(&self, raw: Option<&str>) -> Result<Decoded, ConfigError> {
        let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
            return Ok(Decoded::NoConfiguration);
        };

        let text = decode_transport(raw)?;
        let document = self.parser.parse(&text).map_err(ConfigError::Parse)?;
        let (config, warnings) = map_document(document)?;

        Ok(Decoded::Config { config, warnings })
    }
}

/// Strip whitespace (wrapped `base64` output contains newlines) and decode.
fn decode_transport(raw: &str) -> Result<String, ConfigError> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = BASE64_STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| ConfigError::Encoding(e.to_string()))?;
    String::from_utf8(bytes)
        .map_err(|e| ConfigError::Encoding(format!("decoded bytes are not UTF-8: {}", e)))
}

fn map_document(document: Value) -> Result<(ClusterConfig, Vec<DecodeWarning>), ConfigError> {
    let mut root = match document {
        Value::Object(root) => root,
        other => {
            return Err(ConfigError::Parse(format!(
                "top level must be an object, found {}",
                describe(&other)
            )));
        }
    };

    let mut warnings = Vec::new();

    let nodes = match root.remove("nodes") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(nodes)) => nodes,
        Some(other) => {
            warnings.push(DecodeWarning::MalformedNodes {
                found: describe(&other).to_string(),
            });
            Map::new()
        }
    };

    let stacks = match root.remove("stacks") {
        None | Some(Value::Null) => Vec::new(),
        // Non-string items are kept as JSON text so they fail reference
        // parsing for that entry alone.
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(token) => token,
                other => other.to_string(),
            })
            .collect(),
        Some(other) => {
            warnings.push(DecodeWarning::MalformedStacks {
                found: describe(&other).to_string(),
            });
            Vec::new()
        }
    };

    let overrides = match root.remove("config") {
        None | Some(Value::Null) => BTreeMap::new(),
        Some(Value::Object(entries)) => entries
            .into_iter()
            .map(|(name, entry)| {
                let spec = map_override(&name, entry).unwrap_or_else(|reason| {
                    warnings.push(DecodeWarning::MalformedOverride {
                        name: name.clone(),
                        reason,
                    });
                    StackOverrideSpec::default()
                });
                (name, spec)
            })
            .collect(),
        Some(other) => {
            warnings.push(DecodeWarning::MalformedConfig {
                found: describe(&other).to_string(),
            });
            BTreeMap::new()
        }
    };

    Ok((
        ClusterConfig {
            nodes,
            stacks,
            overrides,
        },
        warnings,
    ))
}

/// Map one `config.<name>` entry. A problem is reported as a reason and
/// leaves that stack without overrides.
fn map_override(name: &str, entry: Value) -> Result<StackOverrideSpec, String> {
    let mut entry = match entry {
        Value::Null => return Ok(StackOverrideSpec::default()),
        Value::Object(entry) => entry,
        other => {
            return Err(format!(
                "'config.{}' must be an object, found {}",
                name,
                describe(&other)
            ));
        }
    };

    let envs = match entry.remove("envs") {
        None | Some(Value::Null) => return Ok(StackOverrideSpec::default()),
        Some(Value::Object(envs)) => envs,
        Some(other) => {
            return Err(format!(
                "'config.{}.envs' must be an object, found {}",
                name,
                describe(&other)
            ));
        }
    };

    envs.into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => {
                    return Err(format!(
                        "'config.{}.envs.{}' must be a scalar, found {}",
                        name,
                        key,
                        describe(&other)
                    ));
                }
            };
            Ok((key, value))
        })
        .collect()
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
