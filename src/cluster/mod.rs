//! Desired cluster state: the decoded configuration model and its decoder.

pub mod decoder;
pub mod types;

pub use decoder::{ConfigDecoder, Decoded, DocumentParser, JsonDocumentParser};
pub use types::{ClusterConfig, DecodeWarning, StackOverrideSpec};
