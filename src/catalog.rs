//! Stack references and the on-disk stack catalog.
//!
//! The catalog is a directory with one subdirectory per kind, each holding
//! one definition file per stack:
//!
//! ```text
//! stacks/
//! ├── infra/traefik.yml
//! ├── db/postgres.yml
//! └── app/web.yml
//! ```

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Kinds provisioned by `stackyard init`.
pub const DEFAULT_KINDS: [&str; 3] = ["infra", "db", "app"];

/// A parsed `kind/name` token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct StackReference {
    pub kind: String,
    pub name: String,
}

/// A token that is not of the form `kind/name`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid stack reference '{token}': {reason}")]
pub struct InvalidReference {
    pub token: String,
    pub reason: String,
}

impl StackReference {
    /// Parse a `kind/name` token: exactly one `/`, both halves non-empty.
    pub fn parse(token: &str) -> Result<Self, InvalidReference> {
        let invalid = |reason: &str| InvalidReference {
            token: token.to_string(),
            reason: reason.to_string(),
        };

        let (kind, name) = token
            .split_once('/')
            .ok_or_else(|| invalid("expected 'kind/name'"))?;
        if name.contains('/') {
            return Err(invalid("expected exactly one '/'"));
        }
        if kind.is_empty() || name.is_empty() {
            return Err(invalid("kind and name must both be non-empty"));
        }
        // Both halves become path components under the catalog root.
        for part in [kind, name] {
            if part == "." || part == ".." || part.contains('\\') || part.contains('\0') {
                return Err(invalid("kind and name must be plain path components"));
            }
        }

        Ok(Self {
            kind: kind.to_string(),
            name: name.to_string(),
        })
    }

    /// Cluster-side stack name, `kind_name`, unique across kinds.
    pub fn deploy_name(&self) -> String {
        format!("{}_{}", self.kind, self.name)
    }
}

impl FromStr for StackReference {
    type Err = InvalidReference;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for StackReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

/// A reference resolved to an existing definition file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackDefinition {
    pub reference: StackReference,
    pub path: PathBuf,
}

/// The definition file for a reference does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("No definition for '{reference}' at {}", .path.display())]
pub struct CatalogMiss {
    pub reference: StackReference,
    pub path: PathBuf,
}

/// Resolves stack references to definition files under a fixed root.
#[derive(Debug, Clone)]
pub struct StackCatalog {
    root: PathBuf,
    extension: String,
}

impl StackCatalog {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    /// `{root}/{kind}/{name}.{extension}`, whether or not it exists.
    pub fn definition_path(&self, reference: &StackReference) -> PathBuf {
        self.root
            .join(&reference.kind)
            .join(format!("{}.{}", reference.name, self.extension))
    }

    /// Resolve a reference, checking the file exists right now.
    pub fn resolve(&self, reference: &StackReference) -> Result<StackDefinition, CatalogMiss> {
        let path = self.definition_path(reference);
        if path.is_file() {
            Ok(StackDefinition {
                reference: reference.clone(),
                path,
            })
        } else {
            Err(CatalogMiss {
                reference: reference.clone(),
                path,
            })
        }
    }
}
