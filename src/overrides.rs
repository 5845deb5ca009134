//! Per-stack environment override files.
//!
//! A stack with a non-empty override map gets `{dir}/{name}.env` containing
//! one `KEY=VALUE` line per entry, sorted by key. Files are keyed by stack
//! name only, so two kinds that share a name share one file.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::cluster::StackOverrideSpec;
use crate::errors::OverrideWriteError;

const OVERRIDE_EXTENSION: &str = "env";

/// Materializes [`StackOverrideSpec`]s into override files.
#[derive(Debug, Clone)]
pub struct EnvOverrideWriter {
    dir: PathBuf,
}

impl EnvOverrideWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Where the override file for `name` lives.
    pub fn override_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, OVERRIDE_EXTENSION))
    }

    /// Write the override file for `name`.
    ///
    /// Returns `Ok(None)` for an empty spec; in that case a file left behind
    /// by an earlier run is removed. The write is atomic: content goes to a
    /// temporary file in the same directory which is renamed into place, and
    /// is deleted if anything fails on the way.
    pub fn write(
        &self,
        name: &str,
        spec: &StackOverrideSpec,
    ) -> Result<Option<PathBuf>, OverrideWriteError> {
        let path = self.override_path(name);

        if spec.is_empty() {
            remove_stale(&path)?;
            return Ok(None);
        }

        let content = render(name, spec)?;

        fs::create_dir_all(&self.dir).map_err(|source| OverrideWriteError::CreateDir {
            path: self.dir.clone(),
            source,
        })?;

        let write_err = |source| OverrideWriteError::Write {
            path: path.clone(),
            source,
        };
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(write_err)?;
        tmp.write_all(content.as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&path).map_err(|e| write_err(e.error))?;

        debug!(stack = name, path = %path.display(), entries = spec.len(), "wrote override file");
        Ok(Some(path))
    }
}

/// Render the file body, validating that every entry fits on one line.
fn render(name: &str, spec: &StackOverrideSpec) -> Result<String, OverrideWriteError> {
    let mut content = String::new();
    for (key, value) in &spec.envs {
        if !is_valid_key(key) {
            return Err(OverrideWriteError::InvalidEntry {
                stack: name.to_string(),
                key: key.clone(),
                reason: "not a valid environment variable name".to_string(),
            });
        }
        if value.contains('\n') || value.contains('\r') {
            return Err(OverrideWriteError::InvalidEntry {
                stack: name.to_string(),
                key: key.clone(),
                reason: "value contains a line break".to_string(),
            });
        }
        content.push_str(key);
        content.push('=');
        content.push_str(value);
        content.push('\n');
    }
    Ok(content)
}

/// `[A-Za-z_][A-Za-z0-9_]*`
fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn remove_stale(path: &Path) -> Result<(), OverrideWriteError> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "removed stale override file");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(OverrideWriteError::Write {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Read an override file back into ordered `(key, value)` pairs.
///
/// Values are taken literally: everything after the first `=` up to the end
/// of the line, with no quoting or interpolation. Blank lines and lines
/// starting with `#` are skipped.
pub fn read_override_file(path: &Path) -> io::Result<Vec<(String, String)>> {
    let content = fs::read_to_string(path)?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .map(|line| {
            line.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("line without '=' in {}: {}", path.display(), line),
                    )
                })
        })
        .collect()
}
