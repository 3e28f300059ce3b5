//! Secret stores
//!
//! Credentials and rotating refresh tokens are read from, and written back
//! to, a dotenv file. Writes keep every other line of the file untouched.

use super::error::StoreError;
use log::{debug, info};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

pub trait SecretStore: Send + Sync {
    fn read(&self, key: &str) -> Option<String>;

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Like [`read`](Self::read) but a missing or empty value is an error naming the key.
    fn require(&self, key: &str) -> Result<String, super::AuthError> {
        self.read(key)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| super::AuthError::MissingSecret(key.to_string()))
    }
}

/// Dotenv-file backed store
#[derive(Debug)]
pub struct EnvFileStore {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
}

impl EnvFileStore {
    /// Load every `KEY=value` pair from `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        info!("Loading secrets from {}", path.display());

        let mut values = BTreeMap::new();
        let entries = dotenvy::from_path_iter(&path).map_err(|e| load_error(&path, e))?;
        for entry in entries {
            let (key, value) = entry.map_err(|e| load_error(&path, e))?;
            values.insert(key, value);
        }

        debug!("Loaded {} secrets", values.len());
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn rewrite_file(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let io_error = |source| StoreError::Io {
            path: self.path.display().to_string(),
            source,
        };

        let existing = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(io_error(e)),
        };

        let rendered = format!("{key}={}", quote_value(value));
        let mut replaced = false;
        let mut lines: Vec<String> = existing
            .lines()
            .map(|line| {
                if !replaced && line_key(line) == Some(key) {
                    replaced = true;
                    rendered.clone()
                } else {
                    line.to_string()
                }
            })
            .collect();
        if !replaced {
            lines.push(rendered);
        }

        let mut text = lines.join("\n");
        text.push('\n');

        // Stage next to the original so the rename stays on one filesystem
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staged = tempfile::NamedTempFile::new_in(dir).map_err(io_error)?;
        staged.write_all(text.as_bytes()).map_err(io_error)?;
        staged.as_file().sync_all().map_err(io_error)?;
        staged.persist(&self.path).map_err(|e| io_error(e.error))?;
        Ok(())
    }
}

impl SecretStore for EnvFileStore {
    fn read(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.rewrite_file(key, value)?;
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        info!("Persisted {} to {}", key, self.path.display());
        Ok(())
    }
}

fn load_error(path: &Path, error: dotenvy::Error) -> StoreError {
    match error {
        dotenvy::Error::Io(source) => StoreError::Io {
            path: path.display().to_string(),
            source,
        },
        other => StoreError::Parse {
            path: path.display().to_string(),
            message: other.to_string(),
        },
    }
}

/// Key of a `KEY=value` or `export KEY=value` line
fn line_key(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') {
        return None;
    }
    let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
    let (key, _) = trimmed.split_once('=')?;
    Some(key.trim())
}

fn quote_value(value: &str) -> String {
    let plain = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_.:/+=@".contains(c));
    if plain && !value.is_empty() {
        value.to_string()
    } else if !value.contains('\'') {
        format!("'{value}'")
    } else {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"").replace('$', "\\$");
        format!("\"{escaped}\"")
    }
}

/// In-memory store, optionally refusing writes
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    values: RwLock<BTreeMap<String, String>>,
    read_only: bool,
}

impl MemorySecretStore {
    pub fn new<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: RwLock::new(values.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
            read_only: false,
        }
    }

    /// Every write fails with [`StoreError::ReadOnly`]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

impl SecretStore for MemorySecretStore {
    fn read(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
