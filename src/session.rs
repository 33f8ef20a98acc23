//! Persistência local do CPF lembrado.
//!
//! [`SessionStore`] é o contrato chave-valor; [`FileSessionStore`] grava um
//! JSON em disco e [`MemorySessionStore`] serve para testes. A flag
//! "lembrado" não é estado global: [`Session`] a deriva do conteúdo do store
//! na inicialização.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identifier::Identifier;

/// The single key under which the identifier is stored.
pub const IDENTIFIER_KEY: &str = "cpf";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session file is corrupt: {0}")]
    Json(#[from] serde_json::Error),
}

/// Key-value persistence for the remembered identifier.
pub trait SessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), SessionError>;
    fn remove(&mut self, key: &str) -> Result<(), SessionError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemorySessionStore {
    entries: HashMap<String, String>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), SessionError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), SessionError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    value: String,
    saved_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredSession {
    #[serde(default)]
    entries: BTreeMap<String, StoredEntry>,
}

/// JSON file store. A missing file reads as an empty store.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<StoredSession, SessionError> {
        if !self.path.exists() {
            return Ok(StoredSession::default());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, session: &StoredSession) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(session)?)?;
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.load()?.entries.remove(key).map(|e| e.value))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), SessionError> {
        let mut session = self.load()?;
        session.entries.insert(
            key.to_string(),
            StoredEntry {
                value: value.to_string(),
                saved_at: Utc::now(),
            },
        );
        self.save(&session)
    }

    fn remove(&mut self, key: &str) -> Result<(), SessionError> {
        let mut session = self.load()?;
        if session.entries.remove(key).is_some() {
            self.save(&session)?;
        }
        Ok(())
    }
}

/// Shortcut controls offered once the session is remembered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    CheckBalance,
    CheckStatus,
    IndicateAndEarn,
}

/// Projection of the store: which identifier, if any, is remembered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    identifier: Option<Identifier>,
}

impl Session {
    /// Reads the store once at startup. Unreadable or invalid entries count as absent.
    pub fn restore(store: &impl SessionStore) -> Self {
        let saved = match store.get(IDENTIFIER_KEY) {
            Ok(saved) => saved,
            Err(err) => {
                tracing::warn!(%err, "could not read session store");
                None
            }
        };
        let identifier = saved.and_then(|raw| match Identifier::parse(&raw) {
            Ok(id) => Some(id),
            Err(err) => {
                tracing::warn!(%err, "ignoring invalid remembered CPF");
                None
            }
        });
        Self { identifier }
    }

    pub fn is_remembered(&self) -> bool {
        self.identifier.is_some()
    }

    pub fn identifier(&self) -> Option<&Identifier> {
        self.identifier.as_ref()
    }

    /// Persists `id` unless a session is already remembered.
    /// Returns whether anything was written.
    pub fn remember(
        &mut self,
        store: &mut impl SessionStore,
        id: &Identifier,
    ) -> Result<bool, SessionError> {
        if self.is_remembered() {
            return Ok(false);
        }
        store.set(IDENTIFIER_KEY, id.digits())?;
        self.identifier = Some(id.clone());
        tracing::info!("session remembered");
        Ok(true)
    }

    pub fn forget(&mut self, store: &mut impl SessionStore) -> Result<(), SessionError> {
        store.remove(IDENTIFIER_KEY)?;
        self.identifier = None;
        Ok(())
    }

    pub fn shortcuts(&self) -> Vec<Shortcut> {
        if self.is_remembered() {
            vec![
                Shortcut::CheckBalance,
                Shortcut::CheckStatus,
                Shortcut::IndicateAndEarn,
            ]
        } else {
            Vec::new()
        }
    }
}
