//! Persisted algorithm registry.
//!
//! The daemon, not the simulation core, decides what command a named
//! algorithm maps to. Entries are kept in a JSON file in the data directory
//! and written back on every change.

use std::fs;
use std::path::PathBuf;

use mousim::AlgoSpec;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to access registry file: {0}")]
    Io(#[from] std::io::Error),
    #[error("registry file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("no algorithm named {0:?}")]
    Unknown(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgoEntry {
    pub name: String,
    pub dir_path: Option<PathBuf>,
    pub run_command: String,
}

impl AlgoEntry {
    pub fn spec(&self) -> AlgoSpec {
        AlgoSpec {
            name: self.name.clone(),
            run_command: self.run_command.clone(),
            working_dir: self.dir_path.clone(),
        }
    }
}

#[derive(Debug)]
pub struct Registry {
    path: PathBuf,
    entries: Vec<AlgoEntry>,
}

impl Registry {
    /// A fresh registry bound to `path`, used when the file is unreadable.
    pub fn empty(path: PathBuf) -> Registry {
        Registry { path, entries: Vec::new() }
    }

    /// Loads the registry, starting empty when no file exists yet.
    pub fn load(path: PathBuf) -> Result<Registry, RegistryError> {
        let entries = if path.exists() {
            serde_json::from_str(&fs::read_to_string(&path)?)?
        } else {
            Vec::new()
        };
        Ok(Registry { path, entries })
    }

    fn save(&self) -> Result<(), RegistryError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(&self.entries)?)?;
        Ok(())
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Result<&AlgoEntry, RegistryError> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| RegistryError::Unknown(name.to_string()))
    }

    /// Adds or replaces an entry and persists the file.
    pub fn add(&mut self, entry: AlgoEntry) -> Result<(), RegistryError> {
        self.entries.retain(|e| e.name != entry.name);
        info!(name = %entry.name, "algorithm registered");
        self.entries.push(entry);
        self.save()
    }

    pub fn remove(&mut self, name: &str) -> Result<(), RegistryError> {
        let before = self.entries.len();
        self.entries.retain(|e| e.name != name);
        if self.entries.len() == before {
            return Err(RegistryError::Unknown(name.to_string()));
        }
        self.save()
    }
}
