use anyhow::{Context, Result};
use console::Term;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::hasher::Variant;

pub const DEFAULT_TIME_COST: u32 = 16;
pub const DEFAULT_MEMORY_COST_MIB: u32 = 32;
pub const DEFAULT_PARALLELISM: u32 = 2;
pub const DEFAULT_HASH_LENGTH: u32 = 64;

/// Last-used parameters, loaded at startup and written back at exit when
/// `save_on_exit` is set. A missing or malformed file falls back to the
/// defaults; persistence problems never block hashing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub algorithm: Variant,
    pub time_cost: u32,
    pub memory_cost_mib: u32,
    pub parallelism: u32,
    pub hash_length: u32,
    pub save_on_exit: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            algorithm: Variant::Id,
            time_cost: DEFAULT_TIME_COST,
            memory_cost_mib: DEFAULT_MEMORY_COST_MIB,
            parallelism: DEFAULT_PARALLELISM,
            hash_length: DEFAULT_HASH_LENGTH,
            save_on_exit: true,
        }
    }
}

impl Settings {
    /// Platform config location, e.g. `~/.config/argonite/settings.json`
    /// on Linux.
    pub fn config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("org", "argonite", "argonite")
            .context("Could not determine configuration directory")?;
        Ok(dirs.config_dir().join("settings.json"))
    }

    pub fn load() -> Self {
        match Self::config_path() {
            Ok(path) => Self::load_from(&path),
            Err(_) => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        let Ok(raw) = fs::read_to_string(path) else {
            return Self::default();
        };

        match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(e) => {
                let term = Term::stderr();
                term.write_line(&format!(
                    "WARNING: ignoring malformed settings file {}: {e}",
                    path.display()
                ))
                .ok();
                Self::default()
            }
        }
    }

    pub fn store(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.store_to(&path)
    }

    pub fn store_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let raw = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, raw)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }

    /// Removes the stored settings file. Subsequent loads see defaults.
    pub fn reset() -> Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove settings file {}", path.display()))?;
        }
        Ok(())
    }
}
