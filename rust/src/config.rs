//! Persistent configuration for the fragment editor.
//!
//! Loads/saves a TOML config at `~/.fragment-editor/config.toml`.

use crate::error::FragmentError;
use crate::parametrize::{InterpreterInferrer, StaticInferrer, TypeInferrer};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const STORE_ENV: &str = "FRAGMENT_EDITOR_STORE";
pub const PYTHON_ENV: &str = "FRAGMENT_EDITOR_PYTHON";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub store: StoreConfig,
    pub parametrize: ParametrizeConfig,
}

impl EditorConfig {
    pub fn load(path: &Path) -> Result<Self, FragmentError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| FragmentError::Config(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<(), FragmentError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| FragmentError::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from the default path, or return defaults if the file doesn't exist.
    pub fn load_or_default() -> Self {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable config {}: {e}", path.display());
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Default config path: `~/.fragment-editor/config.toml`.
    pub fn default_path() -> PathBuf {
        home_dir().join("config.toml")
    }

    /// Apply `FRAGMENT_EDITOR_STORE` and `FRAGMENT_EDITOR_PYTHON`.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(store) = std::env::var(STORE_ENV) {
            if !store.trim().is_empty() {
                self.store.path = store;
            }
        }
        if let Ok(python) = std::env::var(PYTHON_ENV) {
            if !python.trim().is_empty() {
                self.parametrize.interpreter = python;
            }
        }
        self
    }
}

fn home_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".fragment-editor")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the JSON fragment store.
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: home_dir()
                .join("fragments.json")
                .to_string_lossy()
                .into_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceMode {
    /// Read types off literals and annotations, never run code.
    Static,
    /// Execute the code before the selection in a Python interpreter.
    Interpreter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParametrizeConfig {
    /// Try typed placeholders before plain ones.
    pub datatypes: bool,
    pub inference: InferenceMode,
    pub interpreter: String,
    pub timeout_secs: u64,
}

impl Default for ParametrizeConfig {
    fn default() -> Self {
        Self {
            datatypes: true,
            inference: InferenceMode::Static,
            interpreter: "python3".to_string(),
            timeout_secs: 5,
        }
    }
}

impl ParametrizeConfig {
    /// Inferrer for the datatype tier, `None` when datatypes are off.
    pub fn inferrer(&self) -> Option<Box<dyn TypeInferrer>> {
        if !self.datatypes {
            return None;
        }
        Some(match self.inference {
            InferenceMode::Static => Box::new(StaticInferrer),
            InferenceMode::Interpreter => Box::new(InterpreterInferrer::new(
                &self.interpreter,
                Duration::from_secs(self.timeout_secs),
            )),
        })
    }
}
