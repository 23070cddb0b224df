//! Tool configuration: `callspec.yaml` plus environment overrides.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::codec::StringMode;
use crate::context::SpecSession;
use crate::error::{Result, SpecError};
use crate::registry::IdentityRegistry;
use crate::store::{SpecCase, SpecStore};

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "callspec.yaml";
/// Overrides [`CallspecConfig::spec_dir`].
pub const ENV_SPEC_DIR: &str = "CALLSPEC_DIR";
/// Set to `true`/`1` to switch to [`StringMode::Permissive`].
pub const ENV_PERMISSIVE_STRINGS: &str = "CALLSPEC_PERMISSIVE_STRINGS";

/// Settings shared by the CLI and test helpers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallspecConfig {
    /// Directory holding approved and received specifications.
    pub spec_dir: PathBuf,
    /// String coercion mode used when replaying.
    pub strings: StringMode,
}

impl Default for CallspecConfig {
    fn default() -> Self {
        Self { spec_dir: PathBuf::from("specs"), strings: StringMode::Strict }
    }
}

impl CallspecConfig {
    /// Loads configuration from `path`, or from [`DEFAULT_CONFIG_FILE`] if
    /// present, then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::Config`] if an explicitly given file is missing,
    /// a file does not parse, or an override has an invalid value.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.with_overrides(|key| std::env::var(key).ok())
    }

    /// Parses a YAML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::Config`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SpecError::Config(format!("failed to read {}: {e}", path.display())))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| SpecError::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Applies overrides looked up through `var`.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::Config`] for an unrecognised boolean.
    pub fn with_overrides<F>(mut self, var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = var(ENV_SPEC_DIR).filter(|dir| !dir.is_empty()) {
            self.spec_dir = PathBuf::from(dir);
        }
        if let Some(flag) = var(ENV_PERMISSIVE_STRINGS) {
            self.strings = match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => StringMode::Permissive,
                "0" | "false" | "no" | "" => StringMode::Strict,
                other => {
                    return Err(SpecError::Config(format!(
                        "{ENV_PERMISSIVE_STRINGS} must be true or false, got {other:?}"
                    )))
                }
            };
        }
        Ok(self)
    }

    /// Store over [`spec_dir`](Self::spec_dir).
    #[must_use]
    pub fn store(&self) -> SpecStore {
        SpecStore::new(&self.spec_dir)
    }

    /// Opens a session for `case` from the configured store, using the
    /// configured string mode.
    ///
    /// # Errors
    ///
    /// Fails like [`SpecStore::session`].
    pub fn session(&self, case: &SpecCase, registry: Arc<IdentityRegistry>) -> Result<SpecSession> {
        Ok(self.store().session(case, registry)?.with_string_mode(self.strings))
    }
}
