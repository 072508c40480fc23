//! Driver configuration.
//!
//! An optional `pythowon.toml` tweaks the REPL and logging defaults. It is
//! looked up in the working directory, or wherever `--config` points; a
//! missing file just means defaults, a broken one is reported and ignored
//! so the interpreter still starts.

use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverConfig {
    /// REPL history file; defaults to `.pythowon_history` in the home
    /// directory.
    pub history_file: Option<PathBuf>,
    /// Maximum history entries to keep.
    pub history_size: Option<usize>,
    /// Log filter used when `PYTHOWON_LOG` is unset (e.g. `"debug"`).
    pub log: Option<String>,
}

impl DriverConfig {
    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|error| format!("Invalid configuration: {error}"))
    }

    pub fn load(explicit: Option<&Path>) -> Self {
        let candidate = explicit.map(PathBuf::from).or_else(|| {
            let local = PathBuf::from("pythowon.toml");
            local.exists().then_some(local)
        });
        let Some(path) = candidate else {
            return DriverConfig::default();
        };
        match std::fs::read_to_string(&path) {
            Ok(content) => match DriverConfig::from_toml(&content) {
                Ok(config) => config,
                Err(error) => {
                    eprintln!("{}: {}", path.display(), error);
                    DriverConfig::default()
                }
            },
            Err(error) => {
                eprintln!("Could not read {}: {}", path.display(), error);
                DriverConfig::default()
            }
        }
    }
}
