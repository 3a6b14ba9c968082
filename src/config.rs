use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Where counters live between sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Storage {
    /// Persisted to `state_file`, surviving restarts.
    Durable,
    /// Kept in process memory only.
    Memory,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_storage")]
    pub storage: Storage,

    #[serde(default = "default_state_file")]
    pub state_file: String,

    #[serde(default = "default_log_file")]
    pub log_file: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_tab_size")]
    pub tab_size: usize,

    #[serde(default = "default_autosave_seconds")]
    pub autosave_seconds: u64,
}

fn default_storage() -> Storage {
    Storage::Durable
}

fn app_dir(base: Option<PathBuf>) -> PathBuf {
    let mut path = base.unwrap_or_else(|| PathBuf::from("."));
    path.push("keytally");
    path
}

fn default_state_file() -> String {
    app_dir(dirs::data_dir())
        .join("state.json")
        .to_string_lossy()
        .to_string()
}

fn default_log_file() -> String {
    app_dir(dirs::cache_dir())
        .join("keytally.log")
        .to_string_lossy()
        .to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_tab_size() -> usize {
    4
}

fn default_autosave_seconds() -> u64 {
    2
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage: default_storage(),
            state_file: default_state_file(),
            log_file: default_log_file(),
            log_level: default_log_level(),
            tab_size: default_tab_size(),
            autosave_seconds: default_autosave_seconds(),
        }
    }
}

impl Config {
    /// Loads the user config, writing a default one on first run. A broken
    /// file falls back to defaults so the editor still starts.
    pub fn load() -> Self {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path).unwrap_or_else(|e| {
                eprintln!("Error parsing config file: {}", e);
                Self::default()
            })
        } else {
            let default_config = Self::default();
            if let Err(e) = default_config.save_to(&config_path) {
                eprintln!("Error creating default config file: {}", e);
            }
            default_config
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })?;

        config.state_file = expand_tilde(&config.state_file);
        config.log_file = expand_tilde(&config.log_file);

        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string)?;

        Ok(())
    }

    pub fn config_path() -> PathBuf {
        app_dir(dirs::config_dir()).join("config.toml")
    }

    pub fn state_path(&self) -> PathBuf {
        PathBuf::from(&self.state_file)
    }

    pub fn log_path(&self) -> PathBuf {
        PathBuf::from(&self.log_file)
    }
}

fn expand_tilde(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}
