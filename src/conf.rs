//! The Serializable configuration data structures used for setup.
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::event::Event;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WatchConf {
    pub path: PathBuf,

    /// Written in the flags text form, e.g. `"CREATE | WRITE"`.
    #[serde(default = "default_watch_events")]
    pub events: Event,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_cfg_ver")]
    pub version: u32,

    /// Capacity of the event channel. The monitor blocks when it is full.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// `tracing_subscriber::EnvFilter` directives, overridden by `RUST_LOG`.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    #[serde(default)]
    pub watch: Vec<WatchConf>,
}

impl Config {
    /// Reads a config file, choosing the format from its extension.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: Config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&text)?,
            Some("json") => serde_json::from_str(&text)?,
            Some(ext) => return Err(Error::Config(format!("unsupported config format {ext:?}"))),
            None => return Err(Error::Config(format!("{} has no extension", path.display()))),
        };
        if config.version != default_cfg_ver() {
            return Err(Error::Config(format!(
                "unsupported config version {}",
                config.version
            )));
        }
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_cfg_ver(),
            channel_capacity: default_channel_capacity(),
            log_filter: default_log_filter(),
            watch: Vec::new(),
        }
    }
}

fn default_cfg_ver() -> u32 {
    1
}

fn default_channel_capacity() -> usize {
    64
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_watch_events() -> Event {
    Event::all()
}
