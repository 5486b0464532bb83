use crate::error::LoadResult;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use stowage_base::StoreRoots;

const DEFAULT_APPLICATION_NAME: &str = "stowage";
const DEFAULT_FETCH_TIMEOUT_SECS: f64 = 30.0;
const DEFAULT_IO_THREAD_COUNT: usize = 4;
const DEFAULT_READ_CHUNK_SIZE: usize = 64 * 1024;

/// Settings for an [`AssetManager`](crate::AssetManager). Every field has a default, so a JSON file
/// only needs to list what it overrides.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub application_name: String,
    pub roots: StoreRoots,
    // Applies to requests that don't set their own timeout
    pub fetch_timeout_secs: f64,
    pub io_thread_count: usize,
    pub read_chunk_size: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        LoaderConfig {
            application_name: DEFAULT_APPLICATION_NAME.to_string(),
            roots: StoreRoots::for_application(DEFAULT_APPLICATION_NAME),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            io_thread_count: DEFAULT_IO_THREAD_COUNT,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }
}

impl LoaderConfig {
    pub fn with_roots(roots: StoreRoots) -> Self {
        LoaderConfig {
            roots,
            ..Default::default()
        }
    }

    pub fn from_json_str(json: &str) -> LoadResult<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let has_roots = value.get("roots").is_some();
        let mut config: LoaderConfig = serde_json::from_value(value)?;

        // Default roots follow the configured application name
        if !has_roots {
            config.roots = StoreRoots::for_application(&config.application_name);
        }

        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> LoadResult<Self> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        log::info!("Loaded loader config from {:?}", path);
        Ok(config)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.fetch_timeout_secs.max(0.0))
    }
}
