use crate::error::{Result, SchedulerError};
use crate::types::Config;
use std::fs;
use std::path::Path;

/// Load a configuration object. JSON is the native format; `.toml` files
/// are accepted for hand-written configurations.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = read_file(path)?;
    let file = path.display().to_string();

    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);

    if is_toml {
        toml::from_str(&content).map_err(|e| {
            SchedulerError::ConfigParse {
                file,
                message: e.to_string(),
            }
            .into()
        })
    } else {
        serde_json::from_str(&content).map_err(|e| {
            SchedulerError::ConfigParse {
                file,
                message: e.to_string(),
            }
            .into()
        })
    }
}

/// Generic JSON file loader for event payloads and prior schedules
pub fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = read_file(path)?;
    serde_json::from_str(&content).map_err(|e| {
        SchedulerError::ConfigParse {
            file: path.display().to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| {
            SchedulerError::FileRead {
                path: path.display().to_string(),
                source: e,
            }
            .into()
        })
}
