use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Load and parse a TOML config file into any deserializable shape.
/// Each service owns its own config struct; this is only the loading step.
pub fn load_config<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: T = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    Ok(config)
}
