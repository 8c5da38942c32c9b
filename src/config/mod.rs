pub mod defaults;
pub mod merge;
pub mod types;
pub mod validate;

use crate::error::{ConfigError, Result};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_STEM: &str = "imaging-chart";
const CONFIG_EXTENSIONS: &[&str] = &["yaml", "yml", "toml", "json"];

/// Look for `imaging-chart.{yaml,yml,toml,json}` in `dir`, in that order
pub fn find_config(dir: &Path) -> Option<PathBuf> {
    CONFIG_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{CONFIG_FILE_STEM}.{ext}")))
        .find(|path| path.is_file())
}

/// Resolve the config file to use: the explicit path if given, otherwise
/// the first match of [`find_config`] in the current directory.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir()?;
    find_config(&cwd).ok_or_else(|| ConfigError::NotFound(cwd.display().to_string()).into())
}

/// Load chart configuration, choosing the parser from the file extension.
pub fn load_props(path: &Path) -> Result<types::ChartProps> {
    info!("Loading configuration from {}", path.display());
    let content = fs::read_to_string(path)?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();
    debug!("Parsing {} bytes as {}", content.len(), ext);
    parse_props(&content, &ext)
}

/// Parse chart configuration from a string in the given format
/// (`yaml`, `yml`, `toml` or `json`).
pub fn parse_props(content: &str, format: &str) -> Result<types::ChartProps> {
    let props = match format {
        "yaml" | "yml" => serde_yaml::from_str(content)
            .map_err(|e| ConfigError::ParsingFailed(e.to_string()))?,
        "toml" => {
            toml::from_str(content).map_err(|e| ConfigError::ParsingFailed(e.to_string()))?
        }
        "json" => serde_json::from_str(content)
            .map_err(|e| ConfigError::ParsingFailed(e.to_string()))?,
        other => return Err(ConfigError::UnsupportedFormat(other.to_string()).into()),
    };
    Ok(props)
}
