use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Inputs remembered between sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuiConfig {
    pub output_path: String,
    pub passes: String,
}

impl Default for GuiConfig {
    fn default() -> Self {
        Self {
            output_path: String::new(),
            passes: "1".to_string(),
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    let mut base = dirs::config_dir().or_else(dirs::data_dir)?;
    base.push("CelesteRandomiser");
    base.push("gui_config.json");
    Some(base)
}

pub fn load_config() -> GuiConfig {
    config_path()
        .map(|path| load_config_from(&path))
        .unwrap_or_default()
}

pub fn save_config(cfg: &GuiConfig) {
    if let Some(path) = config_path() {
        save_config_to(&path, cfg);
    }
}

/// Missing or unreadable files fall back to the defaults.
pub fn load_config_from(path: &Path) -> GuiConfig {
    fs::read_to_string(path)
        .ok()
        .and_then(|data| serde_json::from_str(&data).ok())
        .unwrap_or_default()
}

pub fn save_config_to(path: &Path, cfg: &GuiConfig) {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let result = serde_json::to_string_pretty(cfg)
        .map_err(|e| e.to_string())
        .and_then(|data| fs::write(path, data).map_err(|e| e.to_string()));
    if let Err(err) = result {
        log::warn!("could not save {}: {err}", path.display());
    }
}
