use crate::model::Id3Version;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "tagdeck";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorSettings {
    #[serde(default)]
    pub last_directory: Option<PathBuf>,
    #[serde(default)]
    pub default_version: Id3Version,
    #[serde(default = "default_padding")]
    pub padding: usize,
}

fn default_padding() -> usize {
    1024
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            last_directory: None,
            default_version: Id3Version::default(),
            padding: default_padding(),
        }
    }
}

pub fn config_root() -> Result<PathBuf> {
    if let Ok(override_dir) = env::var("TAGDECK_CONFIG_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .context("neither HOME nor USERPROFILE is set")?;
    Ok(PathBuf::from(home).join(".config").join(APP_DIR))
}

pub fn settings_path() -> Result<PathBuf> {
    Ok(config_root()?.join(SETTINGS_FILE))
}

pub fn ensure_config_dir() -> Result<PathBuf> {
    let root = config_root()?;
    fs::create_dir_all(&root).with_context(|| format!("failed to create {}", root.display()))?;
    Ok(root)
}

pub fn load_settings() -> Result<EditorSettings> {
    let path = settings_path()?;
    if !path.exists() {
        return Ok(EditorSettings::default());
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    let settings: EditorSettings = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse settings file {}", path.display()))?;
    Ok(settings)
}

pub fn save_settings(settings: &EditorSettings) -> Result<()> {
    ensure_config_dir()?;
    let path = settings_path()?;
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Records the directory of `opened` as the last one used.
pub fn remember_directory(settings: &mut EditorSettings, opened: &Path) -> bool {
    let dir = if opened.is_dir() {
        Some(opened)
    } else {
        opened.parent().filter(|parent| !parent.as_os_str().is_empty())
    };
    let Some(dir) = dir.map(normalize_path) else {
        return false;
    };
    if settings.last_directory.as_ref() == Some(&dir) {
        return false;
    }
    settings.last_directory = Some(dir);
    true
}

pub fn normalize_path(path: &Path) -> PathBuf {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    strip_windows_verbatim_prefix(&canonical)
}

pub fn strip_windows_verbatim_prefix(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();

    if let Some(trimmed) = raw.strip_prefix(r"\\?\UNC\") {
        return PathBuf::from(format!(r"\\{trimmed}"));
    }

    if let Some(trimmed) = raw.strip_prefix(r"\\?\") {
        return PathBuf::from(trimmed);
    }

    path.to_path_buf()
}
