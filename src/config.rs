use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::layout::{DEFAULT_CELL_HEIGHT, LayoutEngine};
use crate::stores::state_dir;
use crate::views::ViewMode;

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Decode(#[from] toml::de::Error),
    #[error("failed to encode config: {0}")]
    Encode(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Pixels per hour in the week and day grids.
    pub cell_height: f32,
    pub default_view: ViewMode,
    /// Terminal rows drawn for each hour of a time grid.
    pub rows_per_hour: u16,
    pub day_start_hour: u32,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cell_height: DEFAULT_CELL_HEIGHT,
            default_view: ViewMode::Month,
            rows_per_hour: 2,
            day_start_hour: 8,
            log_level: "warn".to_string(),
        }
    }
}

impl Settings {
    pub fn layout(&self) -> LayoutEngine {
        LayoutEngine::new(self.cell_height)
    }

    /// Replaces out-of-range values with defaults.
    fn sanitized(mut self) -> Self {
        let defaults = Settings::default();
        if !(self.cell_height.is_finite() && self.cell_height > 0.0) {
            warn!(cell_height = self.cell_height, "invalid cell_height, using default");
            self.cell_height = defaults.cell_height;
        }
        if self.rows_per_hour == 0 || self.rows_per_hour > 6 {
            warn!(rows_per_hour = self.rows_per_hour, "invalid rows_per_hour, using default");
            self.rows_per_hour = defaults.rows_per_hour;
        }
        if self.day_start_hour > 23 {
            warn!(day_start_hour = self.day_start_hour, "invalid day_start_hour, using default");
            self.day_start_hour = defaults.day_start_hour;
        }
        if self.log_level.trim().is_empty() {
            self.log_level = defaults.log_level;
        }
        self
    }
}

pub fn config_path() -> PathBuf {
    state_dir().join(CONFIG_FILE)
}

pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Settings::default()),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let settings: Settings = toml::from_str(&raw)?;
    Ok(settings.sanitized())
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    let io_error = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
    }
    let raw = toml::to_string_pretty(settings)?;
    fs::write(path, raw).map_err(io_error)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use crate::views::ViewMode;

    use super::{Settings, load_settings, save_settings};

    fn temp_file(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("{}_{}", name, std::process::id()));
        path
    }

    #[test]
    fn missing_file_gives_defaults() {
        let settings = load_settings(&temp_file("chronos_agenda_no_config.toml")).expect("load");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.layout().cell_height(), 60.0);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let path = temp_file("chronos_agenda_partial_config.toml");
        fs::write(&path, "default_view = \"week\"\ncell_height = 48.0\n").expect("write fixture");
        let settings = load_settings(&path).expect("load");
        assert_eq!(settings.default_view, ViewMode::Week);
        assert_eq!(settings.cell_height, 48.0);
        assert_eq!(settings.rows_per_hour, 2);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn invalid_values_are_replaced() {
        let path = temp_file("chronos_agenda_invalid_config.toml");
        fs::write(&path, "cell_height = -5.0\nrows_per_hour = 0\nday_start_hour = 30\n").expect("write fixture");
        let settings = load_settings(&path).expect("load");
        assert_eq!(settings.cell_height, 60.0);
        assert_eq!(settings.rows_per_hour, 2);
        assert_eq!(settings.day_start_hour, 8);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn save_then_load_round_trips() {
        let path = temp_file("chronos_agenda_saved_config.toml");
        let settings = Settings {
            default_view: ViewMode::Agenda,
            ..Settings::default()
        };
        save_settings(&path, &settings).expect("save");
        assert_eq!(load_settings(&path).expect("load"), settings);
        let _ = fs::remove_file(path);
    }
}
