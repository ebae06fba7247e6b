use anyhow::{Context, Result, anyhow, bail};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::analyzer::DEFAULT_DISPLAY_OFFSET_HOURS;

const APP_DIR: &str = ".student-portal";
const CONFIG_FILE: &str = "config.json";
pub const ATTENDANCE_URL_ENV: &str = "STUDENT_PORTAL_ATTENDANCE_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_port: u16,
    pub db_path: PathBuf,
    pub attendance_base_url: Option<String>,
    pub attendance_timeout_seconds: u64,
    pub display_offset_hours: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_port: 8080,
            db_path: default_root_dir().join("db").join("portal.db"),
            attendance_base_url: None,
            attendance_timeout_seconds: 10,
            display_offset_hours: DEFAULT_DISPLAY_OFFSET_HOURS,
        }
    }
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        Ok(default_root_dir().join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;
        set_mode_600(config_path)?;

        Ok(())
    }

    /// Environment wins over the config file.
    pub fn resolve_attendance_base_url(&self) -> Option<String> {
        std::env::var(ATTENDANCE_URL_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| {
                self.attendance_base_url
                    .clone()
                    .filter(|value| !value.trim().is_empty())
            })
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match normalize_config_key(key) {
            "api_port" => {
                self.api_port = value
                    .parse::<u16>()
                    .map_err(|_| anyhow!("api_port must be a number"))?;
            }
            "db_path" => {
                self.db_path = expand_home(value);
            }
            "attendance_base_url" => {
                let trimmed = value.trim().trim_end_matches('/');
                if !trimmed.is_empty() {
                    url::Url::parse(trimmed)
                        .with_context(|| format!("Invalid attendance URL: {trimmed}"))?;
                }
                self.attendance_base_url = (!trimmed.is_empty()).then(|| trimmed.to_string());
            }
            "attendance_timeout_seconds" => {
                self.attendance_timeout_seconds = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("attendance_timeout_seconds must be a number"))?
                    .max(1);
            }
            "display_offset_hours" => {
                let hours = value
                    .parse::<i32>()
                    .map_err(|_| anyhow!("display_offset_hours must be a whole number"))?;
                if !(-23..=23).contains(&hours) {
                    bail!("display_offset_hours must be between -23 and 23");
                }
                self.display_offset_hours = hours;
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: api_port|api.port, db_path|db.path, attendance_base_url|attendance.base_url, attendance_timeout_seconds|attendance.timeout_seconds, display_offset_hours|display.offset_hours"
                );
            }
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "api_port" => Some(self.api_port.to_string()),
            "db_path" => Some(self.db_path.display().to_string()),
            "attendance_base_url" => Some(
                self.attendance_base_url
                    .clone()
                    .unwrap_or_else(|| "not_set".to_string()),
            ),
            "attendance_timeout_seconds" => Some(self.attendance_timeout_seconds.to_string()),
            "display_offset_hours" => Some(self.display_offset_hours.to_string()),
            _ => None,
        }
    }
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "api_port" | "api.port" => "api_port",
        "db_path" | "db.path" => "db_path",
        "attendance_base_url" | "attendance.base_url" => "attendance_base_url",
        "attendance_timeout_seconds" | "attendance.timeout_seconds" => {
            "attendance_timeout_seconds"
        }
        "display_offset_hours" | "display.offset_hours" => "display_offset_hours",
        _ => key,
    }
}

pub fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

fn default_root_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn set_mode_600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set file permissions: {}", path.display()))?;
    }

    Ok(())
}
