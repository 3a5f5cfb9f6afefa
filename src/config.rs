use crate::app_dirs::AppDirs;
use crate::plan::{
    PracticeMethod, DEFAULT_DURATION_MINUTES, DEFAULT_FOCUS, DEFAULT_SECTION_MINUTES,
};
use crate::plan_builder::PlanDefaults;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub default_section_minutes: f64,
    pub default_duration_minutes: u32,
    pub default_focus: String,
    pub default_practice_method: String,
    pub tick_interval_ms: u64,
    pub db_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_section_minutes: DEFAULT_SECTION_MINUTES,
            default_duration_minutes: DEFAULT_DURATION_MINUTES,
            default_focus: DEFAULT_FOCUS.to_string(),
            default_practice_method: PracticeMethod::default().to_string(),
            tick_interval_ms: 1000,
            db_path: None,
        }
    }
}

impl Config {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

impl From<&Config> for PlanDefaults {
    fn from(cfg: &Config) -> Self {
        let fallback = PlanDefaults::default();
        let method = cfg.default_practice_method.trim();
        Self {
            section_minutes: if cfg.default_section_minutes.is_finite() {
                cfg.default_section_minutes
            } else {
                fallback.section_minutes
            },
            duration_minutes: match cfg.default_duration_minutes {
                0 => fallback.duration_minutes,
                d => d,
            },
            focus: match cfg.default_focus.trim() {
                "" => fallback.focus,
                f => f.to_string(),
            },
            practice_method: if method.is_empty() {
                fallback.practice_method
            } else {
                PracticeMethod::from(method)
            },
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice::<Config>(&bytes).unwrap_or_else(|e| {
                warn!("ignoring malformed config {}: {e}", self.path.display());
                Config::default()
            }),
            Err(_) => Config::default(),
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}
