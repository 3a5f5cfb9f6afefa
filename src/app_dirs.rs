use directories::ProjectDirs;
use std::env;
use std::path::PathBuf;

const APP_NAME: &str = "cadenza";

/// Where cadenza keeps its database and config
pub struct AppDirs;

impl AppDirs {
    /// `$XDG_STATE_HOME/cadenza`, else `~/.local/state/cadenza`, else the
    /// platform's local data dir
    pub fn state_dir() -> Option<PathBuf> {
        env::var_os("XDG_STATE_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| {
                env::var_os("HOME").map(|home| PathBuf::from(home).join(".local").join("state"))
            })
            .map(|base| base.join(APP_NAME))
            .or_else(|| {
                ProjectDirs::from("", "", APP_NAME).map(|pd| pd.data_local_dir().to_path_buf())
            })
    }

    pub fn db_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("practice.db"))
    }

    pub fn config_path() -> PathBuf {
        ProjectDirs::from("", "", APP_NAME)
            .map(|pd| pd.config_dir().join("config.json"))
            .unwrap_or_else(|| PathBuf::from("cadenza_config.json"))
    }
}
