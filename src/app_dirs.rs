use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    pub fn config_path() -> PathBuf {
        if let Some(pd) = ProjectDirs::from("", "", "emg-trainer") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("emg_trainer_config.json")
        }
    }

    pub fn log_path() -> PathBuf {
        if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".local")
                .join("state")
                .join("emg-trainer")
                .join("emg-trainer.log")
        } else {
            ProjectDirs::from("", "", "emg-trainer")
                .map(|proj_dirs| proj_dirs.data_local_dir().join("emg-trainer.log"))
                .unwrap_or_else(|| PathBuf::from("emg-trainer.log"))
        }
    }
}
