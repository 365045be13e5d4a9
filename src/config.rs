use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;

/// Parameters of one guided training session, frozen when the session starts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    pub num_reps: u32,
    pub rep_time: u32,
    pub time_between_reps: u32,
    pub rep_folder: PathBuf,
    pub output_folder: PathBuf,
    pub randomize: bool,
    pub continuous: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            num_reps: 3,
            rep_time: 3,
            time_between_reps: 3,
            rep_folder: PathBuf::from("images"),
            output_folder: PathBuf::from("data"),
            randomize: false,
            continuous: false,
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> SessionConfig;
    fn save(&self, cfg: &SessionConfig) -> std::io::Result<()>;
}

/// Remembers the last configuration the operator started a session with
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
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

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> SessionConfig {
        if let Ok(bytes) = fs::read(&self.path) {
            match serde_json::from_slice::<SessionConfig>(&bytes) {
                Ok(cfg) => return cfg,
                Err(e) => tracing::warn!("Ignoring unreadable config {:?}: {}", self.path, e),
            }
        }
        SessionConfig::default()
    }

    fn save(&self, cfg: &SessionConfig) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).map_err(std::io::Error::other)?;
        fs::write(&self.path, data)
    }
}
