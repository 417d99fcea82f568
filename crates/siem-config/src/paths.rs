use std::path::PathBuf;

use directories::ProjectDirs;

use crate::error::{ConfigError, Result};

/// XDG-style locations the loader consults before falling back to built-in
/// defaults, grounded on the teacher's `directories::ProjectDirs` usage.
pub struct Paths {
    pub user_config: Option<PathBuf>,
}

impl Paths {
    pub fn discover() -> Result<Self> {
        let dirs = ProjectDirs::from("rs", "ossim", "siem-correlator").ok_or(ConfigError::NoProjectDirs)?;
        let candidate = dirs.config_dir().join("siem.toml");
        Ok(Self {
            user_config: candidate.exists().then_some(candidate),
        })
    }
}
