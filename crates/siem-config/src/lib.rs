//! Layered configuration, grounded on the teacher's `kimberlite-config`:
//! built-in defaults, then `siem.toml` (git-tracked), then `siem.local.toml`
//! (gitignored), then `SIEM_*` environment variables, then CLI flags
//! (applied by the caller after `load` returns, since `clap` owns argv
//! parsing in `siem-cli`).

mod error;
mod paths;

pub use error::{ConfigError, Result};
pub use paths::Paths;

use std::path::PathBuf;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

/// Resolved runtime configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Base directory; must contain a `logs/` subdirectory before `init`.
    pub base_dir: PathBuf,
    /// Directory of `*.toml` directive files for `siem-directives::load_dir`.
    pub directives_dir: PathBuf,
    /// IPv4 CIDRs considered `HOME_NET` by the default matcher.
    pub home_net: Vec<String>,
    /// Seed for the backlog ID generator.
    pub id_seed: u64,
    /// Default `tracing_subscriber::EnvFilter` directive when `RUST_LOG`
    /// is unset.
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            directives_dir: PathBuf::from("directives"),
            home_net: vec!["10.0.0.0/8".to_string(), "192.168.0.0/16".to_string()],
            id_seed: 0,
            log_filter: "info".to_string(),
        }
    }
}

/// Builds `Settings` from defaults → `<project_root>/siem.toml` →
/// `<project_root>/siem.local.toml` → `SIEM_*` env vars.
pub struct ConfigLoader {
    project_root: PathBuf,
}

impl ConfigLoader {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }

    pub fn load(&self) -> Result<Settings> {
        let defaults = Settings::default();
        let user_config = Paths::discover().ok().and_then(|p| p.user_config);

        let mut builder = Config::builder()
            .set_default("base_dir", defaults.base_dir.to_string_lossy().to_string())?
            .set_default("directives_dir", defaults.directives_dir.to_string_lossy().to_string())?
            .set_default("home_net", defaults.home_net)?
            .set_default("id_seed", defaults.id_seed)?
            .set_default("log_filter", defaults.log_filter)?;

        if let Some(user_config) = user_config {
            builder = builder.add_source(File::from(user_config).format(FileFormat::Toml).required(false));
        }

        let builder = builder
            .add_source(
                File::from(self.project_root.join("siem.toml"))
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                File::from(self.project_root.join("siem.local.toml"))
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(Environment::with_prefix("SIEM").separator("__"));

        let settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_nothing_present() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ConfigLoader::new(dir.path()).load().unwrap();
        assert_eq!(settings.id_seed, 0);
        assert_eq!(settings.log_filter, "info");
    }

    #[test]
    fn project_config_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("siem.toml"), "id_seed = 7\nlog_filter = \"debug\"\n").unwrap();
        let settings = ConfigLoader::new(dir.path()).load().unwrap();
        assert_eq!(settings.id_seed, 7);
        assert_eq!(settings.log_filter, "debug");
    }

    #[test]
    fn local_config_overrides_project_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("siem.toml"), "id_seed = 7\n").unwrap();
        std::fs::write(dir.path().join("siem.local.toml"), "id_seed = 99\n").unwrap();
        let settings = ConfigLoader::new(dir.path()).load().unwrap();
        assert_eq!(settings.id_seed, 99);
    }

    #[test]
    fn env_vars_override_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("siem.toml"), "id_seed = 7\n").unwrap();
        std::env::set_var("SIEM_ID_SEED", "123");
        let settings = ConfigLoader::new(dir.path()).load().unwrap();
        std::env::remove_var("SIEM_ID_SEED");
        assert_eq!(settings.id_seed, 123);
    }
}
