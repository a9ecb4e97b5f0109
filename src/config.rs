use crate::error::{GvmSwitchError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

pub const DEFAULT_INIT_SCRIPT_PATH: &str = "~/.gvm/scripts/gvm";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Script sourced before every gvm invocation
    pub gvm_init_script_path: String,

    /// Offer to install a missing version (and show notifications) on manual runs
    pub prompt_on_failure: bool,

    /// Offer to create a missing pkgset
    pub prompt_to_create_pkgset: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gvm_init_script_path: DEFAULT_INIT_SCRIPT_PATH.to_string(),
            prompt_on_failure: false,
            prompt_to_create_pkgset: false,
        }
    }
}

impl Config {
    /// Location of the config file: `$GVM_SWITCH_CONFIG`, then the platform config dir.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("GVM_SWITCH_CONFIG") {
            return PathBuf::from(shellexpand::tilde(&path).to_string());
        }

        if let Some(proj_dirs) = ProjectDirs::from("", "", "gvm-switch") {
            return proj_dirs.config_dir().join("config.toml");
        }

        PathBuf::from(shellexpand::tilde("~/.gvm-switch.toml").to_string())
    }

    /// Load the config file, falling back to defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if config.gvm_init_script_path.trim().is_empty() {
            config.gvm_init_script_path = DEFAULT_INIT_SCRIPT_PATH.to_string();
        }

        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| GvmSwitchError::ConfigError(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Init script path with a leading `~` expanded to the home directory.
    pub fn init_script_path(&self) -> PathBuf {
        expand_home(&self.gvm_init_script_path)
    }
}

/// Something that hands out the current configuration.
///
/// Implementations are asked again for every switch, so edits to the
/// config file apply to the next run without a restart.
pub trait ConfigSource: Send + Sync {
    fn current(&self) -> Config;
}

impl ConfigSource for Config {
    fn current(&self) -> Config {
        self.clone()
    }
}

/// Config backed by a TOML file that is re-read on every call.
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ConfigSource for ConfigFile {
    fn current(&self) -> Config {
        match Config::load_from(&self.path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring unreadable config {}: {}", self.path.display(), e);
                Config::default()
            }
        }
    }
}

pub fn expand_home(path: &str) -> PathBuf {
    let home = dirs::home_dir().map(|h| h.to_string_lossy().into_owned());
    expand_home_with(path, home)
}

/// `~` and `~/...` resolve against `home`; any other path is returned unchanged.
pub fn expand_home_with(path: &str, home: Option<String>) -> PathBuf {
    PathBuf::from(shellexpand::tilde_with_context(path, || home).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.gvm_init_script_path, "~/.gvm/scripts/gvm");
        assert!(!config.prompt_on_failure);
        assert!(!config.prompt_to_create_pkgset);
    }

    #[test]
    fn test_expand_home() {
        let home = Some("/home/gopher".to_string());
        assert_eq!(
            expand_home_with("~/.gvm/scripts/gvm", home.clone()),
            PathBuf::from("/home/gopher/.gvm/scripts/gvm")
        );
        assert_eq!(
            expand_home_with("/abs/path", home.clone()),
            PathBuf::from("/abs/path")
        );
        assert_eq!(expand_home_with("~", home), PathBuf::from("/home/gopher"));
    }

    #[test]
    fn test_expand_home_without_home_dir() {
        assert_eq!(
            expand_home_with("~/.gvm/scripts/gvm", None),
            PathBuf::from("~/.gvm/scripts/gvm")
        );
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load_from(&temp_dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            "gvmInitScriptPath = \"/opt/gvm/scripts/gvm\"\npromptOnFailure = true\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.gvm_init_script_path, "/opt/gvm/scripts/gvm");
        assert!(config.prompt_on_failure);
        assert!(!config.prompt_to_create_pkgset);
    }

    #[test]
    fn test_empty_init_path_falls_back_to_default() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "gvmInitScriptPath = \"\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.gvm_init_script_path, DEFAULT_INIT_SCRIPT_PATH);
    }

    #[test]
    fn test_config_file_is_reread() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");
        let source = ConfigFile::new(path.clone());
        assert!(!source.current().prompt_on_failure);

        let config = Config {
            prompt_on_failure: true,
            ..Config::default()
        };
        config.save_to(&path).unwrap();
        assert!(source.current().prompt_on_failure);
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "promptOnFailure = \"maybe\"").unwrap();

        assert!(Config::load_from(&path).is_err());
        assert_eq!(ConfigFile::new(path).current(), Config::default());
    }
}
