use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

const CONFIG_DIR_REL_HOME: &str = ".config/botofspades";
const CONFIG_FILE_NAME: &str = "config.toml";
const CHARSHEETS_DIR_NAME: &str = "charsheets";

/// Bot configuration
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Config {
    pub general: General,
    #[serde(default)]
    pub charsheets: Charsheets,
    #[serde(default)]
    pub messages: Messages,
}

#[derive(serde::Serialize, serde::Deserialize)]
pub struct General {
    pub discord_token: String,
    pub bot_owners: Vec<String>,
    pub command_prefix: String,
}

#[derive(Default, serde::Serialize, serde::Deserialize)]
pub struct Charsheets {
    /// Where templates and sheets are kept.  Defaults to a directory next to the config file.
    pub base_dir: Option<PathBuf>,
}

#[derive(Default, serde::Serialize, serde::Deserialize)]
pub struct Messages {
    /// Message bank replacing the built-in one
    pub path: Option<PathBuf>,
}

impl Config {
    fn config_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|p| p.join(CONFIG_DIR_REL_HOME))
            .ok_or(anyhow!("Could not find home directory"))
    }

    pub async fn load() -> Result<Self> {
        Self::load_from(&Self::config_dir()?.join(CONFIG_FILE_NAME)).await
    }

    pub async fn load_from(path: &Path) -> Result<Self> {
        let mut file = tokio::fs::File::open(path).await.map_err(|e| {
            anyhow!(
                "Could not open configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).await.map_err(|e| {
            anyhow!(
                "Could not read configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        let config: Config = toml::from_str(&contents).map_err(|e| {
            anyhow!(
                "Could not parse configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        Ok(config)
    }

    /// Directory holding the `templates/` and `sheets/` document directories
    pub fn charsheets_dir(&self) -> Result<PathBuf> {
        match &self.charsheets.base_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::config_dir()?.join(CHARSHEETS_DIR_NAME)),
        }
    }
}
