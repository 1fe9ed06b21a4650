use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/entitle.toml";
pub const DEFAULT_SERVER_URL: &str = "https://scc.suse.com";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub insecure: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub auto_agree_with_licenses: bool,
    pub enable_system_uptime_tracking: bool,
    pub no_zypper_refs: bool,
    pub auto_import_repo_keys: bool,
    pub skip_service_install: bool,
    #[serde(skip)]
    pub fs_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: DEFAULT_SERVER_URL.to_string(),
            language: None,
            insecure: false,
            namespace: None,
            auto_agree_with_licenses: false,
            enable_system_uptime_tracking: false,
            no_zypper_refs: false,
            auto_import_repo_keys: false,
            skip_service_install: false,
            fs_root: PathBuf::from("/"),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path).map_err(|err| {
            Error::io(format!("failed to read config: {}", path.display()), err)
        })?;
        Self::parse(&raw)
            .map_err(|err| Error::Config(format!("{}: {err}", path.display())))
    }

    pub fn parse(raw: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                Error::io(format!("failed to create config dir: {}", parent.display()), err)
            })?;
        }
        let content = toml::to_string(self)
            .map_err(|err| Error::Config(format!("failed to serialize config: {err}")))?;
        fs::write(path, content)
            .map_err(|err| Error::io(format!("failed to write config: {}", path.display()), err))
    }

    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    pub fn root_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        let relative = path.strip_prefix("/").unwrap_or(path);
        self.fs_root.join(relative)
    }
}
