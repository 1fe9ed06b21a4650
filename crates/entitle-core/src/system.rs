use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareInfo {
    pub hostname: String,
    pub cpus: u32,
    pub sockets: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hypervisor: Option<String>,
    pub arch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mem_total: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub online_at: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub hostname: String,
    pub distro_target: String,
    pub hwinfo: HardwareInfo,
    #[serde(flatten)]
    pub extra: ExtraData,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemLogin {
    pub login: String,
    pub password: String,
}

impl fmt::Debug for SystemLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemLogin")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub system_token: Option<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            system_token: None,
        }
    }
}

impl From<SystemLogin> for Credentials {
    fn from(login: SystemLogin) -> Self {
        Self::new(login.login, login.password)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("system_token", &self.system_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledService {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRepository {
    pub name: String,
    pub alias: String,
    pub url: String,
    pub enabled: bool,
    pub priority: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductPackage {
    pub name: String,
    pub edition: String,
    pub arch: String,
    pub repository: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistUpgradeOptions {
    pub non_interactive: bool,
    pub auto_agree_with_licenses: bool,
    pub allow_vendor_change: bool,
    pub download_only: bool,
    pub no_recommends: bool,
    pub dry_run: bool,
}
