use std::fs;
use std::path::{Path, PathBuf};

use entitle_core::{CredentialStore, Credentials, Error, Result};
use tracing::debug;

use crate::registry_auth::{
    add_registry_auth, default_registry_config_paths, remove_registry_auth,
};

pub const CREDENTIALS_DIR: &str = "etc/zypp/credentials.d";
pub const SYSTEM_CREDENTIALS_FILE: &str = "SCCcredentials";
pub const CURLRC_FILE: &str = ".curlrc";

#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    fs_root: PathBuf,
    registry_configs: Vec<PathBuf>,
}

impl FileCredentialStore {
    pub fn new(fs_root: impl Into<PathBuf>) -> Self {
        Self {
            fs_root: fs_root.into(),
            registry_configs: default_registry_config_paths(),
        }
    }

    pub fn with_registry_configs(mut self, paths: Vec<PathBuf>) -> Self {
        self.registry_configs = paths;
        self
    }

    pub fn system_credentials_path(&self) -> PathBuf {
        self.fs_root
            .join(CREDENTIALS_DIR)
            .join(SYSTEM_CREDENTIALS_FILE)
    }

    pub fn service_credentials_path(&self, service: &str) -> PathBuf {
        self.fs_root.join(CREDENTIALS_DIR).join(service)
    }

    fn read_credentials(&self, path: &Path) -> Result<Credentials> {
        if !path.exists() {
            return Err(Error::MissingCredentials(path.to_path_buf()));
        }
        let raw = fs::read_to_string(path).map_err(|err| {
            Error::io(format!("failed to read credentials: {}", path.display()), err)
        })?;
        parse_credentials(&raw).ok_or_else(|| Error::MalformedCredentials(path.to_path_buf()))
    }
}

impl CredentialStore for FileCredentialStore {
    fn has_system_credentials(&self) -> bool {
        self.read_credentials(&self.system_credentials_path()).is_ok()
    }

    fn system_credentials(&self) -> Result<Credentials> {
        self.read_credentials(&self.system_credentials_path())
    }

    fn write_system_credentials(&self, credentials: &Credentials) -> Result<()> {
        let path = self.system_credentials_path();
        debug!(path = %path.display(), "writing system credentials");
        write_secret_file(&path, &render_credentials(credentials))
    }

    fn update_system_token(&self, token: &str) -> Result<()> {
        let mut credentials = self.system_credentials()?;
        if credentials.system_token.as_deref() == Some(token) {
            return Ok(());
        }
        credentials.system_token = Some(token.to_string());
        self.write_system_credentials(&credentials)
    }

    fn remove_system_credentials(&self) -> Result<()> {
        remove_file_if_exists(&self.system_credentials_path())
    }

    fn write_service_credentials(&self, service: &str) -> Result<()> {
        let system = self.system_credentials()?;
        let credentials = Credentials::new(system.username, system.password);
        let path = self.service_credentials_path(service);
        debug!(path = %path.display(), "writing service credentials");
        write_secret_file(&path, &render_credentials(&credentials))
    }

    fn remove_service_credentials(&self, service: &str) -> Result<()> {
        remove_file_if_exists(&self.service_credentials_path(service))
    }

    fn add_registry_authentication(&self, credentials: &Credentials) -> Result<()> {
        for path in &self.registry_configs {
            add_registry_auth(path, &credentials.username, &credentials.password)?;
        }
        Ok(())
    }

    fn remove_registry_authentication(&self, credentials: &Credentials) -> Result<()> {
        for path in &self.registry_configs {
            remove_registry_auth(path, &credentials.username, &credentials.password)?;
        }
        Ok(())
    }
}

/// Parses a credentials file; `None` when username or password is missing.
pub fn parse_credentials(raw: &str) -> Option<Credentials> {
    let mut username = None;
    let mut password = None;
    let mut system_token = None;

    for line in raw.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.trim() {
            "username" => username = Some(value.to_string()),
            "password" => password = Some(value.to_string()),
            "system_token" => system_token = Some(value.to_string()),
            _ => {}
        }
    }

    Some(Credentials {
        username: username?,
        password: password?,
        system_token,
    })
}

pub fn render_credentials(credentials: &Credentials) -> String {
    let mut payload = String::new();
    payload.push_str(&format!("username={}\n", credentials.username));
    payload.push_str(&format!("password={}\n", credentials.password));
    if let Some(token) = &credentials.system_token {
        payload.push_str(&format!("system_token={}\n", token));
    }
    payload
}

pub fn read_curlrc_proxy_credentials(path: &Path) -> Result<(String, String)> {
    let raw = fs::read_to_string(path)
        .map_err(|err| Error::io(format!("failed to read curlrc: {}", path.display()), err))?;
    raw.lines()
        .find_map(parse_curlrc_proxy_user)
        .ok_or(Error::NoProxyCredentials)
}

pub fn curlrc_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CURLRC_FILE))
}

fn parse_curlrc_proxy_user(line: &str) -> Option<(String, String)> {
    let rest = line.trim().trim_start_matches('-').strip_prefix("proxy-user")?;
    let quoted = rest.trim_start_matches([' ', '=']).trim_end();
    let inner = quoted.strip_prefix('"')?.strip_suffix('"')?;
    let (user, password) = inner.rsplit_once(':')?;
    if user.is_empty() || password.is_empty() {
        return None;
    }
    Some((user.to_string(), password.to_string()))
}

pub(crate) fn write_secret_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            Error::io(format!("failed to create directory: {}", parent.display()), err)
        })?;
    }
    fs::write(path, content)
        .map_err(|err| Error::io(format!("failed to write file: {}", path.display()), err))?;
    restrict_permissions(path)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|err| {
        Error::io(format!("failed to set permissions: {}", path.display()), err)
    })
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

fn remove_file_if_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    debug!(path = %path.display(), "removing credentials");
    fs::remove_file(path)
        .map_err(|err| Error::io(format!("failed to remove file: {}", path.display()), err))
}
