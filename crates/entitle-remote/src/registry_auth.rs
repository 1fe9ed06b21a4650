use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use entitle_core::{Error, Result};
use serde_json::{Map, Value};
use tracing::debug;

use crate::credentials::write_secret_file;

pub const SUSE_REGISTRY: &str = "https://registry.suse.com";

const DOCKER_CONFIG: &str = ".docker/config.json";
const PODMAN_CONFIG: &str = "containers/auth.json";

pub fn default_registry_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(DOCKER_CONFIG));
    }
    if let Some(runtime_dir) = std::env::var_os("XDG_RUNTIME_DIR") {
        paths.push(PathBuf::from(runtime_dir).join(PODMAN_CONFIG));
    }
    paths
}

pub fn encode_registry_auth(login: &str, password: &str) -> String {
    STANDARD.encode(format!("{login}:{password}"))
}

fn decode_registry_auth(auth: &str) -> Option<(String, String)> {
    let decoded = STANDARD.decode(auth).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (login, password) = decoded.split_once(':')?;
    Some((login.to_string(), password.to_string()))
}

pub fn add_registry_auth(path: &Path, login: &str, password: &str) -> Result<()> {
    let mut config = load_config(path)?.unwrap_or_default();
    let auths = auths_entry(&mut config)?;
    if auths.contains_key(SUSE_REGISTRY) {
        debug!(path = %path.display(), "registry already configured, skipping");
        return Ok(());
    }

    let mut entry = Map::new();
    entry.insert(
        "auth".to_string(),
        Value::String(encode_registry_auth(login, password)),
    );
    auths.insert(SUSE_REGISTRY.to_string(), Value::Object(entry));
    save_config(path, &config)
}

/// Removes the registry entry only if it carries exactly this login.
/// Returns whether the file was changed.
pub fn remove_registry_auth(path: &Path, login: &str, password: &str) -> Result<bool> {
    let Some(mut config) = load_config(path)? else {
        return Ok(false);
    };
    let auths = auths_entry(&mut config)?;

    let matches = auths
        .get(SUSE_REGISTRY)
        .and_then(|entry| entry.get("auth"))
        .and_then(Value::as_str)
        .and_then(decode_registry_auth)
        .is_some_and(|(stored_login, stored_password)| {
            stored_login == login && stored_password == password
        });
    if !matches {
        return Ok(false);
    }

    auths.remove(SUSE_REGISTRY);
    save_config(path, &config)?;
    Ok(true)
}

fn load_config(path: &Path) -> Result<Option<Map<String, Value>>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read(path).map_err(|err| {
        Error::io(format!("failed to read registry config: {}", path.display()), err)
    })?;
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Some(Map::new()));
    }
    match serde_json::from_slice::<Value>(&raw)? {
        Value::Object(map) => Ok(Some(map)),
        _ => Err(Error::Config(format!(
            "registry config is not a JSON object: {}",
            path.display()
        ))),
    }
}

fn auths_entry(config: &mut Map<String, Value>) -> Result<&mut Map<String, Value>> {
    let auths = config
        .entry("auths")
        .or_insert_with(|| Value::Object(Map::new()));
    if auths.is_null() {
        *auths = Value::Object(Map::new());
    }
    auths
        .as_object_mut()
        .ok_or_else(|| Error::Config("registry config 'auths' is not an object".to_string()))
}

fn save_config(path: &Path, config: &Map<String, Value>) -> Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    write_secret_file(path, &content)
}
