mod client;
mod credentials;
mod payload;
mod registry_auth;

pub use client::{SccClient, SYSTEM_TOKEN_HEADER};
pub use credentials::{
    curlrc_path, parse_credentials, read_curlrc_proxy_credentials, render_credentials,
    FileCredentialStore, CREDENTIALS_DIR, SYSTEM_CREDENTIALS_FILE,
};
pub use registry_auth::{
    add_registry_auth, default_registry_config_paths, encode_registry_auth, remove_registry_auth,
    SUSE_REGISTRY,
};
