use std::time::Duration;

use entitle_core::{
    Activation, Config, CredentialStore, Error, MigrationPath, Product, RemoteService, Result,
    Service, SystemInfo, SystemLogin,
};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, Proxy, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::credentials::{curlrc_path, read_curlrc_proxy_credentials};
use crate::payload::{
    ActivateRequest, ApiErrorBody, MigrationsRequest, ProductRequest, SynchronizeRequest,
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);
const ACCEPT_VALUE: &str = "application/json,application/vnd.scc.suse.com.v4+json";
const USER_AGENT_VALUE: &str = concat!("entitle/", env!("CARGO_PKG_VERSION"));
pub const SYSTEM_TOKEN_HEADER: &str = "System-Token";

#[derive(Debug, Clone, Copy)]
enum Auth<'a> {
    System,
    Regcode(&'a str),
}

pub struct SccClient<C: CredentialStore> {
    http: Client,
    base_url: String,
    language: Option<String>,
    credentials: C,
}

impl<C: CredentialStore> SccClient<C> {
    pub fn new(config: &Config, credentials: C) -> Result<Self> {
        Ok(Self {
            http: build_http_client(config.insecure)?,
            base_url: config.base_url().to_string(),
            language: config.language.clone(),
            credentials,
        })
    }

    fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let body = self.send(Method::GET, path, Auth::System, query, None)?;
        Ok(serde_json::from_slice(&body)?)
    }

    fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        auth: Auth<'_>,
        payload: &B,
    ) -> Result<T> {
        let body = serde_json::to_vec(payload)?;
        let response = self.send(method, path, auth, &[], Some(body))?;
        Ok(serde_json::from_slice(&response)?)
    }

    fn send(
        &self,
        method: Method,
        path: &str,
        auth: Auth<'_>,
        query: &[(&str, &str)],
        body: Option<Vec<u8>>,
    ) -> Result<Vec<u8>> {
        let url = endpoint_url(&self.base_url, path, query)?;
        debug!(%method, %url, "sending registration request");

        let mut request = self
            .http
            .request(method, url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, ACCEPT_VALUE)
            .header(USER_AGENT, USER_AGENT_VALUE);
        if let Some(language) = &self.language {
            request = request.header(ACCEPT_LANGUAGE, language);
        }
        match auth {
            Auth::System => {
                let credentials = self.credentials.system_credentials()?;
                request = request.basic_auth(credentials.username, Some(credentials.password));
                if let Some(token) = credentials.system_token {
                    request = request.header(SYSTEM_TOKEN_HEADER, token);
                }
            }
            Auth::Regcode(regcode) => {
                request = request.header(AUTHORIZATION, format!("Token token={regcode}"));
            }
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request
            .send()
            .map_err(|err| Error::Transport(err.to_string()))?;
        let status = response.status();

        let rotated = response
            .headers()
            .get(SYSTEM_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string);
        if let Some(token) = rotated {
            if let Err(err) = self.credentials.update_system_token(&token) {
                debug!(error = %err, "failed to persist rotated system token");
            }
        }

        let body = response
            .bytes()
            .map_err(|err| Error::Transport(err.to_string()))?;
        if !status.is_success() {
            return Err(api_error(status, &body));
        }
        Ok(body.to_vec())
    }
}

impl<C: CredentialStore> RemoteService for SccClient<C> {
    fn announce(&self, regcode: &str, info: &SystemInfo) -> Result<SystemLogin> {
        self.send_json(
            Method::POST,
            "/connect/subscriptions/systems",
            Auth::Regcode(regcode),
            info,
        )
    }

    fn update_system(&self, info: &SystemInfo) -> Result<()> {
        let body = serde_json::to_vec(info)?;
        self.send(Method::PUT, "/connect/systems", Auth::System, &[], Some(body))?;
        Ok(())
    }

    fn activate(&self, product: &Product, regcode: &str, email: Option<&str>) -> Result<Service> {
        let payload = ActivateRequest {
            product: ProductRequest::from(product),
            token: regcode,
            email,
        };
        self.send_json(
            Method::POST,
            "/connect/systems/products",
            Auth::System,
            &payload,
        )
    }

    fn upgrade(&self, product: &Product) -> Result<Service> {
        self.send_json(
            Method::PUT,
            "/connect/systems/products",
            Auth::System,
            &ProductRequest::from(product),
        )
    }

    fn deactivate(&self, product: &Product) -> Result<Service> {
        self.send_json(
            Method::DELETE,
            "/connect/systems/products",
            Auth::System,
            &ProductRequest::from(product),
        )
    }

    fn product_tree(&self, product: &Product) -> Result<Product> {
        self.get("/connect/systems/products", &product.query())
    }

    fn activations(&self) -> Result<Vec<Activation>> {
        self.get("/connect/systems/activations", &[])
    }

    fn migrations(
        &self,
        installed: &[Product],
        target: Option<&Product>,
    ) -> Result<Vec<MigrationPath>> {
        let path = if target.is_some() {
            "/connect/systems/products/offline_migrations"
        } else {
            "/connect/systems/products/migrations"
        };
        let payload = MigrationsRequest {
            installed_products: installed,
            target_base_product: target,
        };
        self.send_json(Method::POST, path, Auth::System, &payload)
    }

    fn synchronize_products(&self, products: &[Product]) -> Result<Vec<Product>> {
        self.send_json(
            Method::POST,
            "/connect/systems/products/synchronize",
            Auth::System,
            &SynchronizeRequest { products },
        )
    }

    fn deregister(&self) -> Result<()> {
        self.send(Method::DELETE, "/connect/systems", Auth::System, &[], None)?;
        Ok(())
    }
}

pub(crate) fn endpoint_url(base_url: &str, path: &str, query: &[(&str, &str)]) -> Result<Url> {
    let raw = format!("{}{}", base_url.trim_end_matches('/'), path);
    let parsed = if query.is_empty() {
        Url::parse(&raw)
    } else {
        Url::parse_with_params(&raw, query)
    };
    parsed.map_err(|err| Error::Config(format!("invalid server URL '{raw}': {err}")))
}

pub(crate) fn api_error(status: StatusCode, body: &[u8]) -> Error {
    let parsed: ApiErrorBody = serde_json::from_slice(body).unwrap_or_default();
    let message = parsed
        .message()
        .map(str::to_string)
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_else(|| "unexpected response".to_string());
    Error::Api {
        code: status.as_u16(),
        message,
    }
}

fn build_http_client(insecure: bool) -> Result<Client> {
    let mut builder = Client::builder()
        .timeout(HTTP_TIMEOUT)
        .danger_accept_invalid_certs(insecure);

    if !proxy_enabled(std::env::var("PROXY_ENABLED").ok().as_deref()) {
        builder = builder.no_proxy();
    } else if let Some(proxy) = authenticated_proxy() {
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|err| Error::Transport(format!("failed to create HTTP client: {err}")))
}

/// Unset means enabled; otherwise only explicit truthy values enable it.
pub(crate) fn proxy_enabled(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(value) => matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "yes" | "true" | "1"
        ),
    }
}

fn authenticated_proxy() -> Option<Proxy> {
    let proxy_url = ["https_proxy", "HTTPS_PROXY", "http_proxy", "HTTP_PROXY"]
        .iter()
        .find_map(|name| std::env::var(name).ok())
        .filter(|value| !value.trim().is_empty())?;
    let curlrc = curlrc_path()?;
    if !curlrc.exists() {
        return None;
    }
    let (user, password) = match read_curlrc_proxy_credentials(&curlrc) {
        Ok(credentials) => credentials,
        Err(err) => {
            debug!(error = %err, "no proxy credentials in curlrc");
            return None;
        }
    };
    match Proxy::all(proxy_url.as_str()) {
        Ok(proxy) => Some(proxy.basic_auth(&user, &password)),
        Err(err) => {
            warn!(error = %err, "ignoring invalid proxy URL");
            None
        }
    }
}
