use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("system is not registered, use the register command first")]
    SystemNotRegistered,

    #[error("the base product cannot be deactivated")]
    BaseProductDeactivation,

    #[error("unable to detect the installed base product")]
    CannotDetectBaseProduct,

    #[error("{0}")]
    UnsupportedOperation(String),

    #[error("invalid product '{0}', <internal name>/<version>/<architecture> format expected")]
    InvalidTriplet(String),

    #[error("extension tree of {root} exceeds the maximum depth of {limit}")]
    TreeTooDeep { root: String, limit: usize },

    #[error("credentials file is missing: {}", .0.display())]
    MissingCredentials(PathBuf),

    #[error("cannot parse credentials file: {}", .0.display())]
    MalformedCredentials(PathBuf),

    #[error("unable to read proxy credentials from curlrc")]
    NoProxyCredentials,

    #[error("registration server returned '{message}' ({code})")]
    Api { code: u16, message: String },

    #[error("command '{command}' failed\nError: returned {exit_code} with '{output}'")]
    Command {
        command: String,
        exit_code: i32,
        output: String,
    },

    #[error("{action} {product} failed: {source}")]
    ProductStep {
        action: &'static str,
        product: String,
        #[source]
        source: Box<Error>,
    },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid XML output: {0}")]
    Xml(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn product_step(action: &'static str, product: impl Into<String>, source: Error) -> Self {
        Self::ProductStep {
            action,
            product: product.into(),
            source: Box::new(source),
        }
    }

    /// Exit code of a failed local command, looking through product-step wrappers.
    pub fn command_exit_code(&self) -> Option<i32> {
        match self {
            Self::Command { exit_code, .. } => Some(*exit_code),
            Self::ProductStep { source, .. } => source.command_exit_code(),
            _ => None,
        }
    }

    pub fn api_code(&self) -> Option<u16> {
        match self {
            Self::Api { code, .. } => Some(*code),
            Self::ProductStep { source, .. } => source.api_code(),
            _ => None,
        }
    }
}
