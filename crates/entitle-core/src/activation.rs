use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Product;

/// Shared service name that must be refreshed, never removed.
pub const DUMMY_SERVICE_NAME: &str = "SMT_DUMMY_NOREMOVE_SERVICE";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "obsoleted_service_name")]
    pub obsoleted_name: String,
    #[serde(default)]
    pub product: Product,
}

impl Service {
    pub fn is_dummy(&self) -> bool {
        self.name == DUMMY_SERVICE_NAME
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub regcode: String,
    #[serde(default, rename = "type")]
    pub activation_type: String,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub service: Service,
}

impl Activation {
    pub fn product(&self) -> &Product {
        &self.service.product
    }
}

pub type ActivationMap = BTreeMap<String, Activation>;

pub fn activation_map(activations: Vec<Activation>) -> ActivationMap {
    activations
        .into_iter()
        .map(|activation| (activation.product().to_triplet(), activation))
        .collect()
}
