use chrono::{DateTime, Utc};
use entitle_core::{
    activation_map, ActivationMap, Error, Product, Result, StringSet, Triplet, MAX_TREE_DEPTH,
};
use serde::Serialize;

use crate::session::{triplet_set, Session};

pub const STATUS_REGISTERED: &str = "Registered";
pub const STATUS_NOT_REGISTERED: &str = "Not Registered";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductStatus {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip)]
    pub summary: String,
    pub identifier: String,
    pub version: String,
    pub arch: String,
    pub status: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub regcode: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub starts_at: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub expires_at: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub subscription_status: String,
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub subscription_type: String,
}

impl ProductStatus {
    pub fn is_registered(&self) -> bool {
        self.status == STATUS_REGISTERED
    }

    pub fn triplet(&self) -> String {
        format!("{}/{}/{}", self.identifier, self.version, self.arch)
    }
}

pub fn statuses(session: &Session<'_>) -> Result<Vec<ProductStatus>> {
    let installed = session.packages.installed_products()?;
    let activations = if session.is_registered() {
        activation_map(session.remote.activations()?)
    } else {
        ActivationMap::new()
    };
    Ok(build_statuses(&installed, &activations))
}

pub fn status(session: &Session<'_>, triplet: &Triplet) -> Result<Option<ProductStatus>> {
    let wanted = triplet.to_string();
    Ok(statuses(session)?
        .into_iter()
        .find(|status| status.triplet() == wanted))
}

pub fn build_statuses(products: &[Product], activations: &ActivationMap) -> Vec<ProductStatus> {
    products
        .iter()
        .map(|product| {
            let mut status = ProductStatus {
                name: String::new(),
                summary: product.summary.clone(),
                identifier: product.name.clone(),
                version: product.version.clone(),
                arch: product.arch.clone(),
                status: STATUS_NOT_REGISTERED.to_string(),
                regcode: String::new(),
                starts_at: String::new(),
                expires_at: String::new(),
                subscription_status: String::new(),
                subscription_type: String::new(),
            };
            if let Some(activation) = activations.get(&product.to_triplet()) {
                status.status = STATUS_REGISTERED.to_string();
                // Free products are activated without a subscription.
                if !activation.regcode.is_empty() {
                    status.name = activation.name.clone();
                    status.regcode = activation.regcode.clone();
                    status.starts_at = format_timestamp(activation.starts_at);
                    status.expires_at = format_timestamp(activation.expires_at);
                    status.subscription_status = activation.status.clone();
                    status.subscription_type = activation.activation_type.clone();
                }
            }
            status
        })
        .collect()
}

pub fn system_products(session: &Session<'_>) -> Result<Vec<Product>> {
    let mut products = session.packages.installed_products()?;
    if !session.is_registered() {
        return Ok(products);
    }

    let mut known = triplet_set(&products);
    for activation in session.remote.activations()? {
        let product = activation.service.product;
        let triplet = product.to_triplet();
        if !known.contains(&triplet) {
            known.add(triplet);
            products.push(product);
        }
    }
    Ok(products)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtensionNode {
    pub identifier: String,
    pub version: String,
    pub arch: String,
    #[serde(rename = "name")]
    pub friendly_name: String,
    pub activated: bool,
    pub available: bool,
    pub free: bool,
    pub extensions: Vec<ExtensionNode>,
}

impl ExtensionNode {
    pub fn triplet(&self) -> String {
        format!("{}/{}/{}", self.identifier, self.version, self.arch)
    }
}

pub fn extension_tree(session: &Session<'_>) -> Result<ExtensionNode> {
    session.require_registration()?;
    let base = session.packages.base_product()?;
    let activated: StringSet = session
        .remote
        .activations()?
        .iter()
        .map(|activation| activation.product().to_triplet())
        .collect();
    let tree = session.remote.product_tree(&base)?;
    extension_node(&tree, &activated, &tree.to_triplet(), 0)
}

fn extension_node(
    product: &Product,
    activated: &StringSet,
    root: &str,
    depth: usize,
) -> Result<ExtensionNode> {
    if depth > MAX_TREE_DEPTH {
        return Err(Error::TreeTooDeep {
            root: root.to_string(),
            limit: MAX_TREE_DEPTH,
        });
    }
    let extensions = product
        .extensions
        .iter()
        .map(|extension| extension_node(extension, activated, root, depth + 1))
        .collect::<Result<Vec<_>>>()?;
    Ok(ExtensionNode {
        identifier: product.name.clone(),
        version: product.version.clone(),
        arch: product.arch.clone(),
        friendly_name: product.friendly_name.clone(),
        activated: activated.contains(&product.to_triplet()),
        available: product.available,
        free: product.free,
        extensions,
    })
}

fn format_timestamp(timestamp: Option<DateTime<Utc>>) -> String {
    timestamp
        .map(|timestamp| timestamp.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_default()
}
