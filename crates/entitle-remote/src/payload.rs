use entitle_core::Product;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct ProductRequest<'a> {
    pub identifier: &'a str,
    pub version: &'a str,
    pub arch: &'a str,
    pub release_type: &'a str,
}

impl<'a> From<&'a Product> for ProductRequest<'a> {
    fn from(product: &'a Product) -> Self {
        Self {
            identifier: &product.name,
            version: &product.version,
            arch: &product.arch,
            release_type: &product.release_type,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ActivateRequest<'a> {
    #[serde(flatten)]
    pub product: ProductRequest<'a>,
    pub token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct MigrationsRequest<'a> {
    pub installed_products: &'a [Product],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_base_product: Option<&'a Product>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SynchronizeRequest<'a> {
    pub products: &'a [Product],
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub error: Option<String>,
    pub localized_error: Option<String>,
}

impl ApiErrorBody {
    pub fn message(&self) -> Option<&str> {
        [self.localized_error.as_deref(), self.error.as_deref()]
            .into_iter()
            .flatten()
            .find(|message| !message.trim().is_empty())
    }
}
