use entitle_core::{flatten, Credentials, Error, Product, Result, Service, Triplet};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::session::{triplet_set, ProductService, Session};

pub const CLOUD_GUEST_REGISTER_PATH: &str = "/usr/sbin/registercloudguest";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeregisterOutcome {
    pub products: Vec<ProductService>,
}

pub fn deactivate(session: &Session<'_>, triplet: &Triplet) -> Result<ProductService> {
    session.require_registration()?;
    let product = Product::from(triplet.clone());
    let base = session.packages.base_product()?;
    if base == product {
        return Err(Error::BaseProductDeactivation);
    }

    let service = deactivate_product(session, &product)?;
    Ok(ProductService::new(&product, &service))
}

pub fn deregister(session: &Session<'_>, product: Option<&Triplet>) -> Result<DeregisterOutcome> {
    if product.is_none() && session.config.root_path(CLOUD_GUEST_REGISTER_PATH).exists() {
        return Err(Error::UnsupportedOperation(
            "de-registration is disabled by registercloudguest, use `registercloudguest --clean` instead"
                .to_string(),
        ));
    }
    session.require_registration()?;

    if let Some(triplet) = product {
        let deactivated = deactivate(session, triplet)?;
        return Ok(DeregisterOutcome {
            products: vec![deactivated],
        });
    }

    info!("Deregistering system from {}", session.config.base_url());
    // Registry entries are only removed when they match this login.
    let credentials = session.credentials.system_credentials();
    let result = deregister_system(session);
    clean_up_registration(session, credentials.ok().as_ref());
    result.map(|products| DeregisterOutcome { products })
}

pub fn cleanup(session: &Session<'_>) -> Result<()> {
    info!("Cleaning up ...");
    let base_url = session.config.base_url();
    for service in session.packages.installed_services()? {
        if service.url.contains(base_url) {
            debug!(service = %service.name, url = %service.url, "removing server service");
            session.remove_service(&service.name)?;
        }
    }
    session.credentials.remove_system_credentials()
}

fn deregister_system(session: &Session<'_>) -> Result<Vec<ProductService>> {
    let base = session.packages.base_product()?;
    let installed = triplet_set(&session.packages.installed_products()?);
    let tree = session.remote.product_tree(&base)?;
    let dependents: Vec<Product> = flatten(&tree)?
        .into_iter()
        .filter(|extension| installed.contains(&extension.to_triplet()))
        .collect();

    let mut products = Vec::with_capacity(dependents.len() + 1);
    for extension in dependents.iter().rev() {
        let service = deactivate_product(session, extension)?;
        products.push(ProductService::new(extension, &service));
    }

    info!("Deactivating {} ...", base.to_triplet());
    let service = session.remote.deactivate(&base)?;
    if !session.config.skip_service_install {
        session.remove_or_refresh_service(&service.name)?;
    }
    products.push(ProductService::new(&base, &service));

    session.remote.deregister()?;
    info!("Successfully deregistered system");
    Ok(products)
}

fn deactivate_product(session: &Session<'_>, product: &Product) -> Result<Service> {
    info!("Deactivating {} ...", product.to_triplet());
    let service = session.remote.deactivate(product)?;

    if session.config.skip_service_install {
        return Ok(service);
    }
    session.remove_or_refresh_service(&service.name)?;
    info!("Removing release package {}", product.name);
    session.packages.remove_release_package(&product.name)?;
    Ok(service)
}

fn clean_up_registration(session: &Session<'_>, credentials: Option<&Credentials>) {
    if let Some(credentials) = credentials {
        if let Err(err) = session.credentials.remove_registry_authentication(credentials) {
            warn!("unable to remove container registry authentication: {err}");
        }
    }
    if let Err(err) = cleanup(session) {
        warn!("cleanup after deregistration failed: {err}");
    }
}
