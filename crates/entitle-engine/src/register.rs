use entitle_core::{traverse, Credentials, Product, Result, Service, SystemInfo, Triplet};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::session::{ProductService, Session};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterOptions {
    pub regcode: String,
    pub product: Option<Triplet>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegisterOutcome {
    pub announced: bool,
    pub products: Vec<ProductService>,
}

pub fn register(
    session: &Session<'_>,
    options: &RegisterOptions,
    info: &SystemInfo,
) -> Result<RegisterOutcome> {
    let (product, install_release_package) = requested_product(session, options)?;

    info!("Registering system to {}", session.config.base_url());
    let announced = announce_or_update(session, &options.regcode, info)?;
    add_registry_authentication(session);

    let email = options.email.as_deref();
    let service = activate_product(
        session,
        &product,
        &options.regcode,
        email,
        install_release_package,
    )?;
    let mut outcome = RegisterOutcome {
        announced,
        products: vec![ProductService::new(&product, &service)],
    };

    if product.is_base {
        let tree = session.remote.product_tree(&product)?;
        traverse(&tree, |extension| {
            if extension.free && extension.recommended && extension.available {
                let service =
                    activate_product(session, extension, &options.regcode, email, false)?;
                outcome
                    .products
                    .push(ProductService::new(extension, &service));
            }
            Ok(true)
        })?;
    }

    info!("Successfully registered system");
    Ok(outcome)
}

pub fn activate(
    session: &Session<'_>,
    triplet: &Triplet,
    regcode: &str,
    email: Option<&str>,
) -> Result<ProductService> {
    session.require_registration()?;
    let product = Product::from(triplet.clone());
    let service = activate_product(session, &product, regcode, email, true)?;
    Ok(ProductService::new(&product, &service))
}

pub fn update_system(session: &Session<'_>, info: &SystemInfo) -> Result<()> {
    session.require_registration()?;
    debug!(hostname = %info.hostname, "updating system information");
    session.remote.update_system(info)
}

pub(crate) fn activate_product(
    session: &Session<'_>,
    product: &Product,
    regcode: &str,
    email: Option<&str>,
    install_release_package: bool,
) -> Result<Service> {
    info!("Activating {} ...", product.to_triplet());
    let service = session.remote.activate(product, regcode, email)?;

    if session.config.skip_service_install {
        return Ok(service);
    }
    session.add_service(&service)?;
    if install_release_package {
        info!("Installing release package {}", product.name);
        session.packages.install_release_package(&product.name)?;
    }
    Ok(service)
}

fn requested_product(session: &Session<'_>, options: &RegisterOptions) -> Result<(Product, bool)> {
    let Some(triplet) = &options.product else {
        return Ok((session.packages.base_product()?, false));
    };

    let mut product = Product::from(triplet.clone());
    match session.packages.base_product() {
        Ok(base) if base == product => {
            product.is_base = true;
            product.release_type = base.release_type;
        }
        Ok(_) => {}
        Err(err) => debug!("no installed base product to compare with: {err}"),
    }
    Ok((product, true))
}

fn announce_or_update(session: &Session<'_>, regcode: &str, info: &SystemInfo) -> Result<bool> {
    if session.is_registered() {
        debug!("system credentials present, updating instead of announcing");
        session.remote.update_system(info)?;
        return Ok(false);
    }

    let login = session.remote.announce(regcode, info)?;
    session
        .credentials
        .write_system_credentials(&Credentials::from(login))?;
    Ok(true)
}

fn add_registry_authentication(session: &Session<'_>) {
    let result = session
        .credentials
        .system_credentials()
        .and_then(|credentials| session.credentials.add_registry_authentication(&credentials));
    if let Err(err) = result {
        warn!("unable to configure container registry authentication: {err}");
    }
}
