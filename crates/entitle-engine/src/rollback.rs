use entitle_core::{flatten, Result};
use tracing::info;

use crate::session::{triplet_set, Session};

pub fn rollback(session: &Session<'_>) -> Result<()> {
    session.require_registration()?;
    info!("Starting to sync system product activations to the server. This can take some time...");

    let base = session.packages.base_product()?;
    info!("Downgrading {} ...", base.to_triplet());
    let service = session.remote.downgrade(&base)?;
    session.reconcile_service(&service)?;

    let installed = session.packages.installed_products()?;
    let installed_ids = triplet_set(&installed);
    let tree = session.remote.product_tree(&base)?;
    for extension in flatten(&tree)?
        .iter()
        .filter(|extension| installed_ids.contains(&extension.to_triplet()))
    {
        info!("Downgrading {} ...", extension.to_triplet());
        let service = session.remote.downgrade(extension)?;
        session.reconcile_service(&service)?;
    }

    session.remote.synchronize_products(&installed)?;
    session.packages.set_release_version(&base.version)
}
