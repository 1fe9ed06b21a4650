use std::cmp::Ordering;

use entitle_core::{
    compare_editions, DistUpgradeOptions, Error, MigrationPath, Product, Result, StringSet,
    Triplet,
};
use tracing::{debug, info, warn};

use crate::rollback::rollback;
use crate::session::{triplet_set, Session};
use crate::status::system_products;

pub const DIST_UPGRADE_COMMIT_FAILED: i32 = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationPlan {
    pub system_products: Vec<Product>,
    pub installed: StringSet,
    pub available: Vec<MigrationPath>,
    pub unavailable: Vec<MigrationPath>,
}

impl MigrationPlan {
    pub fn is_installed(&self, product: &Product) -> bool {
        self.installed.contains(&product.to_triplet())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationOptions {
    pub disable_obsolete_repos: bool,
    pub dist_upgrade: DistUpgradeOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub base_version: String,
    pub disabled_repositories: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("migration failed: {error}")]
pub struct MigrationFailure {
    pub error: Error,
    /// The distribution upgrade failed mid-commit; no rollback was attempted.
    pub filesystem_inconsistent: bool,
    pub rollback: Option<Result<()>>,
}

pub fn product_migrations(
    session: &Session<'_>,
    installed: &[Product],
    target: Option<&Product>,
) -> Result<Vec<MigrationPath>> {
    session.require_registration()?;
    session.remote.migrations(installed, target)
}

pub fn plan_migrations(session: &Session<'_>, target: Option<&Triplet>) -> Result<MigrationPlan> {
    session.require_registration()?;
    session.packages.refresh_repositories(None, false)?;
    let products = check_system_products(session, true)?;
    let installed = triplet_set(&products);
    let target = target.map(|triplet| {
        let mut product = Product::from(triplet.clone());
        product.is_base = true;
        product
    });

    let paths = product_migrations(session, &products, target.as_ref())?;
    let (mut available, mut unavailable): (Vec<_>, Vec<_>) =
        paths.into_iter().partition(MigrationPath::is_available);
    for path in available.iter_mut().chain(unavailable.iter_mut()) {
        path.sort(&installed);
    }
    debug!(
        available = available.len(),
        unavailable = unavailable.len(),
        "migration paths"
    );

    Ok(MigrationPlan {
        system_products: products,
        installed,
        available,
        unavailable,
    })
}

/// Installs the release package of every system product.
///
/// With `rollback_on_failure`, a missing release package rolls the server
/// back to the installed state and the system products are read again.
pub fn check_system_products(
    session: &Session<'_>,
    rollback_on_failure: bool,
) -> Result<Vec<Product>> {
    let products = system_products(session)?;

    let mut missing = false;
    for product in &products {
        if let Err(err) = session.packages.install_release_package(&product.name) {
            missing = true;
            warn!(
                "Can't install release package for registered product {}: {err}",
                product.name
            );
        }
    }

    if missing && rollback_on_failure {
        info!("Calling rollback to make sure the server is synchronized with the system state.");
        rollback(session)?;
        return system_products(session);
    }
    Ok(products)
}

pub fn migrate_system(session: &Session<'_>, path: &MigrationPath) -> Result<String> {
    session.require_registration()?;
    let installed = session.packages.installed_products()?;

    let mut base_version = String::new();
    for product in path.products() {
        let name = product.display_name();
        info!("Upgrading product {name}");
        let service = session
            .remote
            .upgrade(product)
            .map_err(|err| Error::product_step("Upgrading", name.clone(), err))?;
        session
            .reconcile_service(&service)
            .map_err(|err| Error::product_step("Updating service of", name.clone(), err))?;
        if product.is_base {
            base_version = product.version.clone();
        }
    }

    let migrated = migrated_products(&installed, path.products());
    session.remote.synchronize_products(&migrated)?;
    if !base_version.is_empty() {
        session.packages.set_release_version(&base_version)?;
    }
    Ok(base_version)
}

/// Any failure before the distribution upgrade completes triggers an
/// automatic rollback, except a mid-commit upgrade failure.
pub fn apply_migration(
    session: &Session<'_>,
    path: &MigrationPath,
    options: &MigrationOptions,
) -> std::result::Result<MigrationReport, MigrationFailure> {
    let report = match prepare_migration(session, path, options) {
        Ok(report) => report,
        Err(error) => return Err(roll_back_after(session, error)),
    };

    let release_version = Some(report.base_version.as_str()).filter(|version| !version.is_empty());
    if let Err(error) = session
        .packages
        .dist_upgrade(release_version, &options.dist_upgrade)
    {
        if error.command_exit_code() == Some(DIST_UPGRADE_COMMIT_FAILED) {
            warn!("The migration has failed and the system is most likely in an inconsistent state");
            return Err(MigrationFailure {
                error,
                filesystem_inconsistent: true,
                rollback: None,
            });
        }
        return Err(roll_back_after(session, error));
    }

    if let Err(error) = check_system_products(session, false) {
        return Err(MigrationFailure {
            error,
            filesystem_inconsistent: false,
            rollback: None,
        });
    }

    info!("Migration to {} finished", path_summary(path));
    Ok(report)
}

pub fn migrated_products(installed: &[Product], path: &[Product]) -> Vec<Product> {
    let mut products: Vec<Product> = installed
        .iter()
        .map(|product| {
            path.iter()
                .find(|target| target.name == product.name)
                .unwrap_or(product)
                .clone()
        })
        .collect();
    for target in path {
        if !installed.iter().any(|product| product.name == target.name) {
            products.push(target.clone());
        }
    }
    products
}

fn prepare_migration(
    session: &Session<'_>,
    path: &MigrationPath,
    options: &MigrationOptions,
) -> Result<MigrationReport> {
    let base_version = migrate_system(session, path)?;
    let disabled_repositories = if options.disable_obsolete_repos {
        disable_obsolete_repositories(session, path)?
    } else {
        Vec::new()
    };

    let release_version = Some(base_version.as_str()).filter(|version| !version.is_empty());
    session.packages.refresh_repositories(release_version, true)?;
    Ok(MigrationReport {
        base_version,
        disabled_repositories,
    })
}

fn disable_obsolete_repositories(
    session: &Session<'_>,
    path: &MigrationPath,
) -> Result<Vec<String>> {
    let enabled: Vec<String> = session
        .packages
        .repositories()?
        .into_iter()
        .filter(|repository| repository.enabled)
        .flat_map(|repository| [repository.name, repository.alias])
        .filter(|name| !name.is_empty())
        .collect();

    let mut disabled: Vec<String> = Vec::new();
    for product in path.products() {
        for package in session.packages.find_product_packages(&product.name)? {
            if !enabled.contains(&package.repository) || disabled.contains(&package.repository) {
                continue;
            }
            if compare_editions(&package.edition, &product.version) == Ordering::Less {
                info!("Disabling obsolete repository {}", package.repository);
                session.packages.disable_repository(&package.repository)?;
                disabled.push(package.repository);
            }
        }
    }
    Ok(disabled)
}

fn roll_back_after(session: &Session<'_>, error: Error) -> MigrationFailure {
    warn!("Migration failed: {error}");
    info!("Performing repository rollback ...");
    let outcome = rollback(session);
    match &outcome {
        Ok(()) => info!("Rollback successful"),
        Err(err) => warn!("Rollback failed: {err}"),
    }
    MigrationFailure {
        error,
        filesystem_inconsistent: false,
        rollback: Some(outcome),
    }
}

fn path_summary(path: &MigrationPath) -> String {
    path.base_product()
        .map(Product::display_name)
        .unwrap_or_else(|| "the selected products".to_string())
}
