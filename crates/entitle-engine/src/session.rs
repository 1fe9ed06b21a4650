use entitle_core::{
    Config, CredentialStore, Error, PackageManager, Product, RemoteService, Result, Service,
    StringSet, DUMMY_SERVICE_NAME,
};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Clone, Copy)]
pub struct Session<'a> {
    pub config: &'a Config,
    pub remote: &'a dyn RemoteService,
    pub packages: &'a dyn PackageManager,
    pub credentials: &'a dyn CredentialStore,
}

impl<'a> Session<'a> {
    pub fn new(
        config: &'a Config,
        remote: &'a dyn RemoteService,
        packages: &'a dyn PackageManager,
        credentials: &'a dyn CredentialStore,
    ) -> Self {
        Self {
            config,
            remote,
            packages,
            credentials,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.credentials.has_system_credentials()
    }

    pub(crate) fn require_registration(&self) -> Result<()> {
        if self.is_registered() {
            Ok(())
        } else {
            Err(Error::SystemNotRegistered)
        }
    }

    pub(crate) fn add_service(&self, service: &Service) -> Result<()> {
        info!("Adding service {}", service.name);
        // Refreshing the service needs its credentials in place.
        self.credentials.write_service_credentials(&service.name)?;
        self.packages
            .add_service(&service.url, &service.name, !self.config.no_zypper_refs)
    }

    pub(crate) fn remove_service(&self, name: &str) -> Result<()> {
        self.packages.remove_service(name)?;
        self.credentials.remove_service_credentials(name)
    }

    /// The shared dummy service backs every product, so it is refreshed to
    /// drop the deactivated product's repositories instead of being removed.
    pub(crate) fn remove_or_refresh_service(&self, name: &str) -> Result<()> {
        if name == DUMMY_SERVICE_NAME {
            info!("Refreshing services");
            return self.packages.refresh_all_services();
        }
        info!("Removing service {name}");
        self.remove_service(name)
    }

    pub(crate) fn reconcile_service(&self, service: &Service) -> Result<()> {
        self.remove_migration_service(&service.name)?;
        if !service.obsoleted_name.is_empty() {
            info!("Removing service {}", service.obsoleted_name);
            self.remove_migration_service(&service.obsoleted_name)?;
        }

        if self.packages.is_service_plugin(&service.name) {
            debug!(service = %service.name, "service plugin present, not adding");
            return Ok(());
        }
        info!("Adding service {}", service.name);
        self.credentials.write_service_credentials(&service.name)?;
        self.packages.add_service(&service.url, &service.name, true)
    }

    fn remove_migration_service(&self, name: &str) -> Result<()> {
        if self.packages.is_service_plugin(name) {
            debug!(service = name, "service plugin present, not removing");
            return Ok(());
        }
        self.remove_service(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductService {
    pub identifier: String,
    pub version: String,
    pub arch: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub service: ServiceSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceSummary {
    pub id: i64,
    pub name: String,
    pub url: String,
}

impl ProductService {
    pub fn new(product: &Product, service: &Service) -> Self {
        Self {
            identifier: product.name.clone(),
            version: product.version.clone(),
            arch: product.arch.clone(),
            name: product.friendly_name.clone(),
            service: ServiceSummary {
                id: service.id,
                name: service.name.clone(),
                url: service.url.clone(),
            },
        }
    }

    pub fn triplet(&self) -> String {
        format!("{}/{}/{}", self.identifier, self.version, self.arch)
    }
}

pub(crate) fn triplet_set(products: &[Product]) -> StringSet {
    products.iter().map(Product::to_triplet).collect()
}
