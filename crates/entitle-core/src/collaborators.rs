use crate::{
    Activation, Credentials, DistUpgradeOptions, Error, InstalledService, LocalRepository,
    MigrationPath, Product, ProductPackage, Result, Service, SystemInfo, SystemLogin,
};

pub trait RemoteService {
    fn announce(&self, regcode: &str, info: &SystemInfo) -> Result<SystemLogin>;

    fn update_system(&self, info: &SystemInfo) -> Result<()>;

    fn activate(&self, product: &Product, regcode: &str, email: Option<&str>) -> Result<Service>;

    fn upgrade(&self, product: &Product) -> Result<Service>;

    fn downgrade(&self, product: &Product) -> Result<Service> {
        self.upgrade(product)
    }

    fn deactivate(&self, product: &Product) -> Result<Service>;

    fn product_tree(&self, product: &Product) -> Result<Product>;

    fn activations(&self) -> Result<Vec<Activation>>;

    fn migrations(
        &self,
        installed: &[Product],
        target: Option<&Product>,
    ) -> Result<Vec<MigrationPath>>;

    fn synchronize_products(&self, products: &[Product]) -> Result<Vec<Product>>;

    fn deregister(&self) -> Result<()>;
}

pub trait PackageManager {
    fn installed_products(&self) -> Result<Vec<Product>>;

    fn base_product(&self) -> Result<Product> {
        self.installed_products()?
            .into_iter()
            .find(|product| product.is_base)
            .ok_or(Error::CannotDetectBaseProduct)
    }

    fn installed_services(&self) -> Result<Vec<InstalledService>>;

    fn add_service(&self, url: &str, name: &str, refresh: bool) -> Result<()>;

    fn remove_service(&self, name: &str) -> Result<()>;

    fn refresh_all_services(&self) -> Result<()>;

    fn install_release_package(&self, identifier: &str) -> Result<()>;

    fn remove_release_package(&self, identifier: &str) -> Result<()>;

    fn set_release_version(&self, version: &str) -> Result<()>;

    fn repositories(&self) -> Result<Vec<LocalRepository>>;

    fn find_product_packages(&self, identifier: &str) -> Result<Vec<ProductPackage>>;

    fn disable_repository(&self, name: &str) -> Result<()>;

    fn refresh_repositories(&self, release_version: Option<&str>, force: bool) -> Result<()>;

    fn dist_upgrade(&self, release_version: Option<&str>, options: &DistUpgradeOptions)
        -> Result<()>;

    fn is_service_plugin(&self, name: &str) -> bool;
}

pub trait CredentialStore {
    fn has_system_credentials(&self) -> bool;

    fn system_credentials(&self) -> Result<Credentials>;

    fn write_system_credentials(&self, credentials: &Credentials) -> Result<()>;

    fn update_system_token(&self, token: &str) -> Result<()>;

    fn remove_system_credentials(&self) -> Result<()>;

    fn write_service_credentials(&self, service: &str) -> Result<()>;

    fn remove_service_credentials(&self, service: &str) -> Result<()>;

    fn add_registry_authentication(&self, credentials: &Credentials) -> Result<()>;

    fn remove_registry_authentication(&self, credentials: &Credentials) -> Result<()>;
}
