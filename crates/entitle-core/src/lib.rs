mod activation;
mod collaborators;
mod config;
mod error;
mod migration;
mod product;
mod string_set;
mod system;
mod tree;

pub use activation::{activation_map, Activation, ActivationMap, Service, DUMMY_SERVICE_NAME};
pub use collaborators::{CredentialStore, PackageManager, RemoteService};
pub use config::{Config, DEFAULT_CONFIG_PATH, DEFAULT_SERVER_URL};
pub use error::{Error, Result};
pub use migration::{compare_editions, sort_migration_products, MigrationPath};
pub use product::{Product, RemoteRepository, Triplet};
pub use string_set::StringSet;
pub use system::{
    Credentials, DistUpgradeOptions, ExtraData, HardwareInfo, InstalledService, LocalRepository,
    ProductPackage, SystemInfo, SystemLogin,
};
pub use tree::{flatten, traverse, MAX_TREE_DEPTH};
