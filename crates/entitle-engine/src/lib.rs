mod deregister;
mod migration;
mod register;
mod rollback;
mod session;
mod status;

pub use deregister::{cleanup, deactivate, deregister, DeregisterOutcome, CLOUD_GUEST_REGISTER_PATH};
pub use migration::{
    apply_migration, check_system_products, migrate_system, migrated_products, plan_migrations,
    product_migrations, MigrationFailure, MigrationOptions, MigrationPlan, MigrationReport,
    DIST_UPGRADE_COMMIT_FAILED,
};
pub use register::{activate, register, update_system, RegisterOptions, RegisterOutcome};
pub use rollback::rollback;
pub use session::{ProductService, ServiceSummary, Session};
pub use status::{
    build_statuses, extension_tree, status, statuses, system_products, ExtensionNode,
    ProductStatus, STATUS_NOT_REGISTERED, STATUS_REGISTERED,
};
