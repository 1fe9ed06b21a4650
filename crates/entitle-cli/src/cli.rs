use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use entitle_core::{Triplet, DEFAULT_CONFIG_PATH};

use crate::completion::CliCompletionShell;

#[derive(Parser, Debug)]
#[command(name = "entitle")]
#[command(
    about = "Register the system, activate products and migrate between releases",
    long_about = None
)]
pub(crate) struct Cli {
    /// Configuration file to read.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub(crate) config: PathBuf,
    /// Operate on a system installed below this directory.
    #[arg(long, global = true)]
    pub(crate) root: Option<PathBuf>,
    /// Registration server URL.
    #[arg(long, global = true)]
    pub(crate) url: Option<String>,
    /// Skip TLS certificate verification.
    #[arg(long, global = true)]
    pub(crate) insecure: bool,
    #[arg(long, global = true, conflicts_with = "quiet")]
    pub(crate) debug: bool,
    #[arg(long, global = true)]
    pub(crate) quiet: bool,
    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    pub(crate) json: bool,
    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Register the system and activate the base product with its
    /// recommended extensions.
    Register {
        #[arg(short = 'r', long, default_value = "")]
        regcode: String,
        /// Activate this product instead of the installed base product.
        #[arg(short = 'p', long)]
        product: Option<Triplet>,
        #[arg(short = 'e', long)]
        email: Option<String>,
        /// File with cloud instance data sent along with the registration.
        #[arg(long)]
        instance_data: Option<PathBuf>,
        #[arg(long)]
        namespace: Option<String>,
    },
    /// Deregister the system, or deactivate a single product.
    Deregister {
        #[arg(short = 'p', long)]
        product: Option<Triplet>,
    },
    Activate {
        product: Triplet,
        #[arg(short = 'r', long, default_value = "")]
        regcode: String,
    },
    Deactivate {
        product: Triplet,
    },
    Status,
    ListExtensions,
    /// Send current system information to the server.
    Keepalive,
    /// Remove local credentials and services of the configured server.
    Cleanup,
    /// List the migration paths available for this system.
    Migrations {
        /// Offline migration towards this base product.
        #[arg(long)]
        product: Option<Triplet>,
    },
    Migrate(MigrateArgs),
    /// Resynchronize product activations with the installed products.
    Rollback,
    Completions {
        #[arg(value_enum)]
        shell: CliCompletionShell,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub(crate) struct MigrateArgs {
    /// Number of the migration path to apply, as listed by `migrations`.
    #[arg(long)]
    pub(crate) migration: Option<usize>,
    #[arg(long)]
    pub(crate) non_interactive: bool,
    /// Offline migration towards this base product.
    #[arg(long)]
    pub(crate) product: Option<Triplet>,
    /// Disable repositories that only provide older product editions.
    #[arg(long)]
    pub(crate) disable_repos: bool,
    #[arg(long)]
    pub(crate) auto_agree_with_licenses: bool,
    #[arg(long)]
    pub(crate) allow_vendor_change: bool,
    #[arg(long)]
    pub(crate) download_only: bool,
    #[arg(long)]
    pub(crate) no_recommends: bool,
    #[arg(long)]
    pub(crate) dry_run: bool,
}
