use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use entitle_core::{Config, DistUpgradeOptions, ExtraData, MigrationPath, SystemInfo};
use entitle_engine::{
    activate, apply_migration, cleanup, deactivate, deregister, extension_tree, plan_migrations,
    register, rollback, statuses, update_system, MigrationOptions, MigrationPlan,
    RegisterOptions, Session,
};
use entitle_remote::{FileCredentialStore, SccClient};
use entitle_zypper::{collect_hardware_info, read_uptime_log, Zypper, UPTIME_LOG_PATH};
use serde::Serialize;
use tracing::debug;

use crate::cli::{Cli, Commands, MigrateArgs};
use crate::completion::write_completions_script;
use crate::render::{
    format_deregister_lines, format_extension_lines, format_migration_lines,
    format_migration_report_lines, format_register_lines, format_status_lines, TerminalRenderer,
};

/// Collaborators wired from the effective configuration.
struct Runtime {
    config: Config,
    remote: SccClient<FileCredentialStore>,
    packages: Zypper,
    credentials: FileCredentialStore,
}

impl Runtime {
    fn open(config: Config) -> Result<Self> {
        let credentials = FileCredentialStore::new(config.fs_root.clone());
        let remote = SccClient::new(&config, credentials.clone())
            .with_context(|| format!("failed to set up client for {}", config.base_url()))?;
        let packages = Zypper::new(&config);
        Ok(Self {
            config,
            remote,
            packages,
            credentials,
        })
    }

    fn session(&self) -> Session<'_> {
        Session::new(&self.config, &self.remote, &self.packages, &self.credentials)
    }

    fn system_info(&self, instance_data: Option<&Path>) -> Result<SystemInfo> {
        let hwinfo = collect_hardware_info();
        let distro_target = self
            .packages
            .target_os()
            .context("failed to detect the distribution target")?;
        let instance_data = instance_data
            .map(|path| {
                fs::read_to_string(path)
                    .with_context(|| format!("failed to read instance data: {}", path.display()))
            })
            .transpose()?;
        let online_at = if self.config.enable_system_uptime_tracking {
            let log = read_uptime_log(&self.config.root_path(UPTIME_LOG_PATH))?;
            Some(log).filter(|lines| !lines.is_empty())
        } else {
            None
        };

        Ok(SystemInfo {
            hostname: hwinfo.hostname.clone(),
            distro_target,
            hwinfo,
            extra: ExtraData {
                instance_data,
                namespace: self.config.namespace.clone(),
                online_at,
            },
        })
    }
}

pub(crate) fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(&cli.config)
        .with_context(|| format!("failed to load config: {}", cli.config.display()))?;
    if let Some(url) = &cli.url {
        config.url = url.clone();
    }
    if let Some(root) = &cli.root {
        config.fs_root = root.clone();
    }
    if cli.insecure {
        config.insecure = true;
    }
    if let Commands::Register {
        namespace: Some(namespace),
        ..
    } = &cli.command
    {
        config.namespace = Some(namespace.clone());
    }
    Ok(config)
}

pub(crate) fn run_cli(cli: Cli) -> Result<()> {
    if let Commands::Completions { shell } = &cli.command {
        let stdout = io::stdout();
        let mut writer = stdout.lock();
        return write_completions_script(*shell, &mut writer);
    }

    let config = load_config(&cli)?;
    debug!(url = %config.base_url(), root = %config.fs_root.display(), "effective configuration");
    let runtime = Runtime::open(config)?;
    let session = runtime.session();
    let renderer = TerminalRenderer::current();
    let json = cli.json;
    // A server or namespace chosen at registration sticks for later commands.
    let persist_config = cli.url.is_some()
        || matches!(
            &cli.command,
            Commands::Register {
                namespace: Some(_),
                ..
            }
        );

    match cli.command {
        Commands::Register {
            regcode,
            product,
            email,
            instance_data,
            ..
        } => {
            let info = runtime.system_info(instance_data.as_deref())?;
            let options = RegisterOptions {
                regcode,
                product,
                email,
            };
            let outcome = register(&session, &options, &info)?;
            if persist_config {
                runtime.config.save(&cli.config).with_context(|| {
                    format!("failed to save config: {}", cli.config.display())
                })?;
            }
            if json {
                print_json(&outcome)?;
            } else {
                renderer.print_lines(&format_register_lines(
                    &outcome,
                    runtime.config.base_url(),
                ));
                renderer.print_status("ok", "Successfully registered system");
            }
        }
        Commands::Deregister { product } => {
            let outcome = deregister(&session, product.as_ref())?;
            if json {
                print_json(&outcome)?;
            } else {
                renderer.print_lines(&format_deregister_lines(&outcome));
                let message = match product {
                    Some(product) => format!("Successfully deregistered {product}"),
                    None => "Successfully deregistered system".to_string(),
                };
                renderer.print_status("ok", &message);
            }
        }
        Commands::Activate { product, regcode } => {
            let activated = activate(&session, &product, &regcode, None)?;
            if json {
                print_json(&activated)?;
            } else {
                renderer.print_status("ok", &format!("Activated {}", activated.triplet()));
            }
        }
        Commands::Deactivate { product } => {
            let deactivated = deactivate(&session, &product)?;
            if json {
                print_json(&deactivated)?;
            } else {
                renderer.print_status("ok", &format!("Deactivated {}", deactivated.triplet()));
            }
        }
        Commands::Status => {
            let statuses = statuses(&session)?;
            if json {
                print_json(&statuses)?;
            } else {
                renderer.print_section("Installed Products:");
                renderer.print_lines(&format_status_lines(&statuses));
            }
        }
        Commands::ListExtensions => {
            let tree = extension_tree(&session)?;
            if json {
                print_json(&tree)?;
            } else {
                renderer.print_section("AVAILABLE EXTENSIONS AND MODULES");
                renderer.print_lines(&format_extension_lines(&tree));
            }
        }
        Commands::Keepalive => {
            let info = runtime.system_info(None)?;
            update_system(&session, &info)?;
            renderer.print_status("ok", "Successfully updated system information");
        }
        Commands::Cleanup => {
            cleanup(&session)?;
            renderer.print_status("ok", "Successfully removed system credentials and services");
        }
        Commands::Migrations { product } => {
            let plan = plan_migrations(&session, product.as_ref())?;
            if json {
                print_json(&plan_summary(&plan))?;
            } else {
                renderer.print_section("Available migrations:");
                renderer.print_lines(&format_migration_lines(&plan));
            }
        }
        Commands::Migrate(args) => run_migrate(&runtime, &session, renderer, &args)?,
        Commands::Rollback => {
            let spinner = renderer.start_spinner("rollback");
            let result = rollback(&session);
            spinner.finish();
            result?;
            renderer.print_status("ok", "Rollback successful");
        }
        Commands::Completions { .. } => unreachable!("handled before loading the configuration"),
    }

    Ok(())
}

fn run_migrate(
    runtime: &Runtime,
    session: &Session<'_>,
    renderer: TerminalRenderer,
    args: &MigrateArgs,
) -> Result<()> {
    let plan = plan_migrations(session, args.product.as_ref())?;
    if plan.available.is_empty() {
        renderer.print_lines(&format_migration_lines(&plan));
        return Ok(());
    }

    let index = match args.migration {
        Some(number) => selected_migration(number, plan.available.len())?,
        None if args.non_interactive => 0,
        None => {
            renderer.print_section("Available migrations:");
            renderer.print_lines(&format_migration_lines(&plan));
            match prompt_migration(plan.available.len())? {
                Some(index) => index,
                None => return Ok(()),
            }
        }
    };
    let path: &MigrationPath = &plan.available[index];

    let options = MigrationOptions {
        disable_obsolete_repos: args.disable_repos,
        dist_upgrade: DistUpgradeOptions {
            // zypper output is captured, it must never prompt.
            non_interactive: true,
            auto_agree_with_licenses: args.auto_agree_with_licenses
                || runtime.config.auto_agree_with_licenses,
            allow_vendor_change: args.allow_vendor_change,
            download_only: args.download_only,
            no_recommends: args.no_recommends,
            dry_run: args.dry_run,
        },
    };

    let spinner = renderer.start_spinner("migrate");
    let result = apply_migration(session, path, &options);
    spinner.finish();

    match result {
        Ok(report) => {
            renderer.print_lines(&format_migration_report_lines(&report));
            renderer.print_status("ok", "Migration finished");
            Ok(())
        }
        Err(failure) => {
            match &failure.rollback {
                Some(Ok(())) => renderer.print_status("info", "Rollback successful"),
                Some(Err(err)) => renderer.print_status("warn", &format!("Rollback failed: {err}")),
                None => {}
            }
            Err(failure.into())
        }
    }
}

/// Converts a 1-based migration number into an index.
pub(crate) fn selected_migration(number: usize, available: usize) -> Result<usize> {
    if number == 0 || number > available {
        bail!("invalid migration {number}, choose a number between 1 and {available}");
    }
    Ok(number - 1)
}

fn prompt_migration(available: usize) -> Result<Option<usize>> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    loop {
        print!("[num/q]: ");
        io::stdout().flush().context("failed to flush prompt")?;

        let mut answer = String::new();
        let read = input
            .read_line(&mut answer)
            .context("failed to read migration choice")?;
        if read == 0 {
            return Err(anyhow!("no migration selected"));
        }
        match parse_migration_answer(&answer, available) {
            MigrationAnswer::Quit => return Ok(None),
            MigrationAnswer::Selected(index) => return Ok(Some(index)),
            MigrationAnswer::Invalid => {
                println!("Enter a number between 1 and {available}, or q to quit.")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MigrationAnswer {
    Quit,
    Selected(usize),
    Invalid,
}

pub(crate) fn parse_migration_answer(answer: &str, available: usize) -> MigrationAnswer {
    let answer = answer.trim();
    if answer.eq_ignore_ascii_case("q") {
        return MigrationAnswer::Quit;
    }
    match answer.parse::<usize>() {
        Ok(number) => selected_migration(number, available)
            .map(MigrationAnswer::Selected)
            .unwrap_or(MigrationAnswer::Invalid),
        Err(_) => MigrationAnswer::Invalid,
    }
}

#[derive(Debug, Serialize)]
struct PlanSummary<'a> {
    available: &'a [MigrationPath],
    unavailable: &'a [MigrationPath],
}

fn plan_summary(plan: &MigrationPlan) -> PlanSummary<'_> {
    PlanSummary {
        available: &plan.available,
        unavailable: &plan.unavailable,
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let rendered =
        serde_json::to_string_pretty(value).context("failed to serialize JSON output")?;
    println!("{rendered}");
    Ok(())
}
