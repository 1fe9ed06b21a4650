mod command;
mod hwinfo;
mod xml;

use std::fs;
use std::path::{Path, PathBuf};

use entitle_core::{
    Config, DistUpgradeOptions, InstalledService, LocalRepository, PackageManager, Product,
    ProductPackage, Result,
};
use tracing::{debug, info};

pub use command::{CommandOutput, CommandRunner, SystemCommandRunner};
pub use hwinfo::{
    collect_hardware_info, parse_cpuinfo, parse_meminfo, read_uptime_log, UPTIME_LOG_PATH,
};
pub use xml::{parse_products, parse_repositories, parse_search_results, parse_services};

use command::run_checked;

pub const ZYPPER_PATH: &str = "/usr/bin/zypper";
pub const RPM_PATH: &str = "/usr/bin/rpm";
pub const OEM_DIR: &str = "/var/lib/suseRegister/OEM";
pub const SERVICE_PLUGIN_DIR: &str = "/usr/lib/zypp/plugins/services";

pub const ZYPPER_OK: i32 = 0;
pub const ZYPPER_ERR_NO_REPOS: i32 = 6;
pub const ZYPPER_ERR_COMMIT: i32 = 8;
pub const ZYPPER_INFO_REBOOT_NEEDED: i32 = 102;
pub const ZYPPER_INFO_RESTART_NEEDED: i32 = 103;
pub const ZYPPER_INFO_CAP_NOT_FOUND: i32 = 104;
pub const ZYPPER_INFO_REPOS_SKIPPED: i32 = 106;

pub struct Zypper<R = SystemCommandRunner> {
    runner: R,
    fs_root: PathBuf,
    insecure: bool,
    auto_import_repo_keys: bool,
}

impl Zypper<SystemCommandRunner> {
    pub fn new(config: &Config) -> Self {
        Self::with_runner(config, SystemCommandRunner)
    }
}

impl<R: CommandRunner> Zypper<R> {
    pub fn with_runner(config: &Config, runner: R) -> Self {
        Self {
            runner,
            fs_root: config.fs_root.clone(),
            insecure: config.insecure,
            auto_import_repo_keys: config.auto_import_repo_keys,
        }
    }

    pub fn target_os(&self) -> Result<String> {
        let output = self.zypper(args(&["targetos"]), &[ZYPPER_OK])?;
        Ok(String::from_utf8_lossy(&output).trim().to_string())
    }

    pub fn refresh_service(&self, name: &str) -> Result<()> {
        self.zypper(args(&["--non-interactive", "refs", name]), &[ZYPPER_OK])?;
        Ok(())
    }

    fn root_args(&self) -> Vec<String> {
        if self.fs_root.as_os_str().is_empty() || self.fs_root == Path::new("/") {
            return Vec::new();
        }
        vec!["--root".to_string(), self.fs_root.display().to_string()]
    }

    fn zypper(&self, command_args: Vec<String>, valid_exit_codes: &[i32]) -> Result<Vec<u8>> {
        let mut full = self.root_args();
        full.extend(command_args);
        run_checked(&self.runner, ZYPPER_PATH, &full, valid_exit_codes)
    }

    fn root_path(&self, path: &str) -> PathBuf {
        self.fs_root.join(path.trim_start_matches('/'))
    }

    fn oem_release_type(&self, product_line: &str) -> Option<String> {
        if product_line.is_empty() {
            return None;
        }
        let path = self.root_path(OEM_DIR).join(product_line);
        let raw = fs::read_to_string(&path).ok()?;
        let first = raw.lines().next()?.trim();
        if first.is_empty() {
            return None;
        }
        debug!(path = %path.display(), release_type = first, "using OEM release type");
        Some(first.to_string())
    }

    fn release_package_installed(&self, identifier: &str) -> bool {
        let mut rpm_args = self.root_args();
        rpm_args.push("-q".to_string());
        rpm_args.push(format!("{identifier}-release"));
        matches!(
            self.runner.run(RPM_PATH, &rpm_args),
            Ok(output) if output.exit_code == 0
        )
    }

    fn global_flags(&self, release_version: Option<&str>, non_interactive: bool) -> Vec<String> {
        let mut flags = Vec::new();
        if non_interactive {
            flags.push("--non-interactive".to_string());
        }
        if let Some(version) = release_version {
            flags.push("--releasever".to_string());
            flags.push(version.to_string());
        }
        flags
    }
}

impl<R: CommandRunner> PackageManager for Zypper<R> {
    fn installed_products(&self) -> Result<Vec<Product>> {
        let output = self.zypper(
            args(&[
                "--disable-repositories",
                "--xmlout",
                "--non-interactive",
                "products",
                "-i",
            ]),
            &[ZYPPER_OK],
        )?;
        let mut products = parse_products(&output)?;
        for product in &mut products {
            if let Some(release_type) = self.oem_release_type(&product.product_line) {
                product.release_type = release_type;
            }
        }
        Ok(products)
    }

    fn installed_services(&self) -> Result<Vec<InstalledService>> {
        let output = self.zypper(
            args(&["--xmlout", "--non-interactive", "services", "-d"]),
            &[ZYPPER_OK, ZYPPER_ERR_NO_REPOS],
        )?;
        parse_services(&output)
    }

    fn add_service(&self, url: &str, name: &str, refresh: bool) -> Result<()> {
        // A same-named service may have been modified locally.
        self.remove_service(name)?;

        let url = if self.insecure {
            insecure_service_url(url)
        } else {
            url.to_string()
        };
        info!("Adding service {name}");
        self.zypper(
            args(&["--non-interactive", "addservice", "-t", "ris", &url, name]),
            &[ZYPPER_OK],
        )?;
        self.zypper(
            args(&["--non-interactive", "modifyservice", "-r", name]),
            &[ZYPPER_OK],
        )?;
        if refresh {
            self.refresh_service(name)?;
        }
        Ok(())
    }

    fn remove_service(&self, name: &str) -> Result<()> {
        debug!(service = name, "removing service");
        self.zypper(
            args(&["--non-interactive", "removeservice", name]),
            &[ZYPPER_OK],
        )?;
        Ok(())
    }

    fn refresh_all_services(&self) -> Result<()> {
        self.zypper(args(&["--non-interactive", "refs"]), &[ZYPPER_OK])?;
        Ok(())
    }

    fn install_release_package(&self, identifier: &str) -> Result<()> {
        if identifier.is_empty() || self.release_package_installed(identifier) {
            return Ok(());
        }

        let mut valid_exit_codes = vec![ZYPPER_OK];
        // Package Hub repositories may be skipped while still installing.
        if identifier.eq_ignore_ascii_case("PackageHub") {
            valid_exit_codes.push(ZYPPER_INFO_REPOS_SKIPPED);
        }

        let mut command_args = Vec::new();
        if self.auto_import_repo_keys {
            command_args.push("--gpg-auto-import-keys".to_string());
        }
        command_args.extend(args(&[
            "--no-refresh",
            "--non-interactive",
            "install",
            "--no-recommends",
            "--auto-agree-with-product-licenses",
            "-t",
            "product",
            identifier,
        ]));
        info!("Installing release package for {identifier}");
        self.zypper(command_args, &valid_exit_codes)?;
        Ok(())
    }

    fn remove_release_package(&self, identifier: &str) -> Result<()> {
        if identifier.is_empty() {
            return Ok(());
        }
        self.zypper(
            args(&[
                "--no-refresh",
                "--non-interactive",
                "remove",
                "-t",
                "product",
                identifier,
            ]),
            &[ZYPPER_OK, ZYPPER_INFO_CAP_NOT_FOUND],
        )?;
        Ok(())
    }

    fn set_release_version(&self, version: &str) -> Result<()> {
        self.zypper(
            args(&["--non-interactive", "--releasever", version, "ref", "-f"]),
            &[ZYPPER_OK],
        )?;
        Ok(())
    }

    fn repositories(&self) -> Result<Vec<LocalRepository>> {
        let output = self.zypper(
            args(&["--xmlout", "--non-interactive", "repos", "-d"]),
            &[ZYPPER_OK, ZYPPER_ERR_NO_REPOS],
        )?;
        parse_repositories(&output)
    }

    fn find_product_packages(&self, identifier: &str) -> Result<Vec<ProductPackage>> {
        let output = self.zypper(
            args(&[
                "--xmlout",
                "--no-refresh",
                "--non-interactive",
                "search",
                "-s",
                "--match-exact",
                "-t",
                "product",
                identifier,
            ]),
            &[ZYPPER_OK, ZYPPER_ERR_NO_REPOS, ZYPPER_INFO_CAP_NOT_FOUND],
        )?;
        parse_search_results(&output)
    }

    fn disable_repository(&self, name: &str) -> Result<()> {
        self.zypper(
            args(&["--non-interactive", "modifyrepo", "-d", name]),
            &[ZYPPER_OK],
        )?;
        Ok(())
    }

    fn refresh_repositories(&self, release_version: Option<&str>, force: bool) -> Result<()> {
        let mut command_args = self.global_flags(release_version, true);
        if self.auto_import_repo_keys {
            command_args.push("--gpg-auto-import-keys".to_string());
        }
        command_args.push("ref".to_string());
        if force {
            command_args.push("-f".to_string());
        }
        self.zypper(command_args, &[ZYPPER_OK])?;
        Ok(())
    }

    fn dist_upgrade(
        &self,
        release_version: Option<&str>,
        options: &DistUpgradeOptions,
    ) -> Result<()> {
        let mut command_args = self.global_flags(release_version, options.non_interactive);
        command_args.push("--no-refresh".to_string());
        command_args.push("dist-upgrade".to_string());
        if options.auto_agree_with_licenses {
            command_args.push("--auto-agree-with-licenses".to_string());
        }
        // The zypp.conf default is ignored in both directions.
        if options.allow_vendor_change {
            command_args.push("--allow-vendor-change".to_string());
        } else {
            command_args.push("--no-allow-vendor-change".to_string());
        }
        if options.no_recommends {
            command_args.push("--no-recommends".to_string());
        }
        if options.download_only {
            command_args.push("--download-only".to_string());
        }
        if options.dry_run {
            command_args.push("--dry-run".to_string());
        }
        self.zypper(
            command_args,
            &[
                ZYPPER_OK,
                ZYPPER_INFO_REBOOT_NEEDED,
                ZYPPER_INFO_RESTART_NEEDED,
            ],
        )?;
        Ok(())
    }

    fn is_service_plugin(&self, name: &str) -> bool {
        self.root_path(SERVICE_PLUGIN_DIR).join(name).exists()
    }
}

pub fn insecure_service_url(url: &str) -> String {
    if url.contains("ssl_verify=") {
        return url.to_string();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}ssl_verify=no")
}

fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

#[cfg(test)]
mod tests;
