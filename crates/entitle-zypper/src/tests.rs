use super::*;

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use entitle_core::{Config, DistUpgradeOptions, Error, PackageManager};

use crate::command::command_line;

const PRODUCTS_XML: &str = r#"<?xml version='1.0'?>
<stream>
<message type="info">Loading repository data...</message>
<product-list>
<product name="SLES" version="15.3" release="0" epoch="0" arch="x86_64" vendor="SUSE" summary="SUSE Linux Enterprise Server 15 SP3" repo="@System" productline="sles" registerrelease="" shortname="SLES15-SP3" flavor="" isbase="true" installed="true"><endoflife time_t="1703980800" text="2023-12-31T01:00:00+01"/><registerflavor/><description>SUSE Linux Enterprise offers a comprehensive suite of products.</description></product>
<product name="sle-module-basesystem" version="15.3" release="0" epoch="0" arch="x86_64" vendor="SUSE" summary="Basesystem Module" repo="@System" productline="" registerrelease="" shortname="Basesystem-Module" flavor="" isbase="false" installed="true"><endoflife time_t="0" text="1970-01-01T01:00:00+01"/><registerflavor>extension</registerflavor><description>Basesystem module</description></product>
</product-list>
</stream>"#;

const SERVICES_XML: &str = r#"<?xml version='1.0'?>
<stream>
<service-list>
<service alias="SUSE_Linux_Enterprise_Server_15_SP3_x86_64" name="SUSE_Linux_Enterprise_Server_15_SP3_x86_64" type="ris" enabled="1" autorefresh="1" url="https://scc.suse.com/access/services/2219?cookies=0&amp;credentials=SUSE_Linux_Enterprise_Server_15_SP3_x86_64">
<repo alias="SLE-Module-Basesystem15-SP3-Pool" name="SLE-Module-Basesystem15-SP3-Pool" priority="99" enabled="1" autorefresh="0" gpgcheck="1" repo_gpgcheck="1" pkg_gpgcheck="0"><url>https://updates.suse.com/SUSE/Products/SLE-Module-Basesystem/15-SP3/x86_64/product/</url></repo>
</service>
<service alias="local" name="local" type="plugin" enabled="1" autorefresh="1" url="file:/usr/lib/zypp/plugins/services/local"/>
</service-list>
</stream>"#;

const REPOS_XML: &str = r#"<?xml version='1.0'?>
<stream>
<repo-list>
<repo alias="SLE-Product-SLES15-SP2-Pool" name="SLE-Product-SLES15-SP2-Pool" type="rpm-md" priority="99" enabled="1" autorefresh="0" gpgcheck="1" repo_gpgcheck="1" pkg_gpgcheck="0" raw_gpgcheck="1" gpgkey="https://updates.suse.com/SUSE/Products/SLE-Product-SLES/15-SP2/x86_64/product/repodata/repomd.xml.key" service="SUSE_Linux_Enterprise_Server_15_SP2_x86_64">
<url>https://updates.suse.com/SUSE/Products/SLE-Product-SLES/15-SP2/x86_64/product/</url>
</repo>
<repo alias="SLE-Product-SLES15-SP2-Debuginfo" name="SLE-Product-SLES15-SP2-Debuginfo" type="rpm-md" priority="90" enabled="0" autorefresh="0" gpgcheck="1">
<url>https://updates.suse.com/SUSE/Products/SLE-Product-SLES/15-SP2/x86_64/product_debug/</url>
</repo>
</repo-list>
</stream>"#;

const SEARCH_XML: &str = r#"<?xml version='1.0'?>
<stream>
<search-result version="0.0">
<solvable-list>
<solvable status="installed" name="SLES" summary="SUSE Linux Enterprise Server 15 SP2" kind="product" edition="15.2-0" arch="x86_64" repository="SLE-Product-SLES15-SP2-Pool"/>
<solvable status="not-installed" name="SLES" summary="SUSE Linux Enterprise Server 15 SP3" kind="product" edition="15.3-0" arch="x86_64" repository="SLE-Product-SLES15-SP3-Pool"/>
</solvable-list>
</search-result>
</stream>"#;

static TEST_ROOT_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_root() -> PathBuf {
    let counter = TEST_ROOT_COUNTER.fetch_add(1, Ordering::SeqCst);
    let path = std::env::temp_dir().join(format!(
        "entitle-zypper-tests-{}-{}",
        std::process::id(),
        counter
    ));
    let _ = fs::remove_dir_all(&path);
    path
}

fn root_config() -> Config {
    Config {
        fs_root: PathBuf::from("/"),
        ..Config::default()
    }
}

fn fake_runner<F>(runner: F) -> F
where
    F: Fn(&str, &[String]) -> entitle_core::Result<CommandOutput>,
{
    runner
}

#[test]
fn parse_products_reads_attributes() {
    let products = parse_products(PRODUCTS_XML.as_bytes()).expect("must parse");
    assert_eq!(products.len(), 2);
    assert_eq!(products[0].to_triplet(), "SLES/15.3/x86_64");
    assert!(products[0].is_base);
    assert_eq!(products[0].release, "0");
    assert_eq!(products[0].product_line, "sles");
    assert_eq!(products[0].edition(), "15.3-0");
    assert_eq!(
        products[0].description,
        "SUSE Linux Enterprise offers a comprehensive suite of products."
    );
    assert!(!products[1].is_base);
    assert_eq!(products[1].summary, "Basesystem Module");
}

#[test]
fn parse_services_reads_name_and_url() {
    let services = parse_services(SERVICES_XML.as_bytes()).expect("must parse");
    assert_eq!(services.len(), 2);
    assert_eq!(services[0].name, "SUSE_Linux_Enterprise_Server_15_SP3_x86_64");
    assert_eq!(
        services[0].url,
        "https://scc.suse.com/access/services/2219?cookies=0&credentials=SUSE_Linux_Enterprise_Server_15_SP3_x86_64"
    );
    assert_eq!(services[1].name, "local");
}

#[test]
fn parse_repositories_reads_enabled_flag_and_url() {
    let repos = parse_repositories(REPOS_XML.as_bytes()).expect("must parse");
    assert_eq!(repos.len(), 2);
    assert!(repos[0].enabled);
    assert!(!repos[1].enabled);
    assert_eq!(repos[1].priority, 90);
    assert_eq!(
        repos[0].url,
        "https://updates.suse.com/SUSE/Products/SLE-Product-SLES/15-SP2/x86_64/product/"
    );
}

#[test]
fn parse_search_results_reads_solvables() {
    let packages = parse_search_results(SEARCH_XML.as_bytes()).expect("must parse");
    assert_eq!(packages.len(), 2);
    assert_eq!(packages[0].edition, "15.2-0");
    assert_eq!(packages[1].repository, "SLE-Product-SLES15-SP3-Pool");
}

#[test]
fn parse_empty_output_yields_nothing() {
    assert!(parse_services(b"").expect("must parse").is_empty());
    assert!(parse_products(b"<stream></stream>")
        .expect("must parse")
        .is_empty());
}

#[test]
fn parse_rejects_broken_xml() {
    let err = parse_products(b"<stream><product-list><product name=").expect_err("must fail");
    assert!(matches!(err, Error::Xml(_)));
}

#[test]
fn installed_products_applies_root_and_oem_release_type() {
    let root = test_root();
    let oem_dir = root.join("var/lib/suseRegister/OEM");
    fs::create_dir_all(&oem_dir).expect("must create dir");
    fs::write(oem_dir.join("sles"), "OEM-Partner\nignored\n").expect("must write");

    let calls = RefCell::new(Vec::new());
    let runner = fake_runner(|program, args| {
        calls.borrow_mut().push(command_line(program, args));
        Ok(CommandOutput::success(PRODUCTS_XML))
    });
    let config = Config {
        fs_root: root.clone(),
        ..Config::default()
    };
    let zypper = Zypper::with_runner(&config, runner);

    let products = zypper.installed_products().expect("must list products");
    assert_eq!(products[0].release_type, "OEM-Partner");
    assert_eq!(products[1].release_type, "");
    assert_eq!(
        calls.borrow().as_slice(),
        [format!(
            "/usr/bin/zypper --root {} --disable-repositories --xmlout --non-interactive products -i",
            root.display()
        )]
    );

    let base = zypper.base_product().expect("must find base");
    assert_eq!(base.name, "SLES");

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn base_product_missing_is_reported() {
    let runner = fake_runner(|_, _| {
        Ok(CommandOutput::success(
            r#"<stream><product-list><product name="sle-module-basesystem" version="15.3" arch="x86_64" isbase="false"/></product-list></stream>"#,
        ))
    });
    let zypper = Zypper::with_runner(&root_config(), runner);
    let err = zypper.base_product().expect_err("must fail");
    assert!(matches!(err, Error::CannotDetectBaseProduct));
}

#[test]
fn add_service_replaces_existing_and_marks_insecure() {
    let calls = RefCell::new(Vec::new());
    let runner = fake_runner(|program, args| {
        calls.borrow_mut().push(command_line(program, args));
        Ok(CommandOutput::success(""))
    });
    let config = Config {
        insecure: true,
        ..root_config()
    };
    let zypper = Zypper::with_runner(&config, runner);

    zypper
        .add_service("https://smt.example.test/services/5", "SMT-http_smt_example_test", true)
        .expect("must add service");

    assert_eq!(
        calls.borrow().as_slice(),
        [
            "/usr/bin/zypper --non-interactive removeservice SMT-http_smt_example_test",
            "/usr/bin/zypper --non-interactive addservice -t ris https://smt.example.test/services/5?ssl_verify=no SMT-http_smt_example_test",
            "/usr/bin/zypper --non-interactive modifyservice -r SMT-http_smt_example_test",
            "/usr/bin/zypper --non-interactive refs SMT-http_smt_example_test",
        ]
    );
}

#[test]
fn add_service_without_refresh_skips_refs() {
    let calls = RefCell::new(Vec::new());
    let runner = fake_runner(|program, args| {
        calls.borrow_mut().push(command_line(program, args));
        Ok(CommandOutput::success(""))
    });
    let zypper = Zypper::with_runner(&root_config(), runner);

    zypper
        .add_service("https://scc.suse.com/access/services/1", "SLES", false)
        .expect("must add service");
    assert_eq!(calls.borrow().len(), 3);
    assert!(calls.borrow().iter().all(|call| !call.ends_with("refs SLES")));
}

#[test]
fn install_release_package_skips_installed_release() {
    let calls = RefCell::new(Vec::new());
    let runner = fake_runner(|program, args| {
        calls.borrow_mut().push(command_line(program, args));
        Ok(CommandOutput::success("sle-module-basesystem-release-15.3-1.x86_64"))
    });
    let zypper = Zypper::with_runner(&root_config(), runner);

    zypper
        .install_release_package("sle-module-basesystem")
        .expect("must succeed");
    assert_eq!(
        calls.borrow().as_slice(),
        ["/usr/bin/rpm -q sle-module-basesystem-release"]
    );
}

#[test]
fn install_release_package_runs_zypper_when_missing() {
    let calls = RefCell::new(Vec::new());
    let runner = fake_runner(|program, args| {
        calls.borrow_mut().push(command_line(program, args));
        if program == RPM_PATH {
            return Ok(CommandOutput::exit(1));
        }
        Ok(CommandOutput::success(""))
    });
    let config = Config {
        auto_import_repo_keys: true,
        ..root_config()
    };
    let zypper = Zypper::with_runner(&config, runner);

    zypper
        .install_release_package("sle-module-live-patching")
        .expect("must install");
    assert_eq!(
        calls.borrow()[1],
        "/usr/bin/zypper --gpg-auto-import-keys --no-refresh --non-interactive install --no-recommends --auto-agree-with-product-licenses -t product sle-module-live-patching"
    );
}

#[test]
fn install_release_package_tolerates_skipped_repos_for_package_hub() {
    let runner = fake_runner(|program, _| {
        if program == RPM_PATH {
            return Ok(CommandOutput::exit(1));
        }
        Ok(CommandOutput::exit(ZYPPER_INFO_REPOS_SKIPPED))
    });
    let zypper = Zypper::with_runner(&root_config(), runner);

    zypper
        .install_release_package("PackageHub")
        .expect("must tolerate skipped repos");
    let err = zypper
        .install_release_package("sle-module-legacy")
        .expect_err("must fail for other products");
    assert_eq!(err.command_exit_code(), Some(ZYPPER_INFO_REPOS_SKIPPED));
}

#[test]
fn remove_release_package_tolerates_missing_capability() {
    let runner = fake_runner(|_, _| Ok(CommandOutput::exit(ZYPPER_INFO_CAP_NOT_FOUND)));
    let zypper = Zypper::with_runner(&root_config(), runner);
    zypper
        .remove_release_package("sle-module-legacy")
        .expect("must tolerate 104");
}

#[test]
fn installed_services_tolerates_missing_repositories() {
    let runner = fake_runner(|_, _| Ok(CommandOutput::exit(ZYPPER_ERR_NO_REPOS)));
    let zypper = Zypper::with_runner(&root_config(), runner);
    let services = zypper.installed_services().expect("must tolerate 6");
    assert!(services.is_empty());
}

#[test]
fn set_release_version_forces_refresh() {
    let calls = RefCell::new(Vec::new());
    let runner = fake_runner(|program, args| {
        calls.borrow_mut().push(command_line(program, args));
        Ok(CommandOutput::success(""))
    });
    let zypper = Zypper::with_runner(&root_config(), runner);

    zypper.set_release_version("15.4").expect("must run");
    assert_eq!(
        calls.borrow().as_slice(),
        ["/usr/bin/zypper --non-interactive --releasever 15.4 ref -f"]
    );
}

#[test]
fn dist_upgrade_failure_reports_command_and_output() {
    let calls = RefCell::new(Vec::new());
    let runner = fake_runner(|program, args| {
        calls.borrow_mut().push(command_line(program, args));
        Ok(CommandOutput {
            exit_code: ZYPPER_ERR_COMMIT,
            stdout: b"Installation has completed with error.".to_vec(),
            stderr: Vec::new(),
        })
    });
    let zypper = Zypper::with_runner(&root_config(), runner);
    let options = DistUpgradeOptions {
        non_interactive: true,
        auto_agree_with_licenses: true,
        ..DistUpgradeOptions::default()
    };

    let err = zypper
        .dist_upgrade(Some("15.4"), &options)
        .expect_err("must fail");
    assert_eq!(err.command_exit_code(), Some(ZYPPER_ERR_COMMIT));
    assert_eq!(
        err.to_string(),
        "command '/usr/bin/zypper --non-interactive --releasever 15.4 --no-refresh dist-upgrade --auto-agree-with-licenses --no-allow-vendor-change' failed\nError: returned 8 with 'Installation has completed with error.'"
    );
}

#[test]
fn dist_upgrade_pins_vendor_change_explicitly() {
    let calls = RefCell::new(Vec::new());
    let runner = fake_runner(|program, args| {
        calls.borrow_mut().push(command_line(program, args));
        Ok(CommandOutput::success(""))
    });
    let zypper = Zypper::with_runner(&root_config(), runner);
    let allowed = DistUpgradeOptions {
        allow_vendor_change: true,
        dry_run: true,
        ..DistUpgradeOptions::default()
    };

    zypper
        .dist_upgrade(None, &DistUpgradeOptions::default())
        .expect("must upgrade");
    zypper.dist_upgrade(None, &allowed).expect("must upgrade");

    assert_eq!(
        calls.borrow().as_slice(),
        [
            "/usr/bin/zypper --no-refresh dist-upgrade --no-allow-vendor-change",
            "/usr/bin/zypper --no-refresh dist-upgrade --allow-vendor-change --dry-run",
        ]
    );
}

#[test]
fn dist_upgrade_accepts_reboot_needed() {
    let runner = fake_runner(|_, _| Ok(CommandOutput::exit(ZYPPER_INFO_REBOOT_NEEDED)));
    let zypper = Zypper::with_runner(&root_config(), runner);
    zypper
        .dist_upgrade(None, &DistUpgradeOptions::default())
        .expect("must accept 102");
}

#[test]
fn refresh_repositories_with_release_version() {
    let calls = RefCell::new(Vec::new());
    let runner = fake_runner(|program, args| {
        calls.borrow_mut().push(command_line(program, args));
        Ok(CommandOutput::success(""))
    });
    let zypper = Zypper::with_runner(&root_config(), runner);
    zypper
        .refresh_repositories(Some("15.4"), true)
        .expect("must refresh");
    assert_eq!(
        calls.borrow().as_slice(),
        ["/usr/bin/zypper --non-interactive --releasever 15.4 ref -f"]
    );
}

#[test]
fn find_product_packages_and_disable_repository() {
    let calls = RefCell::new(Vec::new());
    let runner = fake_runner(|program, args| {
        calls.borrow_mut().push(command_line(program, args));
        if args.iter().any(|arg| arg == "search") {
            return Ok(CommandOutput::success(SEARCH_XML));
        }
        Ok(CommandOutput::success(""))
    });
    let zypper = Zypper::with_runner(&root_config(), runner);

    let packages = zypper.find_product_packages("SLES").expect("must search");
    assert_eq!(packages.len(), 2);
    zypper
        .disable_repository("SLE-Product-SLES15-SP2-Pool")
        .expect("must disable");

    assert_eq!(
        calls.borrow().as_slice(),
        [
            "/usr/bin/zypper --xmlout --no-refresh --non-interactive search -s --match-exact -t product SLES",
            "/usr/bin/zypper --non-interactive modifyrepo -d SLE-Product-SLES15-SP2-Pool",
        ]
    );
}

#[test]
fn target_os_trims_output() {
    let runner = fake_runner(|_, _| Ok(CommandOutput::success("sle-15-x86_64\n")));
    let zypper = Zypper::with_runner(&root_config(), runner);
    assert_eq!(zypper.target_os().expect("must run"), "sle-15-x86_64");
}

#[test]
fn service_plugins_are_detected_under_root() {
    let root = test_root();
    let plugin_dir = root.join("usr/lib/zypp/plugins/services");
    fs::create_dir_all(&plugin_dir).expect("must create dir");
    fs::write(plugin_dir.join("cloud-update"), "#!/bin/sh\n").expect("must write");

    let config = Config {
        fs_root: root.clone(),
        ..Config::default()
    };
    let zypper = Zypper::with_runner(&config, fake_runner(|_, _| Ok(CommandOutput::default())));
    assert!(zypper.is_service_plugin("cloud-update"));
    assert!(!zypper.is_service_plugin("SLES"));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn insecure_service_url_appends_parameter() {
    assert_eq!(
        insecure_service_url("https://rmt.test/services/1"),
        "https://rmt.test/services/1?ssl_verify=no"
    );
    assert_eq!(
        insecure_service_url("https://rmt.test/services/1?cookies=0"),
        "https://rmt.test/services/1?cookies=0&ssl_verify=no"
    );
    assert_eq!(
        insecure_service_url("https://rmt.test/services/1?ssl_verify=no"),
        "https://rmt.test/services/1?ssl_verify=no"
    );
}

#[test]
fn parse_cpuinfo_counts_processors_and_sockets() {
    let raw = "processor\t: 0\nphysical id\t: 0\n\nprocessor\t: 1\nphysical id\t: 0\n\nprocessor\t: 2\nphysical id\t: 1\n";
    assert_eq!(parse_cpuinfo(raw), (3, 2));
    assert_eq!(parse_cpuinfo("processor\t: 0\n"), (1, 1));
    assert_eq!(parse_cpuinfo(""), (0, 0));
}

#[test]
fn parse_meminfo_reports_mebibytes() {
    let raw = "MemTotal:        8049136 kB\nMemFree:         1048576 kB\n";
    assert_eq!(parse_meminfo(raw), Some(7860));
    assert_eq!(parse_meminfo("MemFree: 1 kB\n"), None);
}

#[test]
fn read_uptime_log_skips_blank_lines_and_missing_file() {
    let root = test_root();
    fs::create_dir_all(&root).expect("must create dir");
    let path = root.join("suse-uptime.log");
    assert!(read_uptime_log(&path).expect("missing is fine").is_empty());

    fs::write(&path, "2024-01-18:000000000000001000110000\n\n2024-01-19:000000000000000000000000\n")
        .expect("must write");
    assert_eq!(
        read_uptime_log(&path).expect("must read"),
        vec![
            "2024-01-18:000000000000001000110000",
            "2024-01-19:000000000000000000000000",
        ]
    );

    let _ = fs::remove_dir_all(&root);
}
