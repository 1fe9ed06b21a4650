use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use entitle_core::{Error, HardwareInfo, Result};
use tracing::debug;

pub const UPTIME_LOG_PATH: &str = "/etc/zypp/suse-uptime.log";

const HOSTNAME_PATH: &str = "/proc/sys/kernel/hostname";
const CPUINFO_PATH: &str = "/proc/cpuinfo";
const MEMINFO_PATH: &str = "/proc/meminfo";
const PRODUCT_UUID_PATH: &str = "/sys/class/dmi/id/product_uuid";
const HYPERVISOR_TYPE_PATH: &str = "/sys/hypervisor/type";

pub fn collect_hardware_info() -> HardwareInfo {
    let hostname = read_trimmed(Path::new(HOSTNAME_PATH)).unwrap_or_default();
    let (cpus, sockets) = fs::read_to_string(CPUINFO_PATH)
        .map(|raw| parse_cpuinfo(&raw))
        .unwrap_or((0, 0));
    let mem_total = fs::read_to_string(MEMINFO_PATH)
        .ok()
        .and_then(|raw| parse_meminfo(&raw));

    HardwareInfo {
        hostname,
        cpus,
        sockets,
        hypervisor: read_trimmed(Path::new(HYPERVISOR_TYPE_PATH)),
        arch: std::env::consts::ARCH.to_string(),
        uuid: read_trimmed(Path::new(PRODUCT_UUID_PATH)),
        cloud_provider: None,
        mem_total,
    }
}

pub fn parse_cpuinfo(raw: &str) -> (u32, u32) {
    let mut cpus = 0;
    let mut sockets = BTreeSet::new();
    for line in raw.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key.trim() {
            "processor" => cpus += 1,
            "physical id" => {
                sockets.insert(value.trim().to_string());
            }
            _ => {}
        }
    }
    let sockets = if sockets.is_empty() && cpus > 0 {
        1
    } else {
        sockets.len() as u32
    };
    (cpus, sockets)
}

pub fn parse_meminfo(raw: &str) -> Option<u64> {
    raw.lines().find_map(|line| {
        let value = line.strip_prefix("MemTotal:")?;
        let kib: u64 = value.trim().trim_end_matches("kB").trim().parse().ok()?;
        Some(kib / 1024)
    })
}

pub fn read_uptime_log(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        debug!(path = %path.display(), "no uptime log");
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(path)
        .map_err(|err| Error::io(format!("failed to read uptime log: {}", path.display()), err))?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

fn read_trimmed(path: &Path) -> Option<String> {
    let value = fs::read_to_string(path).ok()?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
