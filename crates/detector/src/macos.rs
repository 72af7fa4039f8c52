//! macOS-specific probes.
//!
//! APFS containers share space between volumes, so the per-volume free
//! figure from the statfs-based reader overstates real usage headroom.
//! The disk override re-derives usage from `diskutil`'s container-wide
//! "Capacity In Use By Volumes" figure. Extended power and thermal
//! metrics come from the `macmon` CLI when it is installed. Everything
//! here is best-effort: probes answer `None` or a reason, never an
//! error that escapes.

use std::time::Duration;

use borealis_protocol::DiskUsage;

use crate::accel::Capability;
use crate::round2;

#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Whether the host has an Apple unified-memory GPU.
#[cfg(target_os = "macos")]
pub fn apple_gpu_capability() -> Capability {
    let output = std::process::Command::new("sysctl")
        .args(["-n", "machdep.cpu.brand_string"])
        .output();
    match output {
        Ok(out) if out.status.success() => {
            let brand = String::from_utf8_lossy(&out.stdout);
            if is_apple_brand(&brand) {
                Capability::Available
            } else {
                Capability::Unavailable(format!("not an Apple SoC: {}", brand.trim()))
            }
        }
        Ok(out) => Capability::Unavailable(format!(
            "sysctl exited with {}",
            out.status.code().unwrap_or(-1)
        )),
        Err(e) => Capability::Unavailable(format!("sysctl failed: {e}")),
    }
}

#[cfg(not(target_os = "macos"))]
pub fn apple_gpu_capability() -> Capability {
    Capability::Unavailable("Apple GPU support requires macOS".to_string())
}

#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn is_apple_brand(brand: &str) -> bool {
    brand.contains("Apple")
}

/// Container-accurate root disk usage, recomputed from `diskutil`.
#[cfg(target_os = "macos")]
pub async fn corrected_disk_usage(total: u64) -> Option<DiskUsage> {
    let output = crate::command::run("diskutil", &["apfs", "list"], PROBE_TIMEOUT)
        .await
        .ok()?;
    let used = parse_capacity_in_use(&output)?;
    Some(recompute_disk_usage(total, used))
}

/// Rebuilds the usage figures around a corrected used-bytes count.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn recompute_disk_usage(total: u64, used: u64) -> DiskUsage {
    let used = used.min(total);
    let percent = if total == 0 {
        0.0
    } else {
        round2(used as f64 / total as f64 * 100.0)
    };
    DiskUsage {
        total,
        used,
        free: total - used,
        percent,
    }
}

/// Extracts the used-bytes figure from `diskutil apfs list` output.
///
/// The line of interest reads like
/// `Capacity In Use By Volumes:   299963174912 B (60.0% used)`.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn parse_capacity_in_use(output: &str) -> Option<u64> {
    output.lines().find_map(|line| {
        let (label, rest) = line.split_once(':')?;
        if !label.trim().eq_ignore_ascii_case("Capacity In Use By Volumes") {
            return None;
        }
        rest.split_whitespace().next()?.parse().ok()
    })
}

/// Power, thermal, and per-cluster usage snapshot from `macmon`.
#[cfg(target_os = "macos")]
pub async fn extended_metrics() -> Option<serde_json::Value> {
    let output = crate::command::run("macmon", &["pipe", "-s", "1"], PROBE_TIMEOUT)
        .await
        .ok()?;
    let first_sample = output.lines().next()?;
    serde_json::from_str(first_sample).ok()
}

#[cfg(not(target_os = "macos"))]
pub async fn extended_metrics() -> Option<serde_json::Value> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apple_brand_detection() {
        assert!(is_apple_brand("Apple M3 Max"));
        assert!(!is_apple_brand("Intel(R) Core(TM) i9-9980HK CPU @ 2.40GHz"));
    }

    #[test]
    fn parse_capacity_line() {
        let output = "\
APFS Container (1 found)
|
+-- Container disk3
    Capacity Ceiling (Size):   1000000000000 B (1.0 TB)
    Capacity In Use By Volumes:   299963174912 B (30.0% used)
    Capacity Not Allocated:   700036825088 B (70.0% free)";
        assert_eq!(parse_capacity_in_use(output), Some(299_963_174_912));
    }

    #[test]
    fn parse_capacity_missing_line_is_none() {
        assert_eq!(parse_capacity_in_use("no relevant output"), None);
    }

    #[test]
    fn recompute_usage_from_corrected_used_bytes() {
        let usage = recompute_disk_usage(1_000_000, 300_000);
        assert_eq!(usage.total, 1_000_000);
        assert_eq!(usage.used, 300_000);
        assert_eq!(usage.free, 700_000);
        assert_eq!(usage.percent, 30.0);
    }

    #[test]
    fn recompute_usage_clamps_used_to_total() {
        let usage = recompute_disk_usage(100, 150);
        assert_eq!(usage.used, 100);
        assert_eq!(usage.free, 0);
        assert_eq!(usage.percent, 100.0);
    }
}
