use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::Metric;

/// One enumerated accelerator unit.
///
/// Produced fresh per request; devices are correlated by index only and
/// the index is not guaranteed stable across topology changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuDevice {
    pub name: String,
    /// Memory figures in bytes.
    pub total_memory: Metric<u64>,
    pub free_memory: Metric<u64>,
    pub used_memory: Metric<u64>,
    /// Utilization percent, 0-100.
    pub utilization: Metric<u32>,
}

impl GpuDevice {
    /// The degraded single-device result returned when enumeration fails
    /// partway. All metrics are explicitly unavailable, never zero.
    pub fn cpu_fallback() -> Self {
        Self {
            name: "cpu".to_string(),
            total_memory: Metric::Unavailable,
            free_memory: Metric::Unavailable,
            used_memory: Metric::Unavailable,
            utilization: Metric::Unavailable,
        }
    }
}

/// Per-device digest for frequent polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuSummary {
    pub name: String,
    pub utilization: Metric<u32>,
    /// `round(used / total * 100, 2)` when both figures are available and
    /// total is nonzero; the sentinel otherwise.
    pub memory_used_percent: Metric<f64>,
}

/// CPU identity and load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuSection {
    pub architecture: String,
    pub cpu_percent: f64,
    pub cpu_count: usize,
    /// Average core frequency in MHz; absent on platforms that do not
    /// expose it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_freq_mhz: Option<u64>,
    /// 1/5/15-minute load averages; absent on non-Unix hosts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_avg: Option<[f64; 3]>,
}

/// Virtual memory figures in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VirtualMemory {
    pub total: u64,
    pub available: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
}

/// Swap figures in bytes; zero-filled when no swap is configured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwapMemory {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemorySection {
    pub virtual_memory: VirtualMemory,
    pub swap_memory: SwapMemory,
}

/// Usage of the root filesystem, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiskUsage {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
}

/// One mounted partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    pub device: String,
    pub mount_point: String,
    pub file_system: String,
    pub kind: String,
    pub removable: bool,
    pub total_bytes: u64,
    pub available_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskSection {
    pub disk_usage: DiskUsage,
    pub disk_partitions: Vec<Partition>,
}

/// Aggregate IO counters summed across interfaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkIo {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
    pub errors_in: u64,
    pub errors_out: u64,
}

/// One address bound to an interface. Optional fields are omitted when
/// the address family does not carry them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceAddress {
    /// Address family name (`inet`, `inet6`, `link`).
    pub family: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub netmask: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broadcast: Option<String>,
}

/// Link-level state of one interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceStats {
    pub is_up: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplex: Option<String>,
    /// Link speed in Mbit/s, when the driver reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_mbps: Option<u64>,
    pub mtu: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSection {
    pub network_io: NetworkIo,
    pub network_interfaces: HashMap<String, Vec<InterfaceAddress>>,
    pub network_stats: HashMap<String, InterfaceStats>,
}

/// Installed-package listing and ML-runtime dump, both best-effort.
/// A failed probe fills the matching `*_error` field instead of failing
/// the operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packages: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packages_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_env_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Metric;

    #[test]
    fn cpu_fallback_device_is_all_sentinel() {
        let dev = GpuDevice::cpu_fallback();
        let json = serde_json::to_string(&dev).unwrap();
        assert!(json.contains("\"name\":\"cpu\""));
        assert_eq!(json.matches("\"n/a\"").count(), 4);
    }

    #[test]
    fn gpu_device_roundtrip() {
        let dev = GpuDevice {
            name: "NVIDIA GeForce RTX 4090".into(),
            total_memory: Metric::Value(25_757_220_864),
            free_memory: Metric::Value(24_000_000_000),
            used_memory: Metric::Value(1_757_220_864),
            utilization: Metric::Value(7),
        };
        let json = serde_json::to_string(&dev).unwrap();
        let parsed: GpuDevice = serde_json::from_str(&json).unwrap();
        assert_eq!(dev, parsed);
    }

    #[test]
    fn cpu_section_omits_absent_fields() {
        let cpu = CpuSection {
            architecture: "x86_64".into(),
            cpu_percent: 12.5,
            cpu_count: 16,
            cpu_freq_mhz: None,
            load_avg: None,
        };
        let json = serde_json::to_string(&cpu).unwrap();
        assert!(!json.contains("cpu_freq_mhz"));
        assert!(!json.contains("load_avg"));
    }

    #[test]
    fn environment_info_omits_empty_fields() {
        let env = EnvironmentInfo {
            packages_error: Some("pip not found".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&env).unwrap();
        assert!(json.contains("packages_error"));
        assert!(!json.contains("\"packages\""));
        assert!(!json.contains("runtime_env"));
    }
}
