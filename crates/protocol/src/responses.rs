//! Response envelopes, one per detection operation.
//!
//! Each envelope pairs one section of the data model with a monotonic
//! `detection_timestamp` (seconds since service start, not wall-clock) so
//! pollers can order and age samples without trusting host clocks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::platform::{AcceleratorState, PlatformInfo};
use crate::telemetry::{
    CpuSection, DiskSection, DiskUsage, EnvironmentInfo, GpuDevice, GpuSummary, MemorySection,
    NetworkSection, VirtualMemory,
};

/// Full aggregate: platform + accelerator identity unioned with the
/// fresh host and GPU reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteDetection {
    pub api_name: String,
    pub version: String,
    #[serde(flatten)]
    pub platform: PlatformInfo,
    #[serde(flatten)]
    pub accelerator: AcceleratorState,
    pub cpu_percent: f64,
    pub cpu_count: usize,
    pub memory: VirtualMemory,
    pub disk: DiskUsage,
    pub gpu: Vec<GpuDevice>,
    pub gpu_memory: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_metrics: Option<serde_json::Value>,
    pub detection_timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuDetection {
    pub gpu_detection: Vec<GpuDevice>,
    pub device: crate::Device,
    pub device_type: crate::DeviceType,
    /// Compute runtime version of the active backend, not the driver.
    pub runtime_version: String,
    pub detection_timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuDetection {
    pub cpu_detection: CpuSection,
    pub detection_timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryDetection {
    pub memory_detection: MemorySection,
    pub detection_timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskDetection {
    pub disk_detection: DiskSection,
    pub detection_timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkDetection {
    pub network_detection: NetworkSection,
    pub detection_timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentDetection {
    pub environment_detection: EnvironmentInfo,
    pub detection_timestamp: f64,
}

/// The deliberately cheap projection safe to poll sub-second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeMetrics {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub gpu_status: Vec<GpuSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeDetection {
    pub realtime_monitoring: RealtimeMetrics,
    pub detection_timestamp: f64,
}

/// Legacy-compatible aggregate: the same data as [`CompleteDetection`]
/// under the field names an older consumer expects. Relabeling only —
/// building one performs no additional reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyInfo {
    /// Architecture, under the legacy consumer's `cpu` key.
    pub cpu: String,
    pub name: String,
    pub platform: String,
    pub service_version: String,
    pub os: String,
    pub os_alias: crate::OsAlias,
    pub is_wsl: bool,
    pub gpu: Vec<GpuDevice>,
    pub gpu_memory: String,
    pub device: crate::Device,
    pub device_type: crate::DeviceType,
    pub driver_version: String,
    pub runtime_version: String,
    pub has_nvidia: bool,
    pub has_amd: bool,
    pub cpu_percent: f64,
    pub cpu_count: usize,
    pub memory: VirtualMemory,
    pub disk: DiskUsage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_metrics: Option<serde_json::Value>,
}

impl LegacyInfo {
    /// Relabels an assembled [`CompleteDetection`]. Pure projection: every
    /// field is moved or copied, nothing is re-measured.
    pub fn from_complete(complete: CompleteDetection) -> Self {
        Self {
            cpu: complete.platform.architecture,
            name: complete.platform.name,
            platform: complete.platform.platform,
            service_version: complete.platform.service_version,
            os: complete.platform.os,
            os_alias: complete.platform.os_alias,
            is_wsl: complete.platform.is_wsl,
            gpu: complete.gpu,
            gpu_memory: complete.gpu_memory,
            device: complete.accelerator.device,
            device_type: complete.accelerator.device_type,
            driver_version: complete.accelerator.driver_version,
            runtime_version: complete.accelerator.runtime_version,
            has_nvidia: complete.accelerator.has_nvidia,
            has_amd: complete.accelerator.has_amd,
            cpu_percent: complete.cpu_percent,
            cpu_count: complete.cpu_count,
            memory: complete.memory,
            disk: complete.disk,
            mac_metrics: complete.mac_metrics,
        }
    }
}

/// Host digest shown on the root endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSummary {
    pub os: String,
    pub device: crate::Device,
    pub device_type: crate::DeviceType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootResponse {
    pub api_name: String,
    pub version: String,
    pub description: String,
    pub endpoints: BTreeMap<String, String>,
    pub system_summary: SystemSummary,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: f64,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AcceleratorState, Metric, OsAlias, PlatformInfo};

    fn sample_complete() -> CompleteDetection {
        CompleteDetection {
            api_name: "Borealis System Detection".into(),
            version: "0.1.0".into(),
            platform: PlatformInfo {
                architecture: "x86_64".into(),
                name: "testhost".into(),
                platform: "Linux-6.8.0-x86_64".into(),
                service_version: "0.1.0".into(),
                os: "Linux".into(),
                os_alias: OsAlias("Linux".into(), "6.8.0".into(), "#1".into()),
                is_wsl: false,
            },
            accelerator: AcceleratorState::cpu_only(),
            cpu_percent: 7.5,
            cpu_count: 8,
            memory: VirtualMemory {
                total: 16_000_000_000,
                available: 8_000_000_000,
                used: 8_000_000_000,
                free: 4_000_000_000,
                percent: 50.0,
            },
            disk: DiskUsage {
                total: 1_000_000,
                used: 300_000,
                free: 700_000,
                percent: 30.0,
            },
            gpu: vec![],
            gpu_memory: String::new(),
            mac_metrics: None,
            detection_timestamp: 1.25,
        }
    }

    #[test]
    fn complete_flattens_platform_and_accelerator() {
        let json = serde_json::to_string(&sample_complete()).unwrap();
        // Flat union: no nested "platform"/"accelerator" objects.
        assert!(json.contains("\"architecture\":\"x86_64\""));
        assert!(json.contains("\"device\":\"cpu\""));
        assert!(!json.contains("\"platform\":{"));
        assert!(!json.contains("\"accelerator\""));
    }

    #[test]
    fn legacy_is_a_pure_relabel() {
        let complete = sample_complete();
        let legacy = LegacyInfo::from_complete(complete.clone());

        assert_eq!(legacy.cpu, complete.platform.architecture);
        assert_eq!(legacy.device, complete.accelerator.device);
        assert_eq!(legacy.memory, complete.memory);
        assert_eq!(legacy.disk, complete.disk);
        assert_eq!(legacy.is_wsl, complete.platform.is_wsl);
        assert_eq!(legacy.has_nvidia, complete.accelerator.has_nvidia);
        assert_eq!(legacy.has_amd, complete.accelerator.has_amd);
        assert_eq!(legacy.gpu_memory, "");

        let json = serde_json::to_string(&legacy).unwrap();
        // Legacy shape drops the service identity fields.
        assert!(!json.contains("api_name"));
        assert!(json.contains("\"cpu\":\"x86_64\""));
    }

    #[test]
    fn realtime_shape() {
        let rt = RealtimeDetection {
            realtime_monitoring: RealtimeMetrics {
                cpu_percent: 1.0,
                memory_percent: 2.0,
                disk_percent: 3.0,
                gpu_status: vec![GpuSummary {
                    name: "cpu".into(),
                    utilization: Metric::Unavailable,
                    memory_used_percent: Metric::Unavailable,
                }],
            },
            detection_timestamp: 0.5,
        };
        let json = serde_json::to_string(&rt).unwrap();
        let parsed: RealtimeDetection = serde_json::from_str(&json).unwrap();
        assert_eq!(rt, parsed);
    }
}
