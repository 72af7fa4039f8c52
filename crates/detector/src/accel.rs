//! Accelerator backend selection.
//!
//! Runs exactly once at startup and stays terminal for the process
//! lifetime: probe each vendor backend in priority order (NVIDIA > AMD >
//! Apple > CPU) and activate the first one that initializes. Probe
//! failures are logged and downgrade the selection; they never abort
//! startup. The NVML handle is owned here and released on drop — no
//! process-wide globals.

use std::time::Duration;

use borealis_protocol::{AcceleratorState, Device, DeviceType, PlatformInfo, SENTINEL};
use tracing::info;
#[cfg(not(target_os = "macos"))]
use tracing::warn;

#[cfg(not(target_os = "macos"))]
use nvml_wrapper::Nvml;

use crate::command;
use crate::config::DetectorConfig;
use crate::macos;

/// Probe timeout for the AMD management CLI.
const ROCM_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Whether a vendor backend is usable, decided once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    Available,
    Unavailable(String),
}

impl Capability {
    pub fn is_available(&self) -> bool {
        matches!(self, Capability::Available)
    }

    fn missing(reason: impl Into<String>) -> Self {
        Capability::Unavailable(reason.into())
    }
}

/// The selected accelerator backend and the vendor handles behind it.
///
/// Immutable after [`Accelerator::detect`]; shared read-only across
/// concurrent requests.
pub struct Accelerator {
    state: AcceleratorState,
    nvidia: Capability,
    amd: Capability,
    apple: Capability,
    #[cfg(not(target_os = "macos"))]
    nvml: Option<Nvml>,
}

impl Accelerator {
    /// Probes the vendor backends and activates at most one.
    pub async fn detect(platform: &PlatformInfo, config: &DetectorConfig) -> Self {
        if !config.enable_gpu_detection {
            info!("GPU detection disabled by configuration");
            return Self::disabled("disabled by configuration");
        }

        #[cfg(not(target_os = "macos"))]
        let (nvml, nvidia, device_count) = probe_nvml();
        #[cfg(target_os = "macos")]
        let (nvidia, device_count) = (
            Capability::missing("NVML is not available on this platform"),
            0u32,
        );

        let amd = if platform.is_wsl {
            // The vendor library is unreliable under the compatibility
            // layer; skip the probe entirely.
            Capability::missing("AMD probing skipped under WSL")
        } else {
            probe_rocm_smi().await
        };

        let apple = macos::apple_gpu_capability();

        let state = if nvidia.is_available() && device_count > 0 {
            #[cfg(not(target_os = "macos"))]
            let (driver, runtime) = nvml_versions(nvml.as_ref());
            #[cfg(target_os = "macos")]
            let (driver, runtime) = (SENTINEL.to_string(), SENTINEL.to_string());

            info!(driver = %driver, runtime = %runtime, "accelerator active: CUDA");
            AcceleratorState {
                device: Device::Cuda,
                device_type: DeviceType::Nvidia,
                driver_version: driver,
                runtime_version: runtime,
                has_nvidia: true,
                has_amd: amd.is_available(),
                has_mps: apple.is_available(),
            }
        } else if amd.is_available() {
            let (driver, runtime) = rocm_versions().await;
            info!(driver = %driver, runtime = %runtime, "accelerator active: ROCm");
            AcceleratorState {
                device: Device::Cuda,
                device_type: DeviceType::Amd,
                driver_version: driver,
                runtime_version: runtime,
                has_nvidia: nvidia.is_available(),
                has_amd: true,
                has_mps: apple.is_available(),
            }
        } else if apple.is_available() {
            info!("accelerator active: Apple unified-memory GPU");
            AcceleratorState {
                device: Device::Mps,
                device_type: DeviceType::AppleSilicon,
                driver_version: SENTINEL.to_string(),
                runtime_version: SENTINEL.to_string(),
                has_nvidia: false,
                has_amd: false,
                has_mps: true,
            }
        } else {
            info!("no accelerator backend usable, running CPU-only");
            let mut state = AcceleratorState::cpu_only();
            state.has_nvidia = nvidia.is_available();
            state.has_amd = amd.is_available();
            state
        };

        Self {
            state,
            nvidia,
            amd,
            apple,
            #[cfg(not(target_os = "macos"))]
            nvml,
        }
    }

    /// CPU-only selector with no probes performed.
    pub fn disabled(reason: &str) -> Self {
        Self {
            state: AcceleratorState::cpu_only(),
            nvidia: Capability::missing(reason),
            amd: Capability::missing(reason),
            apple: Capability::missing(reason),
            #[cfg(not(target_os = "macos"))]
            nvml: None,
        }
    }

    pub fn state(&self) -> &AcceleratorState {
        &self.state
    }

    pub fn nvidia_capability(&self) -> &Capability {
        &self.nvidia
    }

    pub fn amd_capability(&self) -> &Capability {
        &self.amd
    }

    pub fn apple_capability(&self) -> &Capability {
        &self.apple
    }

    /// The owned NVML handle, when the library initialized.
    #[cfg(not(target_os = "macos"))]
    pub(crate) fn nvml(&self) -> Option<&Nvml> {
        self.nvml.as_ref()
    }
}

impl std::fmt::Debug for Accelerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Accelerator")
            .field("state", &self.state)
            .field("nvidia", &self.nvidia)
            .field("amd", &self.amd)
            .field("apple", &self.apple)
            .finish_non_exhaustive()
    }
}

/// Initializes NVML and counts devices. Init success means the library
/// is present even when zero devices are enumerated.
#[cfg(not(target_os = "macos"))]
fn probe_nvml() -> (Option<Nvml>, Capability, u32) {
    match Nvml::init() {
        Ok(nvml) => {
            let count = match nvml.device_count() {
                Ok(count) => count,
                Err(e) => {
                    warn!("NVML initialized but device count failed: {e}");
                    0
                }
            };
            (Some(nvml), Capability::Available, count)
        }
        Err(e) => {
            let reason = format!("NVML init failed: {e}");
            warn!("{reason}");
            (None, Capability::Unavailable(reason), 0)
        }
    }
}

#[cfg(not(target_os = "macos"))]
fn nvml_versions(nvml: Option<&Nvml>) -> (String, String) {
    let Some(nvml) = nvml else {
        return (SENTINEL.to_string(), SENTINEL.to_string());
    };

    let driver = nvml
        .sys_driver_version()
        .unwrap_or_else(|_| SENTINEL.to_string());
    let runtime = nvml
        .sys_cuda_driver_version()
        .map(|v| {
            format!(
                "{}.{}",
                nvml_wrapper::cuda_driver_version_major(v),
                nvml_wrapper::cuda_driver_version_minor(v)
            )
        })
        .unwrap_or_else(|_| SENTINEL.to_string());
    (driver, runtime)
}

/// Checks whether the AMD management CLI answers at all.
async fn probe_rocm_smi() -> Capability {
    match command::run("rocm-smi", &["--version"], ROCM_PROBE_TIMEOUT).await {
        Ok(_) => Capability::Available,
        Err(e) => Capability::Unavailable(format!("rocm-smi unavailable: {e}")),
    }
}

/// Driver and tool versions from the AMD management CLI, both
/// best-effort.
async fn rocm_versions() -> (String, String) {
    let driver = match command::run(
        "rocm-smi",
        &["--showdriverversion", "--json"],
        ROCM_PROBE_TIMEOUT,
    )
    .await
    {
        Ok(out) => parse_rocm_driver_version(&out).unwrap_or_else(|| SENTINEL.to_string()),
        Err(_) => SENTINEL.to_string(),
    };

    let runtime = match command::run("rocm-smi", &["--version"], ROCM_PROBE_TIMEOUT).await {
        Ok(out) => parse_rocm_tool_version(&out).unwrap_or_else(|| SENTINEL.to_string()),
        Err(_) => SENTINEL.to_string(),
    };

    (driver, runtime)
}

/// Extracts `system.Driver version` from `rocm-smi --showdriverversion --json`.
fn parse_rocm_driver_version(json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(json).ok()?;
    value
        .get("system")?
        .get("Driver version")?
        .as_str()
        .map(|s| s.to_string())
}

/// Extracts the first `version:` figure from `rocm-smi --version` output.
fn parse_rocm_tool_version(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let (label, value) = line.split_once(':')?;
        if !label.to_lowercase().contains("version") {
            return None;
        }
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform;

    #[test]
    fn parse_rocm_driver_version_json() {
        let json = r#"{"system": {"Driver version": "6.3.6"}}"#;
        assert_eq!(parse_rocm_driver_version(json).as_deref(), Some("6.3.6"));
        assert_eq!(parse_rocm_driver_version("{}"), None);
        assert_eq!(parse_rocm_driver_version("not json"), None);
    }

    #[test]
    fn parse_rocm_tool_version_lines() {
        let out = "ROCM-SMI version: 2.1.0+unknown\nROCM-SMI-LIB version: 6.2.0";
        assert_eq!(parse_rocm_tool_version(out).as_deref(), Some("2.1.0+unknown"));
        assert_eq!(parse_rocm_tool_version("no version here"), None);
    }

    #[test]
    fn disabled_selector_is_cpu_only() {
        let accel = Accelerator::disabled("disabled by configuration");
        assert_eq!(accel.state(), &AcceleratorState::cpu_only());
        assert!(!accel.nvidia_capability().is_available());
        assert!(!accel.amd_capability().is_available());
    }

    #[tokio::test]
    async fn detection_is_deterministic() {
        let platform = platform::probe();
        let config = DetectorConfig::default();
        let first = Accelerator::detect(&platform, &config).await;
        let second = Accelerator::detect(&platform, &config).await;
        assert_eq!(first.state().device, second.state().device);
        assert_eq!(first.state().device_type, second.state().device_type);
    }

    #[tokio::test]
    async fn active_backend_implies_matching_device() {
        let platform = platform::probe();
        let accel = Accelerator::detect(&platform, &DetectorConfig::default()).await;
        let state = accel.state();
        match state.device_type {
            DeviceType::Cpu => assert_eq!(state.device, Device::Cpu),
            DeviceType::Nvidia | DeviceType::Amd => assert_eq!(state.device, Device::Cuda),
            DeviceType::AppleSilicon => assert_eq!(state.device, Device::Mps),
        }
    }
}
