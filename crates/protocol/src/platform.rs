use serde::{Deserialize, Serialize};

/// OS identity triple: system name, kernel release, version string.
///
/// Mirrors the classic `(system, release, version)` alias tuple so legacy
/// consumers can keep treating it as a list of three strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsAlias(pub String, pub String, pub String);

/// Static machine identity, computed once at startup and never mutated.
///
/// Best-effort: any field the host does not expose is an empty string,
/// never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformInfo {
    /// CPU architecture name (e.g. `x86_64`, `aarch64`).
    pub architecture: String,
    /// Host name.
    pub name: String,
    /// Human-readable platform string (OS + kernel + arch).
    pub platform: String,
    /// Build version of the service runtime serving this data.
    pub service_version: String,
    /// OS family name (e.g. `Linux`, `Darwin`, `Windows`).
    pub os: String,
    pub os_alias: OsAlias,
    /// True when running on a Linux kernel under the Windows
    /// compatibility layer.
    pub is_wsl: bool,
}

/// Compute device the ML runtime would select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cpu,
    Cuda,
    Mps,
}

/// Hardware vendor behind the selected device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Cpu,
    Nvidia,
    Amd,
    AppleSilicon,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
            Device::Mps => "mps",
        }
    }
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Cpu => "cpu",
            DeviceType::Nvidia => "nvidia",
            DeviceType::Amd => "amd",
            DeviceType::AppleSilicon => "apple_silicon",
        }
    }
}

/// Accelerator backend identity, fixed after startup detection.
///
/// At most one vendor backend is active (priority NVIDIA > AMD > Apple >
/// CPU); the `has_*` flags record which backends are merely present,
/// independent of which one won.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceleratorState {
    pub device: Device,
    pub device_type: DeviceType,
    /// Vendor driver version, or `"n/a"` when no backend is active.
    pub driver_version: String,
    /// Compute runtime version reported by the active backend, or `"n/a"`.
    pub runtime_version: String,
    pub has_nvidia: bool,
    pub has_amd: bool,
    pub has_mps: bool,
}

impl AcceleratorState {
    /// The degraded state used when no accelerator backend is usable.
    pub fn cpu_only() -> Self {
        Self {
            device: Device::Cpu,
            device_type: DeviceType::Cpu,
            driver_version: crate::SENTINEL.to_string(),
            runtime_version: crate::SENTINEL.to_string(),
            has_nvidia: false,
            has_amd: false,
            has_mps: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_wire_names() {
        assert_eq!(serde_json::to_string(&Device::Cuda).unwrap(), "\"cuda\"");
        assert_eq!(serde_json::to_string(&Device::Mps).unwrap(), "\"mps\"");
        assert_eq!(
            serde_json::to_string(&DeviceType::AppleSilicon).unwrap(),
            "\"apple_silicon\""
        );
    }

    #[test]
    fn os_alias_serializes_as_triple() {
        let alias = OsAlias("Linux".into(), "6.8.0".into(), "#1 SMP".into());
        let json = serde_json::to_string(&alias).unwrap();
        assert_eq!(json, "[\"Linux\",\"6.8.0\",\"#1 SMP\"]");
    }

    #[test]
    fn cpu_only_state() {
        let state = AcceleratorState::cpu_only();
        assert_eq!(state.device, Device::Cpu);
        assert_eq!(state.device_type, DeviceType::Cpu);
        assert_eq!(state.driver_version, "n/a");
        assert!(!state.has_nvidia && !state.has_amd && !state.has_mps);
    }

    #[test]
    fn accelerator_state_roundtrip() {
        let state = AcceleratorState {
            device: Device::Cuda,
            device_type: DeviceType::Nvidia,
            driver_version: "550.54.14".into(),
            runtime_version: "12.4".into(),
            has_nvidia: true,
            has_amd: false,
            has_mps: false,
        };
        let json = serde_json::to_string(&state).unwrap();
        let parsed: AcceleratorState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, parsed);
    }
}
