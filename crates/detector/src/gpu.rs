//! Per-device GPU telemetry.
//!
//! The reader picks its enumeration source from the startup selection in
//! [`crate::accel`]: the owned NVML handle when NVIDIA is present,
//! otherwise the AMD management CLI, otherwise nothing. With no usable
//! source the device list is empty. When a source fails mid-enumeration
//! the partial list is abandoned and replaced by a single all-sentinel
//! CPU placeholder, so callers always see either real devices or an
//! explicit degraded marker.

use std::time::Duration;

use async_trait::async_trait;
use borealis_protocol::{GpuDevice, GpuSummary, Metric};
use thiserror::Error;
use tracing::warn;

use crate::accel::Accelerator;
use crate::command::{self, CommandError};
use crate::round2;

const ROCM_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum GpuError {
    #[cfg(not(target_os = "macos"))]
    #[error("NVML query failed: {0}")]
    Nvml(#[from] nvml_wrapper::error::NvmlError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("unparseable GPU telemetry: {0}")]
    Parse(String),
}

/// A vendor-specific device enumerator.
#[async_trait]
pub trait GpuSource: Send + Sync {
    async fn enumerate(&self) -> Result<Vec<GpuDevice>, GpuError>;
}

/// Reads the device list for the active backend.
pub async fn read(accel: &Accelerator) -> Vec<GpuDevice> {
    #[cfg(not(target_os = "macos"))]
    if let Some(nvml) = accel.nvml() {
        return read_from(&NvmlSource { nvml }).await;
    }

    if accel.amd_capability().is_available() {
        return read_from(&RocmSource).await;
    }

    Vec::new()
}

/// Enumerates through `source`, degrading to the CPU placeholder when
/// the enumeration as a whole fails.
pub async fn read_from(source: &dyn GpuSource) -> Vec<GpuDevice> {
    match source.enumerate().await {
        Ok(devices) => devices,
        Err(e) => {
            warn!("GPU enumeration failed, reporting CPU fallback: {e}");
            vec![GpuDevice::cpu_fallback()]
        }
    }
}

/// Condenses the device list for the realtime projection.
pub fn summarize(devices: &[GpuDevice]) -> Vec<GpuSummary> {
    devices
        .iter()
        .map(|device| GpuSummary {
            name: device.name.clone(),
            utilization: device.utilization,
            memory_used_percent: memory_used_percent(device),
        })
        .collect()
}

fn memory_used_percent(device: &GpuDevice) -> Metric<f64> {
    match (device.used_memory, device.total_memory) {
        (Metric::Value(used), Metric::Value(total)) if total > 0 => {
            Metric::Value(round2(used as f64 / total as f64 * 100.0))
        }
        _ => Metric::Unavailable,
    }
}

#[cfg(not(target_os = "macos"))]
struct NvmlSource<'a> {
    nvml: &'a nvml_wrapper::Nvml,
}

#[cfg(not(target_os = "macos"))]
#[async_trait]
impl GpuSource for NvmlSource<'_> {
    async fn enumerate(&self) -> Result<Vec<GpuDevice>, GpuError> {
        let count = self.nvml.device_count()?;
        let mut devices = Vec::with_capacity(count as usize);
        for index in 0..count {
            let device = self.nvml.device_by_index(index)?;
            let name = device.name()?;
            let memory = device.memory_info()?;
            // Utilization is optional per device; its absence does not
            // abandon the enumeration.
            let utilization = match device.utilization_rates() {
                Ok(rates) => Metric::Value(rates.gpu),
                Err(_) => Metric::Unavailable,
            };
            devices.push(GpuDevice {
                name,
                total_memory: Metric::Value(memory.total),
                free_memory: Metric::Value(memory.free),
                used_memory: Metric::Value(memory.used),
                utilization,
            });
        }
        Ok(devices)
    }
}

/// AMD enumeration through the `rocm-smi` JSON interface.
struct RocmSource;

#[async_trait]
impl GpuSource for RocmSource {
    async fn enumerate(&self) -> Result<Vec<GpuDevice>, GpuError> {
        let output = command::run(
            "rocm-smi",
            &[
                "--showproductname",
                "--showmeminfo",
                "vram",
                "--showuse",
                "--json",
            ],
            ROCM_QUERY_TIMEOUT,
        )
        .await?;
        parse_rocm_devices(&output)
    }
}

/// Parses the per-card map emitted by `rocm-smi --json`.
///
/// Cards appear as top-level `cardN` objects; numeric figures arrive as
/// JSON strings. Free memory is derived from total minus used, which the
/// CLI does not report directly.
fn parse_rocm_devices(json: &str) -> Result<Vec<GpuDevice>, GpuError> {
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| GpuError::Parse(e.to_string()))?;
    let map = value
        .as_object()
        .ok_or_else(|| GpuError::Parse("expected a top-level object".to_string()))?;

    let mut cards: Vec<(&String, &serde_json::Value)> = map
        .iter()
        .filter(|(key, _)| key.starts_with("card"))
        .collect();
    cards.sort_by(|a, b| a.0.cmp(b.0));

    let mut devices = Vec::with_capacity(cards.len());
    for (index, (key, card)) in cards.into_iter().enumerate() {
        let name = card
            .get("Card series")
            .or_else(|| card.get("Card model"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("AMD GPU {index}"));

        let total = field_u64(card, "VRAM Total Memory (B)")
            .ok_or_else(|| GpuError::Parse(format!("{key}: missing VRAM total")))?;
        let used = field_u64(card, "VRAM Total Used Memory (B)")
            .ok_or_else(|| GpuError::Parse(format!("{key}: missing VRAM used")))?;
        let utilization = field_u64(card, "GPU use (%)")
            .map(|v| Metric::Value(v as u32))
            .unwrap_or(Metric::Unavailable);

        devices.push(GpuDevice {
            name,
            total_memory: Metric::Value(total),
            free_memory: Metric::Value(total.saturating_sub(used)),
            used_memory: Metric::Value(used),
            utilization,
        });
    }
    Ok(devices)
}

fn field_u64(card: &serde_json::Value, key: &str) -> Option<u64> {
    let value = card.get(key)?;
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeSource(Result<Vec<GpuDevice>, &'static str>);

    #[async_trait]
    impl GpuSource for FakeSource {
        async fn enumerate(&self) -> Result<Vec<GpuDevice>, GpuError> {
            match &self.0 {
                Ok(devices) => Ok(devices.clone()),
                Err(msg) => Err(GpuError::Parse(msg.to_string())),
            }
        }
    }

    fn device(name: &str, total: u64, used: u64) -> GpuDevice {
        GpuDevice {
            name: name.to_string(),
            total_memory: Metric::Value(total),
            free_memory: Metric::Value(total - used),
            used_memory: Metric::Value(used),
            utilization: Metric::Value(40),
        }
    }

    #[tokio::test]
    async fn enumeration_failure_abandons_partial_results() {
        let devices = read_from(&FakeSource(Err("device 1 vanished"))).await;
        assert_eq!(devices, vec![GpuDevice::cpu_fallback()]);
    }

    #[tokio::test]
    async fn successful_enumeration_passes_through() {
        let expected = vec![device("GPU A", 8, 2), device("GPU B", 16, 4)];
        let devices = read_from(&FakeSource(Ok(expected.clone()))).await;
        assert_eq!(devices, expected);
    }

    #[test]
    fn summarize_rounds_to_two_decimals() {
        let devices = vec![device("GPU A", 3, 1)];
        let summaries = summarize(&devices);
        assert_eq!(summaries.len(), 1);
        // 1/3 of memory in use.
        assert_eq!(summaries[0].memory_used_percent, Metric::Value(33.33));
        assert_eq!(summaries[0].utilization, Metric::Value(40));

        let quarter = summarize(&[device("GPU B", 1000, 250)]);
        assert_eq!(quarter[0].memory_used_percent, Metric::Value(25.0));
    }

    #[test]
    fn summarize_propagates_sentinels() {
        let summaries = summarize(&[GpuDevice::cpu_fallback()]);
        assert_eq!(summaries[0].memory_used_percent, Metric::Unavailable);
        assert_eq!(summaries[0].utilization, Metric::Unavailable);
    }

    #[test]
    fn summarize_zero_total_memory_is_unavailable() {
        let mut d = device("GPU A", 0, 0);
        d.total_memory = Metric::Value(0);
        d.used_memory = Metric::Value(0);
        let summaries = summarize(&[d]);
        assert_eq!(summaries[0].memory_used_percent, Metric::Unavailable);
    }

    #[test]
    fn parse_rocm_json_devices() {
        let json = r#"{
            "card0": {
                "Card series": "Radeon RX 7900 XTX",
                "VRAM Total Memory (B)": "25753026560",
                "VRAM Total Used Memory (B)": "753026560",
                "GPU use (%)": "12"
            },
            "system": {"Driver version": "6.3.6"}
        }"#;
        let devices = parse_rocm_devices(json).unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, "Radeon RX 7900 XTX");
        assert_eq!(devices[0].total_memory, Metric::Value(25_753_026_560));
        assert_eq!(devices[0].used_memory, Metric::Value(753_026_560));
        assert_eq!(devices[0].free_memory, Metric::Value(25_000_000_000));
        assert_eq!(devices[0].utilization, Metric::Value(12));
    }

    #[test]
    fn parse_rocm_json_missing_memory_is_an_error() {
        let json = r#"{"card0": {"GPU use (%)": "5"}}"#;
        assert!(parse_rocm_devices(json).is_err());
    }
}
