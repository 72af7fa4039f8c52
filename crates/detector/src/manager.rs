//! Detection aggregator.
//!
//! Owns the startup-time state (platform identity, accelerator
//! selection) and assembles the per-request projections from fresh host
//! and GPU reads. Every projection is stamped with seconds since service
//! start from a monotonic clock, so consecutive stamps never go
//! backwards even when the wall clock does.

use std::time::Instant;

use borealis_protocol::{
    CompleteDetection, CpuDetection, DiskDetection, EnvironmentDetection, GpuDetection,
    LegacyInfo, MemoryDetection, NetworkDetection, PlatformInfo, RealtimeDetection,
    RealtimeMetrics, SystemSummary,
};

use crate::accel::Accelerator;
use crate::config::DetectorConfig;
use crate::environment::EnvironmentProber;
use crate::gpu;
use crate::host::{HostReader, SysinfoHost};
use crate::macos;
use crate::platform;

/// Public name this service reports about itself.
pub const API_NAME: &str = "Borealis System Detection API";

/// Startup-time state plus the readers behind each projection.
pub struct DetectionManager<H> {
    platform: PlatformInfo,
    accel: Accelerator,
    host: H,
    prober: EnvironmentProber,
    config: DetectorConfig,
    started: Instant,
}

impl DetectionManager<SysinfoHost> {
    pub async fn new(config: DetectorConfig) -> Self {
        Self::with_host(config, SysinfoHost::new()).await
    }
}

impl<H: HostReader> DetectionManager<H> {
    pub async fn with_host(config: DetectorConfig, host: H) -> Self {
        let platform = platform::probe();
        let accel = Accelerator::detect(&platform, &config).await;
        Self {
            platform,
            accel,
            host,
            prober: EnvironmentProber::default(),
            config,
            started: Instant::now(),
        }
    }

    pub fn platform(&self) -> &PlatformInfo {
        &self.platform
    }

    pub fn accelerator(&self) -> &Accelerator {
        &self.accel
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Seconds since service start, from the monotonic clock.
    pub fn timestamp(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// The full aggregate behind the main detection endpoint.
    pub async fn complete(&self) -> CompleteDetection {
        let cpu = self.host.cpu().await;
        let memory = self.host.memory().await;
        let disk = self.host.disk().await;
        let devices = gpu::read(&self.accel).await;

        let mac_metrics = if self.config.enable_mac_specific {
            macos::extended_metrics().await
        } else {
            None
        };

        CompleteDetection {
            api_name: API_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            platform: self.platform.clone(),
            accelerator: self.accel.state().clone(),
            cpu_percent: cpu.cpu_percent,
            cpu_count: cpu.cpu_count,
            memory: memory.virtual_memory,
            disk: disk.disk_usage,
            // Always empty; older consumers expect the key to exist and
            // read the per-device figures instead.
            gpu_memory: String::new(),
            gpu: devices,
            mac_metrics,
            detection_timestamp: self.timestamp(),
        }
    }

    pub async fn gpu(&self) -> GpuDetection {
        let state = self.accel.state();
        GpuDetection {
            gpu_detection: gpu::read(&self.accel).await,
            device: state.device,
            device_type: state.device_type,
            runtime_version: state.runtime_version.clone(),
            detection_timestamp: self.timestamp(),
        }
    }

    pub async fn cpu(&self) -> CpuDetection {
        CpuDetection {
            cpu_detection: self.host.cpu().await,
            detection_timestamp: self.timestamp(),
        }
    }

    pub async fn memory(&self) -> MemoryDetection {
        MemoryDetection {
            memory_detection: self.host.memory().await,
            detection_timestamp: self.timestamp(),
        }
    }

    pub async fn disk(&self) -> DiskDetection {
        DiskDetection {
            disk_detection: self.host.disk().await,
            detection_timestamp: self.timestamp(),
        }
    }

    pub async fn network(&self) -> NetworkDetection {
        NetworkDetection {
            network_detection: self.host.network().await,
            detection_timestamp: self.timestamp(),
        }
    }

    pub async fn environment(&self) -> EnvironmentDetection {
        EnvironmentDetection {
            environment_detection: self.prober.probe().await,
            detection_timestamp: self.timestamp(),
        }
    }

    /// Cheap projection for sub-second polling: exactly one percent probe
    /// per resource plus one GPU enumeration, nothing else.
    pub async fn realtime(&self) -> RealtimeDetection {
        let devices = gpu::read(&self.accel).await;
        RealtimeDetection {
            realtime_monitoring: RealtimeMetrics {
                cpu_percent: self.host.cpu_percent().await,
                memory_percent: self.host.memory_percent().await,
                disk_percent: self.host.disk_percent().await,
                gpu_status: gpu::summarize(&devices),
            },
            detection_timestamp: self.timestamp(),
        }
    }

    /// The aggregate under the legacy consumer's field names.
    pub async fn legacy(&self) -> LegacyInfo {
        LegacyInfo::from_complete(self.complete().await)
    }

    pub fn summary(&self) -> SystemSummary {
        let state = self.accel.state();
        SystemSummary {
            os: self.platform.os.clone(),
            device: state.device,
            device_type: state.device_type,
        }
    }
}
