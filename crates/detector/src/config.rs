//! Feature toggles and polling hints for the detection core.

/// Detection configuration.
///
/// The interval fields are advisory hints surfaced to clients; the core
/// is stateless per call and does not self-schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    /// When false, vendor backends are never probed and GPU reads return
    /// an empty device list.
    pub enable_gpu_detection: bool,
    /// Gates the macOS extended metrics block.
    pub enable_mac_specific: bool,
    /// Gates the realtime projection surface.
    pub enable_realtime_monitoring: bool,
    /// Exposes the legacy-compatible endpoint set.
    pub legacy_compatible: bool,

    /// Suggested poll intervals in seconds.
    pub cpu_check_interval: f64,
    pub memory_check_interval: f64,
    pub disk_check_interval: f64,
    pub gpu_check_interval: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            enable_gpu_detection: true,
            enable_mac_specific: true,
            enable_realtime_monitoring: true,
            legacy_compatible: false,
            cpu_check_interval: 1.0,
            memory_check_interval: 1.0,
            disk_check_interval: 5.0,
            gpu_check_interval: 2.0,
        }
    }
}
