//! Environment-driven server configuration.
//!
//! Every knob has a default; unset or unparseable variables fall back
//! silently so a bare `borealis-server` always starts.

use borealis_detector::DetectorConfig;

pub const DEFAULT_PORT: u16 = 8339;

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub detector: DetectorConfig,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            detector: DetectorConfig::default(),
        }
    }
}

impl ServerSettings {
    /// Reads `BOREALIS_*` variables from the process environment.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let detector_defaults = DetectorConfig::default();

        Self {
            host: env_string("BOREALIS_HOST").unwrap_or(defaults.host),
            port: env_parsed("BOREALIS_PORT").unwrap_or(defaults.port),
            detector: DetectorConfig {
                enable_gpu_detection: env_bool("BOREALIS_ENABLE_GPU_DETECTION")
                    .unwrap_or(detector_defaults.enable_gpu_detection),
                enable_mac_specific: env_bool("BOREALIS_ENABLE_MAC_SPECIFIC")
                    .unwrap_or(detector_defaults.enable_mac_specific),
                enable_realtime_monitoring: env_bool("BOREALIS_ENABLE_REALTIME_MONITORING")
                    .unwrap_or(detector_defaults.enable_realtime_monitoring),
                legacy_compatible: env_bool("BOREALIS_LEGACY_COMPATIBLE")
                    .unwrap_or(detector_defaults.legacy_compatible),
                cpu_check_interval: env_parsed("BOREALIS_CPU_CHECK_INTERVAL")
                    .unwrap_or(detector_defaults.cpu_check_interval),
                memory_check_interval: env_parsed("BOREALIS_MEMORY_CHECK_INTERVAL")
                    .unwrap_or(detector_defaults.memory_check_interval),
                disk_check_interval: env_parsed("BOREALIS_DISK_CHECK_INTERVAL")
                    .unwrap_or(detector_defaults.disk_check_interval),
                gpu_check_interval: env_parsed("BOREALIS_GPU_CHECK_INTERVAL")
                    .unwrap_or(detector_defaults.gpu_check_interval),
            },
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key)?.parse().ok()
}

fn env_bool(key: &str) -> Option<bool> {
    parse_bool(&env_string(key)?)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_parsing_accepts_common_spellings() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn defaults_are_serviceable() {
        let settings = ServerSettings::default();
        assert_eq!(settings.port, 8339);
        assert_eq!(settings.bind_addr(), "0.0.0.0:8339");
        assert!(settings.detector.enable_gpu_detection);
        assert!(!settings.detector.legacy_compatible);
    }
}
