//! Detection core for the Borealis system detection service.
//!
//! Probes heterogeneous, often-absent hardware backends (NVIDIA, AMD,
//! Apple unified-memory GPUs) and OS facilities, and normalizes whatever
//! is found into the shapes in `borealis-protocol`. Every probe degrades
//! to a sentinel or absence on failure; nothing in this crate aborts a
//! request or process startup because a backend is missing.
//!
//! Platform identity and accelerator selection run once at startup and
//! are cached for the process lifetime; host and GPU reads are fresh per
//! request.

pub mod accel;
pub mod command;
pub mod config;
pub mod environment;
pub mod gpu;
pub mod host;
pub mod macos;
pub mod manager;
pub mod platform;

pub use accel::{Accelerator, Capability};
pub use config::DetectorConfig;
pub use host::{HostReader, SysinfoHost};
pub use environment::EnvironmentProber;
pub use manager::{DetectionManager, API_NAME};

/// Rounds to two decimal places, the precision used for every percent
/// figure on the wire.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::round2;

    #[test]
    fn round2_truncates_to_two_decimals() {
        assert_eq!(round2(25.0), 25.0);
        assert_eq!(round2(33.333333), 33.33);
        assert_eq!(round2(66.666666), 66.67);
    }
}
