//! Static platform identity probe.
//!
//! Runs once at startup; every field is best-effort and unavailable
//! values degrade to empty strings, never errors.

use borealis_protocol::{OsAlias, PlatformInfo};
use sysinfo::System;

/// OS family name matching the classic `uname -s` convention.
fn os_family() -> String {
    match std::env::consts::OS {
        "linux" => "Linux".to_string(),
        "macos" => "Darwin".to_string(),
        "windows" => "Windows".to_string(),
        "freebsd" => "FreeBSD".to_string(),
        other => other.to_string(),
    }
}

/// Queries the host's static identity. Never fails.
pub fn probe() -> PlatformInfo {
    let os = os_family();
    let kernel = System::kernel_version().unwrap_or_default();
    let version = System::long_os_version().unwrap_or_default();
    let architecture = std::env::consts::ARCH.to_string();

    let name = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_default();

    PlatformInfo {
        platform: format!("{os}-{kernel}-{architecture}"),
        architecture,
        name,
        service_version: env!("CARGO_PKG_VERSION").to_string(),
        os_alias: OsAlias(os.clone(), kernel, version),
        os,
        is_wsl: is_wsl(),
    }
}

/// Detects a Linux kernel running under the Windows compatibility layer.
///
/// On Windows itself this is false without spawning anything. Elsewhere
/// the kernel release string is inspected; a missing `uname` binary or a
/// non-zero exit means "not WSL", never an error.
pub fn is_wsl() -> bool {
    if cfg!(windows) {
        return false;
    }

    match std::process::Command::new("uname").arg("-r").output() {
        Ok(out) if out.status.success() => {
            kernel_release_is_wsl(&String::from_utf8_lossy(&out.stdout))
        }
        _ => false,
    }
}

fn kernel_release_is_wsl(release: &str) -> bool {
    let release = release.to_lowercase();
    release.contains("microsoft") || release.contains("wsl2")
}
