//! Identity of the machine running the tool.
//!
//! The fingerprint is the default `machine_id` for activations: stable
//! across reboots, different between hosts.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::env;

const FINGERPRINT_BYTES: usize = 16;

/// Information about the current machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MachineInfo {
    pub os_name: String,
    pub os_version: String,
    pub hostname: String,
    pub arch: String,
}

impl MachineInfo {
    #[must_use]
    pub fn collect() -> Self {
        Self {
            os_name: env::consts::OS.to_string(),
            os_version: os_version(),
            hostname: hostname(),
            arch: env::consts::ARCH.to_string(),
        }
    }

    /// `"{os_name} {os_version}"`, as recorded on activations.
    #[must_use]
    pub fn os_label(&self) -> String {
        format!("{} {}", self.os_name, self.os_version)
    }
}

/// Hex digest over OS, architecture, hostname and the platform machine id.
#[must_use]
pub fn machine_fingerprint() -> String {
    fingerprint_of(&hardware_ids())
}

fn fingerprint_of(components: &[String]) -> String {
    let digest = Sha256::digest(components.join("|").as_bytes());
    hex::encode(&digest[..FINGERPRINT_BYTES])
}

fn hardware_ids() -> Vec<String> {
    let mut ids = vec![
        env::consts::OS.to_string(),
        env::consts::ARCH.to_string(),
        hostname(),
    ];
    if let Some(machine_id) = platform_machine_id() {
        ids.push(machine_id);
    }
    ids
}

fn hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

fn os_version() -> String {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("sw_vers")
            .arg("-productVersion")
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/etc/os-release")
            .ok()
            .and_then(|content| {
                content
                    .lines()
                    .find_map(|l| l.strip_prefix("VERSION_ID="))
                    .map(|v| v.trim_matches('"').to_string())
            })
            .unwrap_or_else(|| "unknown".to_string())
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        "unknown".to_string()
    }
}

fn platform_machine_id() -> Option<String> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("ioreg")
            .args(["-rd1", "-c", "IOPlatformExpertDevice"])
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .and_then(|output| {
                output
                    .lines()
                    .find(|l| l.contains("IOPlatformUUID"))
                    .and_then(|l| l.split('"').nth(3))
                    .map(String::from)
            })
    }

    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/etc/machine-id")
            .or_else(|_| std::fs::read_to_string("/var/lib/dbus/machine-id"))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_hex() {
        let a = machine_fingerprint();
        assert_eq!(a, machine_fingerprint());
        assert_eq!(a.len(), FINGERPRINT_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn fingerprint_depends_on_every_component() {
        let base = vec!["linux".to_string(), "x86_64".to_string(), "host-a".to_string()];
        let mut renamed = base.clone();
        renamed[2] = "host-b".to_string();
        assert_ne!(fingerprint_of(&base), fingerprint_of(&renamed));
    }

    #[test]
    fn collect_fills_os_and_arch() {
        let info = MachineInfo::collect();
        assert_eq!(info.os_name, env::consts::OS);
        assert_eq!(info.arch, env::consts::ARCH);
        assert!(info.os_label().starts_with(env::consts::OS));
    }
}
