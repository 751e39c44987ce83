//! Best-effort host probing for the environment snapshot.

use std::env;
use std::fs;
use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::core::types::{Architecture, EnvironmentSnapshot, OsFamily, PackageManager};

/// Probe the current host. Never fails; unknown facts fall back to defaults.
pub fn detect() -> EnvironmentSnapshot {
    let (os, os_version) = detect_os();
    let snapshot = EnvironmentSnapshot {
        os,
        os_version,
        architecture: architecture_from(env::consts::ARCH),
        package_manager: detect_package_manager(os),
        has_sudo: on_path("sudo"),
        in_container: detect_container(),
    };
    debug!(?snapshot, "environment detected");
    snapshot
}

fn detect_os() -> (OsFamily, String) {
    if env::consts::OS == "macos" {
        let version = Command::new("sw_vers")
            .arg("-productVersion")
            .output()
            .ok()
            .filter(|output| output.status.success())
            .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
            .unwrap_or_default();
        return (OsFamily::Macos, version);
    }
    match fs::read_to_string("/etc/os-release") {
        Ok(contents) => parse_os_release(&contents),
        Err(_) => (OsFamily::Unknown, String::new()),
    }
}

/// Parse `ID=` and `VERSION_ID=` from an os-release file.
pub fn parse_os_release(contents: &str) -> (OsFamily, String) {
    let mut id = "";
    let mut version = "";
    for line in contents.lines() {
        if let Some(value) = line.strip_prefix("ID=") {
            id = value;
        } else if let Some(value) = line.strip_prefix("VERSION_ID=") {
            version = value;
        }
    }
    let unquote = |value: &str| value.trim().trim_matches('"').trim_matches('\'').to_string();
    let family = match unquote(id).to_lowercase().as_str() {
        "ubuntu" => OsFamily::Ubuntu,
        "debian" => OsFamily::Debian,
        "fedora" => OsFamily::Fedora,
        "arch" => OsFamily::Arch,
        _ => OsFamily::Unknown,
    };
    (family, unquote(version))
}

pub fn architecture_from(arch: &str) -> Architecture {
    match arch {
        "x86_64" | "amd64" => Architecture::Amd64,
        "aarch64" | "arm64" => Architecture::Arm64,
        _ => Architecture::Unknown,
    }
}

fn detect_package_manager(os: OsFamily) -> PackageManager {
    let preferred = match os {
        OsFamily::Ubuntu | OsFamily::Debian => Some(PackageManager::Apt),
        OsFamily::Fedora => Some(PackageManager::Dnf),
        OsFamily::Arch => Some(PackageManager::Pacman),
        OsFamily::Macos => Some(PackageManager::Brew),
        OsFamily::Unknown => None,
    };
    let candidates = preferred.into_iter().chain([
        PackageManager::Apt,
        PackageManager::Dnf,
        PackageManager::Yum,
        PackageManager::Pacman,
        PackageManager::Brew,
    ]);
    for candidate in candidates {
        if on_path(package_manager_binary(candidate)) {
            return candidate;
        }
    }
    PackageManager::None
}

fn package_manager_binary(package_manager: PackageManager) -> &'static str {
    match package_manager {
        PackageManager::Apt => "apt-get",
        PackageManager::Dnf => "dnf",
        PackageManager::Yum => "yum",
        PackageManager::Pacman => "pacman",
        PackageManager::Brew => "brew",
        PackageManager::None => "",
    }
}

fn on_path(program: &str) -> bool {
    if program.is_empty() {
        return false;
    }
    env::var_os("PATH")
        .map(|paths| env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}

fn detect_container() -> bool {
    if Path::new("/.dockerenv").exists() || Path::new("/run/.containerenv").exists() {
        return true;
    }
    fs::read_to_string("/proc/1/cgroup")
        .map(|contents| parse_cgroup_is_container(&contents))
        .unwrap_or(false)
}

/// True when a cgroup listing names a container runtime.
pub fn parse_cgroup_is_container(contents: &str) -> bool {
    ["docker", "containerd", "kubepods", "lxc", "podman"]
        .iter()
        .any(|marker| contents.contains(marker))
}
