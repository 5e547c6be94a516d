use std::env;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::debug;

/// Default compiler family when `HOMEBREW_CC` is not set.
pub fn default_compiler() -> &'static str {
    if cfg!(target_os = "macos") {
        "clang"
    } else {
        "gcc"
    }
}

/// C++ driver matching a C compiler name (`gcc-14` -> `g++-14`).
pub fn cxx_for(cc: &str) -> String {
    if let Some(version) = cc.strip_prefix("gcc-") {
        return format!("g++-{version}");
    }
    match cc {
        "gcc" => "g++".to_string(),
        "clang" | "llvm_clang" => "clang++".to_string(),
        "cc" => "c++".to_string(),
        other => format!("{other}++"),
    }
}

/// Locates a compiler driver: `xcrun` on macOS, then `search_path`.
pub fn find_compiler(name: &str, search_path: Option<&OsStr>) -> Option<PathBuf> {
    if cfg!(target_os = "macos") {
        debug!("Attempting to find '{name}' using xcrun");
        match Command::new("xcrun")
            .arg("--find")
            .arg(name)
            .stderr(Stdio::piped())
            .output()
        {
            Ok(out) if out.status.success() => {
                let path_str = String::from_utf8_lossy(&out.stdout).trim().to_string();
                let path = PathBuf::from(path_str);
                if path.is_file() {
                    debug!("Found compiler via xcrun: {}", path.display());
                    return Some(path);
                }
            }
            Ok(out) => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                debug!("xcrun failed to find '{}': {}", name, stderr.trim());
            }
            Err(e) => {
                debug!("Failed to execute xcrun: {e}. Falling back to PATH search.");
            }
        }
    }

    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
    match which::which_in(name, search_path, cwd) {
        Ok(path) => {
            debug!("Found compiler '{}' on PATH: {}", name, path.display());
            Some(path)
        }
        Err(e) => {
            debug!("Compiler '{name}' not found on PATH: {e}");
            None
        }
    }
}

pub fn find_sdk_path() -> Option<PathBuf> {
    if !cfg!(target_os = "macos") {
        return None;
    }
    let out = Command::new("xcrun")
        .arg("--show-sdk-path")
        .stderr(Stdio::piped())
        .output()
        .ok()?;
    if !out.status.success() {
        debug!(
            "xcrun failed to find SDK path: {}",
            String::from_utf8_lossy(&out.stderr).trim()
        );
        return None;
    }
    let path_str = String::from_utf8_lossy(&out.stdout).trim().to_string();
    if path_str.is_empty() || path_str == "/" {
        return None;
    }
    let sdk_path = PathBuf::from(path_str);
    sdk_path.exists().then_some(sdk_path)
}

/// `major.minor` of the running macOS, `None` elsewhere.
pub fn get_macos_version() -> Option<String> {
    if !cfg!(target_os = "macos") {
        return None;
    }
    let out = Command::new("sw_vers")
        .arg("-productVersion")
        .stderr(Stdio::piped())
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    let version_full = String::from_utf8_lossy(&out.stdout).trim().to_string();
    Some(short_version(&version_full))
}

fn short_version(version_full: &str) -> String {
    let parts: Vec<&str> = version_full.split('.').collect();
    if parts.len() >= 2 {
        format!("{}.{}", parts[0], parts[1])
    } else {
        version_full.to_string()
    }
}

pub fn get_arch_flag() -> Option<&'static str> {
    if !cfg!(target_os = "macos") {
        return None;
    }
    if cfg!(target_arch = "x86_64") {
        Some("-arch x86_64")
    } else if cfg!(target_arch = "aarch64") {
        Some("-arch arm64")
    } else {
        debug!("Unknown target architecture on macOS: {}", env::consts::ARCH);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cxx_driver_follows_cc_family() {
        assert_eq!(cxx_for("gcc"), "g++");
        assert_eq!(cxx_for("gcc-14"), "g++-14");
        assert_eq!(cxx_for("clang"), "clang++");
        assert_eq!(cxx_for("llvm_clang"), "clang++");
    }

    #[test]
    fn short_version_keeps_major_minor() {
        assert_eq!(short_version("14.4.1"), "14.4");
        assert_eq!(short_version("15"), "15");
    }

    #[test]
    fn missing_compiler_is_none() {
        let dir = tempfile::tempdir().unwrap();
        if !cfg!(target_os = "macos") {
            assert_eq!(
                find_compiler("definitely-not-a-compiler", Some(dir.path().as_os_str())),
                None
            );
        }
    }
}
