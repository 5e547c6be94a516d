// bndl-common/src/keg.rs
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::{debug, warn};

use super::config::Config;
use super::error::Result;

pub const RECEIPT_FILENAME: &str = "INSTALL_RECEIPT.json";

/// Represents information about an installed package (Keg).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledKeg {
    pub name: String,
    pub version_str: String,
    pub path: PathBuf,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ReceiptDependency {
    pub full_name: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// The parts of a keg's `INSTALL_RECEIPT.json` that matter here.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReceipt {
    #[serde(default)]
    pub runtime_dependencies: Option<Vec<ReceiptDependency>>,
}

impl InstallReceipt {
    /// Short names of the recorded runtime dependencies, tap prefix removed.
    pub fn runtime_dependency_names(&self) -> Vec<String> {
        self.runtime_dependencies
            .iter()
            .flatten()
            .map(|dep| {
                dep.full_name
                    .rsplit('/')
                    .next()
                    .unwrap_or(&dep.full_name)
                    .to_string()
            })
            .collect()
    }
}

/// Queries installed packages in the Cellar.
#[derive(Debug, Clone)]
pub struct KegRegistry {
    config: Config,
}

impl KegRegistry {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn get_opt_path(&self, name: &str) -> PathBuf {
        self.config.formula_opt_path(name)
    }

    /// The keg `opt/<name>` points at, or else the highest version directory.
    pub fn get_installed_keg(&self, name: &str) -> Result<Option<InstalledKeg>> {
        let formula_dir = self.config.formula_cellar_dir(name);
        if !formula_dir.is_dir() {
            debug!(
                "[KEG_REGISTRY:{}] {} not found, not installed",
                name,
                formula_dir.display()
            );
            return Ok(None);
        }

        if let Ok(target) = fs::canonicalize(self.get_opt_path(name)) {
            if let (Ok(cellar), Some(version)) = (
                fs::canonicalize(&formula_dir),
                target.file_name().and_then(|n| n.to_str()),
            ) {
                if target.parent() == Some(cellar.as_path()) {
                    debug!("[KEG_REGISTRY:{}] opt link points at {}", name, version);
                    return Ok(Some(InstalledKeg {
                        name: name.to_string(),
                        version_str: version.to_string(),
                        path: formula_dir.join(version),
                    }));
                }
            }
        }

        let mut latest_keg: Option<InstalledKeg> = None;
        for entry_result in fs::read_dir(&formula_dir)? {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(
                        "[KEG_REGISTRY:{}] Error reading an entry in '{}': {}. Skipping entry.",
                        name,
                        formula_dir.display(),
                        e
                    );
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(version_str) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let newer = latest_keg
                .as_ref()
                .map_or(true, |current| version_str > current.version_str.as_str());
            if newer {
                latest_keg = Some(InstalledKeg {
                    name: name.to_string(),
                    version_str: version_str.to_string(),
                    path: path.clone(),
                });
            }
        }

        if let Some(keg) = &latest_keg {
            debug!(
                "[KEG_REGISTRY:{}] latest keg: {} ({})",
                name,
                keg.version_str,
                keg.path.display()
            );
        }
        Ok(latest_keg)
    }

    pub fn any_version_installed(&self, name: &str) -> bool {
        matches!(self.get_installed_keg(name), Ok(Some(_)))
    }

    /// Whether the formula's files are linked into the prefix.
    pub fn is_linked(&self, name: &str) -> bool {
        self.config.linked_dir().join(name).exists()
    }

    pub fn read_receipt(&self, keg: &InstalledKeg) -> Result<InstallReceipt> {
        let receipt_path = keg.path.join(RECEIPT_FILENAME);
        if !receipt_path.is_file() {
            debug!(
                "[KEG_REGISTRY:{}] no receipt at {}",
                keg.name,
                receipt_path.display()
            );
            return Ok(InstallReceipt::default());
        }
        let raw = fs::read_to_string(&receipt_path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn registry(prefix: &Path) -> KegRegistry {
        KegRegistry::new(Config {
            prefix: prefix.to_path_buf(),
            api_base_url: String::new(),
            cache_dir: prefix.join("cache"),
            home: prefix.to_path_buf(),
            github_api_token: None,
        })
    }

    #[test]
    fn missing_formula_is_not_installed() {
        let prefix = tempfile::tempdir().unwrap();
        let registry = registry(prefix.path());
        assert_eq!(registry.get_installed_keg("jq").unwrap(), None);
        assert!(!registry.any_version_installed("jq"));
    }

    #[test]
    fn picks_highest_version_without_opt_link() {
        let prefix = tempfile::tempdir().unwrap();
        fs::create_dir_all(prefix.path().join("Cellar/jq/1.6")).unwrap();
        fs::create_dir_all(prefix.path().join("Cellar/jq/1.7.1")).unwrap();
        fs::write(prefix.path().join("Cellar/jq/stray-file"), "").unwrap();

        let keg = registry(prefix.path()).get_installed_keg("jq").unwrap().unwrap();
        assert_eq!(keg.version_str, "1.7.1");
        assert_eq!(keg.path, prefix.path().join("Cellar/jq/1.7.1"));
    }

    #[cfg(unix)]
    #[test]
    fn opt_link_wins_over_version_order() {
        let prefix = tempfile::tempdir().unwrap();
        fs::create_dir_all(prefix.path().join("Cellar/jq/1.6")).unwrap();
        fs::create_dir_all(prefix.path().join("Cellar/jq/1.7.1")).unwrap();
        fs::create_dir_all(prefix.path().join("opt")).unwrap();
        std::os::unix::fs::symlink(
            prefix.path().join("Cellar/jq/1.6"),
            prefix.path().join("opt/jq"),
        )
        .unwrap();

        let keg = registry(prefix.path()).get_installed_keg("jq").unwrap().unwrap();
        assert_eq!(keg.version_str, "1.6");
    }

    #[test]
    fn receipt_runtime_dependencies_drop_tap_prefix() {
        let prefix = tempfile::tempdir().unwrap();
        let keg_dir = prefix.path().join("Cellar/mytool/2.0");
        fs::create_dir_all(&keg_dir).unwrap();
        fs::write(
            keg_dir.join(RECEIPT_FILENAME),
            r#"{"runtime_dependencies":[{"full_name":"someone/tap/libfoo","version":"1.0"},{"full_name":"zlib"}]}"#,
        )
        .unwrap();

        let registry = registry(prefix.path());
        let keg = registry.get_installed_keg("mytool").unwrap().unwrap();
        let receipt = registry.read_receipt(&keg).unwrap();
        assert_eq!(receipt.runtime_dependency_names(), vec!["libfoo", "zlib"]);
    }

    #[test]
    fn linked_marker_is_detected() {
        let prefix = tempfile::tempdir().unwrap();
        let registry = registry(prefix.path());
        fs::create_dir_all(prefix.path().join("var/homebrew/linked/jq")).unwrap();
        assert!(registry.is_linked("jq"));
        assert!(!registry.is_linked("libpq"));
    }
}
