// bndl-common/src/config.rs
use std::env;
use std::path::{Path, PathBuf};

use directories::{ProjectDirs, UserDirs};
use tracing::debug;

use super::error::Result;

const DEFAULT_API_BASE_URL: &str = "https://formulae.brew.sh/api";

#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
const DEFAULT_FALLBACK_PREFIX: &str = "/opt/homebrew";
#[cfg(all(target_os = "macos", not(target_arch = "aarch64")))]
const DEFAULT_FALLBACK_PREFIX: &str = "/usr/local";
#[cfg(not(target_os = "macos"))]
const DEFAULT_FALLBACK_PREFIX: &str = "/home/linuxbrew/.linuxbrew";

#[derive(Debug, Clone)]
pub struct Config {
    pub prefix: PathBuf,
    pub api_base_url: String,
    pub cache_dir: PathBuf,
    pub home: PathBuf,
    pub github_api_token: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        debug!("Loading bndl configuration");

        let prefix_str = non_empty_var("HOMEBREW_PREFIX").unwrap_or_else(|| {
            debug!(
                "HOMEBREW_PREFIX environment variable not set or empty, falling back to default: {}",
                DEFAULT_FALLBACK_PREFIX
            );
            DEFAULT_FALLBACK_PREFIX.to_string()
        });
        let prefix = PathBuf::from(prefix_str);
        debug!("Effective prefix set to: {}", prefix.display());

        let home = UserDirs::new()
            .map(|ud| ud.home_dir().to_path_buf())
            .or_else(|| non_empty_var("HOME").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("/"));

        let cache_dir = non_empty_var("BNDL_CACHE")
            .map(PathBuf::from)
            .or_else(|| ProjectDirs::from("", "", "bndl").map(|pd| pd.cache_dir().to_path_buf()))
            .unwrap_or_else(|| home.join(".cache").join("bndl"));

        let api_base_url = non_empty_var("HOMEBREW_API_DOMAIN")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        let github_api_token = non_empty_var("HOMEBREW_GITHUB_API_TOKEN");

        debug!("Configuration loaded successfully.");
        Ok(Self {
            prefix,
            api_base_url,
            cache_dir,
            home,
            github_api_token,
        })
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.prefix.join("bin")
    }

    pub fn sbin_dir(&self) -> PathBuf {
        self.prefix.join("sbin")
    }

    pub fn include_dir(&self) -> PathBuf {
        self.prefix.join("include")
    }

    pub fn lib_dir(&self) -> PathBuf {
        self.prefix.join("lib")
    }

    pub fn cellar_dir(&self) -> PathBuf {
        self.prefix.join("Cellar")
    }

    pub fn opt_dir(&self) -> PathBuf {
        self.prefix.join("opt")
    }

    /// Records which formulae are linked into the prefix.
    pub fn linked_dir(&self) -> PathBuf {
        self.prefix.join("var").join("homebrew").join("linked")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone()
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.cache_dir.join("logs")
    }

    pub fn home_dir(&self) -> PathBuf {
        self.home.clone()
    }

    pub fn formula_cellar_dir(&self, formula_name: &str) -> PathBuf {
        self.cellar_dir().join(formula_name)
    }

    pub fn formula_keg_path(&self, formula_name: &str, version_str: &str) -> PathBuf {
        self.formula_cellar_dir(formula_name).join(version_str)
    }

    pub fn formula_opt_path(&self, formula_name: &str) -> PathBuf {
        self.opt_dir().join(formula_name)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_at(prefix: &str) -> Config {
        Config {
            prefix: PathBuf::from(prefix),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            cache_dir: PathBuf::from("/tmp/bndl-cache"),
            home: PathBuf::from("/Users/someone"),
            github_api_token: None,
        }
    }

    #[test]
    fn derived_paths_hang_off_the_prefix() {
        let config = config_at("/opt/homebrew");
        assert_eq!(config.cellar_dir(), PathBuf::from("/opt/homebrew/Cellar"));
        assert_eq!(
            config.formula_opt_path("openssl@3"),
            PathBuf::from("/opt/homebrew/opt/openssl@3")
        );
        assert_eq!(
            config.formula_keg_path("jq", "1.7.1"),
            PathBuf::from("/opt/homebrew/Cellar/jq/1.7.1")
        );
        assert_eq!(
            config.linked_dir(),
            PathBuf::from("/opt/homebrew/var/homebrew/linked")
        );
    }

    #[test]
    fn logs_live_under_the_cache() {
        let config = config_at("/usr/local");
        assert_eq!(config.logs_dir(), PathBuf::from("/tmp/bndl-cache/logs"));
    }
}
