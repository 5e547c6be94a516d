// bndl-common/src/cache.rs
// Handles caching of the formula API data

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use super::error::{BndlError, Result};
use crate::Config;

pub const FORMULA_CACHE_FILE: &str = "formula.json";

/// How long cache entries are considered fresh
const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug)]
pub struct Cache {
    cache_dir: PathBuf,
}

impl Cache {
    /// Create a new Cache using the config's cache_dir
    pub fn new(config: &Config) -> Result<Self> {
        Self::at(config.cache_dir())
    }

    pub fn at(cache_dir: PathBuf) -> Result<Self> {
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir)?;
        }
        Ok(Self { cache_dir })
    }

    pub fn get_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn store_raw(&self, filename: &str, data: &str) -> Result<()> {
        let path = self.cache_dir.join(filename);
        tracing::debug!("Saving raw data to cache file: {:?}", path);
        // readers never observe a partially written file
        let tmp = self.cache_dir.join(format!(".{filename}.tmp"));
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    pub fn load_raw(&self, filename: &str) -> Result<String> {
        let path = self.cache_dir.join(filename);
        tracing::debug!("Loading raw data from cache file: {:?}", path);

        if !path.exists() {
            return Err(BndlError::Cache(format!(
                "Cache file {filename} does not exist"
            )));
        }

        fs::read_to_string(&path).map_err(|e| BndlError::Cache(format!("IO error: {e}")))
    }

    pub fn exists(&self, filename: &str) -> bool {
        self.cache_dir.join(filename).is_file()
    }

    /// Checks if a cache file exists and is within TTL
    pub fn is_cache_valid(&self, filename: &str) -> Result<bool> {
        let path = self.cache_dir.join(filename);
        if !path.exists() {
            return Ok(false);
        }

        let modified_time = fs::metadata(&path)?.modified()?;
        let age = SystemTime::now()
            .duration_since(modified_time)
            .map_err(|e| BndlError::Cache(format!("System time error: {e}")))?;

        Ok(age <= CACHE_TTL)
    }

    pub fn clear_file(&self, filename: &str) -> Result<()> {
        let path = self.cache_dir.join(filename);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_then_load_returns_contents() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::at(dir.path().join("nested")).unwrap();

        cache.store_raw(FORMULA_CACHE_FILE, "[]").unwrap();

        assert!(cache.exists(FORMULA_CACHE_FILE));
        assert_eq!(cache.load_raw(FORMULA_CACHE_FILE).unwrap(), "[]");
        assert!(cache.is_cache_valid(FORMULA_CACHE_FILE).unwrap());
    }

    #[test]
    fn missing_file_is_a_cache_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::at(dir.path().to_path_buf()).unwrap();

        let err = cache.load_raw(FORMULA_CACHE_FILE).unwrap_err();
        assert!(matches!(err, BndlError::Cache(_)));
        assert!(!cache.is_cache_valid(FORMULA_CACHE_FILE).unwrap());
    }

    #[test]
    fn entry_older_than_ttl_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::at(dir.path().to_path_buf()).unwrap();
        cache.store_raw(FORMULA_CACHE_FILE, "[]").unwrap();

        let backdated = SystemTime::now() - CACHE_TTL - Duration::from_secs(60);
        fs::File::options()
            .write(true)
            .open(dir.path().join(FORMULA_CACHE_FILE))
            .unwrap()
            .set_modified(backdated)
            .unwrap();

        assert!(cache.exists(FORMULA_CACHE_FILE));
        assert!(!cache.is_cache_valid(FORMULA_CACHE_FILE).unwrap());
    }

    #[test]
    fn clear_file_removes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::at(dir.path().to_path_buf()).unwrap();
        cache.store_raw("x.json", "{}").unwrap();

        cache.clear_file("x.json").unwrap();
        assert!(!cache.exists("x.json"));
        cache.clear_file("x.json").unwrap();
    }
}
