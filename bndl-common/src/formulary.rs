use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use super::cache::{Cache, FORMULA_CACHE_FILE};
use super::config::Config;
use super::error::{BndlError, Result};
use super::keg::KegRegistry;
use super::model::formula::Formula;

#[derive(Debug, Default)]
struct FormulaIndex {
    by_name: HashMap<String, Arc<Formula>>,
    /// alias or old name -> canonical name
    renames: HashMap<String, String>,
}

impl FormulaIndex {
    fn build(formulas: Vec<Formula>) -> Self {
        let mut index = Self::default();
        for formula in formulas {
            for alias in formula.aliases.iter().chain(formula.oldnames.iter()) {
                index
                    .renames
                    .entry(alias.clone())
                    .or_insert_with(|| formula.name.clone());
            }
            index
                .by_name
                .insert(formula.name.clone(), Arc::new(formula));
        }
        index
    }

    fn lookup(&self, name: &str) -> Option<Arc<Formula>> {
        if let Some(formula) = self.by_name.get(name) {
            return Some(Arc::clone(formula));
        }
        let canonical = self.renames.get(name)?;
        debug!("Resolved '{}' to '{}' via alias/old name", name, canonical);
        self.by_name.get(canonical).cloned()
    }
}

/// Loads formula definitions from the cached API data, falling back to
/// installed kegs for formulae the API does not know.
#[derive(Debug)]
pub struct Formulary {
    cache: Cache,
    keg_registry: KegRegistry,
    index: Mutex<Option<Arc<FormulaIndex>>>,
}

impl Formulary {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self::with_parts(
            Cache::new(config)?,
            KegRegistry::new(config.clone()),
        ))
    }

    pub fn with_parts(cache: Cache, keg_registry: KegRegistry) -> Self {
        Self {
            cache,
            keg_registry,
            index: Mutex::new(None),
        }
    }

    pub fn keg_registry(&self) -> &KegRegistry {
        &self.keg_registry
    }

    fn index(&self) -> Result<Arc<FormulaIndex>> {
        let mut guard = self
            .index
            .lock()
            .map_err(|_| BndlError::Cache("formula index lock poisoned".to_string()))?;
        if let Some(index) = guard.as_ref() {
            return Ok(Arc::clone(index));
        }

        let index = if self.cache.exists(FORMULA_CACHE_FILE) {
            let raw_data = self.cache.load_raw(FORMULA_CACHE_FILE)?;
            let all_formulas: Vec<Formula> = serde_json::from_str(&raw_data).map_err(|e| {
                BndlError::Cache(format!("Failed to parse cached formula data: {e}"))
            })?;
            debug!("Parsed {} formulas.", all_formulas.len());
            FormulaIndex::build(all_formulas)
        } else {
            warn!(
                "No cached formula data in {}; only installed kegs can be resolved",
                self.cache.get_dir().display()
            );
            FormulaIndex::default()
        };

        let index = Arc::new(index);
        *guard = Some(Arc::clone(&index));
        Ok(index)
    }

    /// Looks a formula up by name, alias, old name or `user/tap/name`.
    pub fn factory(&self, name: &str) -> Result<Arc<Formula>> {
        let short_name = name.rsplit('/').next().unwrap_or(name);

        if let Some(formula) = self.index()?.lookup(short_name) {
            debug!(
                "Loaded formula '{}' version {}",
                formula.name,
                formula.version_str_full()
            );
            return Ok(formula);
        }

        if let Some(keg) = self.keg_registry.get_installed_keg(short_name)? {
            let receipt = self.keg_registry.read_receipt(&keg)?;
            let keg_only = !self.keg_registry.is_linked(short_name);
            debug!(
                "Formula '{}' not in API data; using installed keg {} (keg_only={})",
                short_name, keg.version_str, keg_only
            );
            return Ok(Arc::new(Formula::from_installed(
                short_name,
                &keg.version_str,
                receipt.runtime_dependency_names(),
                keg_only,
            )));
        }

        Err(BndlError::NotFound(format!(
            "No available formula with the name \"{name}\" (run `bndl update` to refresh formula data)"
        )))
    }

    /// Canonical formula name for `name`, or `name` itself when unknown.
    pub fn canonical_name(&self, name: &str) -> String {
        self.factory(name)
            .map(|f| f.name.clone())
            .unwrap_or_else(|_| name.to_string())
    }
}
