// FILE: bndl-common/src/dependency/resolver.rs

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error};

use crate::dependency::DependencyExt;
use crate::error::{BndlError, Result};
use crate::formulary::Formulary;
use crate::model::formula::Formula;

struct Expander<'a> {
    formulary: &'a Formulary,
    /// Names on the current descent path, root first.
    visiting: Vec<String>,
    seen: HashSet<String>,
    expanded: Vec<Arc<Formula>>,
}

impl<'a> Expander<'a> {
    fn new(formulary: &'a Formulary) -> Self {
        Self {
            formulary,
            visiting: Vec::new(),
            seen: HashSet::new(),
            expanded: Vec::new(),
        }
    }

    fn expand_children(&mut self, formula: &Formula) -> Result<()> {
        let deps = formula.dependencies();
        for dep in deps.expanded() {
            let child = self.formulary.factory(&dep.name)?;

            if let Some(pos) = self.visiting.iter().position(|n| *n == child.name) {
                let mut chain = self.visiting[pos..].to_vec();
                chain.push(child.name.clone());
                error!("Dependency cycle detected: {}", chain.join(" -> "));
                return Err(BndlError::DependencyError(format!(
                    "Dependency cycle detected: {}",
                    chain.join(" -> ")
                )));
            }
            if self.seen.contains(&child.name) {
                continue;
            }

            self.visiting.push(child.name.clone());
            self.expand_children(&child)?;
            self.visiting.pop();

            if self.seen.insert(child.name.clone()) {
                debug!("Expanded dependency '{}' of '{}'", child.name, formula.name);
                self.expanded.push(child);
            }
        }
        Ok(())
    }
}

/// Every dependency `formula` pulls in, each one listed after its own
/// dependencies. Optional and test dependencies are not followed.
pub fn recursive_dependencies(formulary: &Formulary, formula: &Formula) -> Result<Vec<Arc<Formula>>> {
    let mut expander = Expander::new(formulary);
    expander.visiting.push(formula.name.clone());
    expander.seen.insert(formula.name.clone());
    expander.expand_children(formula)?;
    Ok(expander.expanded)
}

/// Each named formula followed by its recursive dependencies, flattened;
/// a formula reached twice keeps its first position.
pub fn expand_bundle<S: AsRef<str>>(formulary: &Formulary, names: &[S]) -> Result<Vec<Arc<Formula>>> {
    let mut seen = HashSet::new();
    let mut deps = Vec::new();

    for name in names {
        let formula = formulary.factory(name.as_ref())?;
        let recursive = recursive_dependencies(formulary, &formula)?;
        for f in std::iter::once(formula).chain(recursive) {
            if seen.insert(f.name.clone()) {
                deps.push(f);
            }
        }
    }

    debug!(
        "Bundle dependencies: {:?}",
        deps.iter().map(|f| f.name.as_str()).collect::<Vec<_>>()
    );
    Ok(deps)
}

pub fn keg_only(deps: &[Arc<Formula>]) -> Vec<Arc<Formula>> {
    deps.iter().filter(|f| f.is_keg_only()).cloned().collect()
}
