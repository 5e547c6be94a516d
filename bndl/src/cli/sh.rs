//! Contains the logic for the `sh` command.
use std::env;
use std::sync::Arc;

use bndl_common::cache::Cache;
use bndl_common::config::Config;
use bndl_common::error::Result;
use bndl_common::formulary::Formulary;
use bndl_core::bundle::BundleExec;
use colored::Colorize;

use super::{ensure_formula_cache, environment_snapshot, BrewfileArgs};

#[derive(clap::Args, Debug)]
pub struct Sh {
    #[command(flatten)]
    pub brewfile: BrewfileArgs,
}

impl Sh {
    pub async fn run(&self, config: &Config, cache: Arc<Cache>) -> Result<()> {
        let base_env = environment_snapshot();
        ensure_formula_cache(config, &cache, &base_env).await;

        let formulary = Formulary::new(config)?;
        let bundle = BundleExec::new(config, &formulary, base_env, env::current_dir()?);
        let plan = bundle.prepare_shell(self.brewfile.global, self.brewfile.file.as_deref())?;

        eprintln!(
            "{}{}",
            "==> ".bold().blue(),
            format!("Starting {} in the Brewfile environment (exit to leave)", plan.arg0).bold()
        );
        Err(plan.exec())
    }
}
