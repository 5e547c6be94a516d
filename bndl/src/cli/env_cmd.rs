//! Contains the logic for the `env` command.
use std::env;
use std::sync::Arc;

use bndl_common::cache::Cache;
use bndl_common::config::Config;
use bndl_common::error::Result;
use bndl_common::formulary::Formulary;
use bndl_core::bundle::BundleExec;

use super::{ensure_formula_cache, environment_snapshot, BrewfileArgs};

#[derive(clap::Args, Debug)]
pub struct Env {
    #[command(flatten)]
    pub brewfile: BrewfileArgs,
}

impl Env {
    pub async fn run(&self, config: &Config, cache: Arc<Cache>) -> Result<()> {
        let base_env = environment_snapshot();
        ensure_formula_cache(config, &cache, &base_env).await;

        let formulary = Formulary::new(config)?;
        let bundle = BundleExec::new(config, &formulary, base_env, env::current_dir()?);
        let build_env =
            bundle.environment(self.brewfile.global, self.brewfile.file.as_deref())?;

        for line in build_env.export_lines() {
            println!("{line}");
        }
        Ok(())
    }
}
