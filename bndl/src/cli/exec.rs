//! Contains the logic for the `exec` command.
use std::env;
use std::sync::Arc;

use bndl_common::cache::Cache;
use bndl_common::config::Config;
use bndl_common::error::Result;
use bndl_common::formulary::Formulary;
use bndl_core::bundle::BundleExec;
use tracing::debug;

use super::{ensure_formula_cache, environment_snapshot, BrewfileArgs};

#[derive(clap::Args, Debug)]
pub struct Exec {
    #[command(flatten)]
    pub brewfile: BrewfileArgs,

    /// Command to run, followed by its arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    pub args: Vec<String>,
}

impl Exec {
    pub async fn run(&self, config: &Config, cache: Arc<Cache>) -> Result<()> {
        let base_env = environment_snapshot();
        ensure_formula_cache(config, &cache, &base_env).await;

        let formulary = Formulary::new(config)?;
        let bundle = BundleExec::new(config, &formulary, base_env, env::current_dir()?);
        let plan = bundle.prepare(
            &self.args,
            self.brewfile.global,
            self.brewfile.file.as_deref(),
        )?;

        debug!("Exec plan: {} {:?}", plan.program.display(), plan.args);
        Err(plan.exec())
    }
}
