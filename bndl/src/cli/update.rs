//! Contains the logic for the `update` command.
use std::sync::Arc;

use bndl_common::cache::Cache;
use bndl_common::config::Config;
use bndl_common::error::Result;
use bndl_net::api;
use colored::Colorize;
use tracing::{debug, error};

#[derive(clap::Args, Debug)]
pub struct Update;

impl Update {
    pub async fn run(&self, config: &Config, cache: Arc<Cache>) -> Result<()> {
        debug!("Using cache directory: {}", cache.get_dir().display());
        println!("{}{}", "==> ".bold().blue(), "Updating formula data".bold());

        if let Err(e) = api::update_formula_cache(config, &cache).await {
            error!("Failed to fetch/store formulas from API: {e}");
            return Err(e);
        }

        println!("Update completed successfully!");
        Ok(())
    }
}
