// bndl/src/cli.rs
//! Command-line argument structure.
use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use bndl_common::cache::FORMULA_CACHE_FILE;
use bndl_common::error::Result;
use bndl_common::{Cache, Config};
use clap::{ArgAction, Parser, Subcommand};
use tracing::{debug, info, warn};

pub mod env_cmd;
pub mod exec;
pub mod sh;
pub mod update;

use crate::cli::env_cmd::Env;
use crate::cli::exec::Exec;
use crate::cli::sh::Sh;
use crate::cli::update::Update;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "bndl", bin_name = "bndl")]
#[command(propagate_version = true)]
pub struct CliArgs {
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a command in the environment of the Brewfile's formulae
    Exec(Exec),
    /// Print the Brewfile environment as shell exports
    Env(Env),
    /// Start an interactive shell in the Brewfile environment
    Sh(Sh),
    /// Fetch the latest formula data
    Update(Update),
}

impl Command {
    pub async fn run(&self, config: &Config, cache: Arc<Cache>) -> Result<()> {
        match self {
            Self::Exec(command) => command.run(config, cache).await,
            Self::Env(command) => command.run(config, cache).await,
            Self::Sh(command) => command.run(config, cache).await,
            Self::Update(command) => command.run(config, cache).await,
        }
    }
}

/// Which Brewfile to read.
#[derive(clap::Args, Debug)]
pub struct BrewfileArgs {
    /// Use the global Brewfile (`~/.Brewfile`)
    #[arg(long, conflicts_with = "file")]
    pub global: bool,

    /// Read the Brewfile from this path (`-` for standard input)
    #[arg(long, value_name = "PATH")]
    pub file: Option<String>,
}

/// The environment as seen at startup. Entries that are not valid UTF-8
/// are left out.
pub fn environment_snapshot() -> HashMap<String, String> {
    env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect()
}

/// Fetches `formula.json` when it has never been downloaded. Failures are
/// logged; installed kegs still resolve without it.
pub async fn ensure_formula_cache(config: &Config, cache: &Cache, env: &HashMap<String, String>) {
    if cache.exists(FORMULA_CACHE_FILE) {
        return;
    }
    if env
        .get("HOMEBREW_NO_AUTO_UPDATE")
        .is_some_and(|v| !v.is_empty())
    {
        debug!("No formula data cached and HOMEBREW_NO_AUTO_UPDATE is set; skipping fetch");
        return;
    }
    info!("Fetching formula data...");
    if let Err(e) = bndl_net::update_formula_cache(config, cache).await {
        warn!("Could not fetch formula data: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(args).unwrap()
    }

    #[test]
    fn exec_collects_command_after_separator() {
        let cli = parse(&["bndl", "-vv", "exec", "--file", "Brewfile.dev", "--", "make", "-j4"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Exec(exec) => {
                assert_eq!(exec.brewfile.file.as_deref(), Some("Brewfile.dev"));
                assert!(!exec.brewfile.global);
                assert_eq!(exec.args, vec!["make", "-j4"]);
            }
            other => panic!("expected exec, got {other:?}"),
        }
    }

    #[test]
    fn exec_accepts_hyphenated_command_arguments_without_separator() {
        match parse(&["bndl", "exec", "cargo", "--version"]).command {
            Command::Exec(exec) => assert_eq!(exec.args, vec!["cargo", "--version"]),
            other => panic!("expected exec, got {other:?}"),
        }
    }

    #[test]
    fn exec_without_command_parses_to_empty_args() {
        match parse(&["bndl", "exec"]).command {
            Command::Exec(exec) => assert!(exec.args.is_empty()),
            other => panic!("expected exec, got {other:?}"),
        }
    }

    #[test]
    fn global_and_file_conflict() {
        assert!(CliArgs::try_parse_from(["bndl", "env", "--global", "--file", "x"]).is_err());
    }

    mod formula_cache {
        use super::*;
        use std::path::Path;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        fn config(base: &str, root: &Path) -> Config {
            Config {
                prefix: root.join("prefix"),
                api_base_url: base.to_string(),
                cache_dir: root.join("cache"),
                home: root.to_path_buf(),
                github_api_token: None,
            }
        }

        fn env_with(pairs: &[(&str, &str)]) -> HashMap<String, String> {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        }

        async fn server(status: u16, body: &str, expected_calls: u64) -> MockServer {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/formula.json"))
                .respond_with(ResponseTemplate::new(status).set_body_string(body))
                .expect(expected_calls)
                .mount(&server)
                .await;
            server
        }

        #[tokio::test]
        async fn missing_cache_is_fetched_once() {
            let server = server(200, r#"[{"name":"jq"}]"#, 1).await;
            let root = tempfile::tempdir().unwrap();
            let config = config(&server.uri(), root.path());
            let cache = Cache::new(&config).unwrap();

            ensure_formula_cache(&config, &cache, &HashMap::new()).await;
            ensure_formula_cache(&config, &cache, &HashMap::new()).await;

            assert_eq!(
                cache.load_raw(FORMULA_CACHE_FILE).unwrap(),
                r#"[{"name":"jq"}]"#
            );
        }

        #[tokio::test]
        async fn no_auto_update_skips_fetch() {
            let server = server(200, "[]", 0).await;
            let root = tempfile::tempdir().unwrap();
            let config = config(&server.uri(), root.path());
            let cache = Cache::new(&config).unwrap();

            ensure_formula_cache(&config, &cache, &env_with(&[("HOMEBREW_NO_AUTO_UPDATE", "1")]))
                .await;

            assert!(!cache.exists(FORMULA_CACHE_FILE));
        }

        #[tokio::test]
        async fn existing_cache_is_left_alone() {
            let server = server(200, "[]", 0).await;
            let root = tempfile::tempdir().unwrap();
            let config = config(&server.uri(), root.path());
            let cache = Cache::new(&config).unwrap();
            cache.store_raw(FORMULA_CACHE_FILE, "[{\"name\":\"old\"}]").unwrap();

            ensure_formula_cache(&config, &cache, &HashMap::new()).await;

            assert_eq!(
                cache.load_raw(FORMULA_CACHE_FILE).unwrap(),
                "[{\"name\":\"old\"}]"
            );
        }

        #[tokio::test]
        async fn fetch_failure_leaves_cache_empty() {
            let server = server(500, "boom", 1).await;
            let root = tempfile::tempdir().unwrap();
            let config = config(&server.uri(), root.path());
            let cache = Cache::new(&config).unwrap();

            ensure_formula_cache(&config, &cache, &HashMap::new()).await;

            assert!(!cache.exists(FORMULA_CACHE_FILE));
        }
    }

    #[test]
    fn snapshot_contains_process_path() {
        let snapshot = environment_snapshot();
        assert_eq!(snapshot.get("PATH").cloned(), env::var("PATH").ok());
    }
}
