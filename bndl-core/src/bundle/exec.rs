// bndl-core/src/bundle/exec.rs
//
// Runs a command inside the environment described by a Brewfile: the
// bundle's formulae and their dependencies on PATH and in the compiler
// search paths.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use bndl_common::brewfile::Brewfile;
use bndl_common::config::Config;
use bndl_common::dependency::expand_bundle;
use bndl_common::error::{BndlError, Result};
use bndl_common::formulary::Formulary;
use tracing::{debug, info};

use crate::build::BuildEnvironment;

/// Formulae whose shims directory goes on PATH when bundled.
pub const VERSION_MANAGER_FORMULAE: &[&str] = &["nodenv", "pyenv", "rbenv"];

/// Marker set in shells started by `bndl sh`.
pub const SHELL_MARKER_VAR: &str = "BNDL_SH";

const DEFAULT_SHELL: &str = "/bin/bash";

/// A resolved program ready to replace the current process.
#[derive(Debug, Clone)]
pub struct ExecPlan {
    pub program: PathBuf,
    /// `argv[0]` exactly as the user typed it.
    pub arg0: String,
    pub args: Vec<String>,
    pub env: BuildEnvironment,
}

impl ExecPlan {
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.arg0(&self.arg0);
        }
        self.env.apply_to_command(&mut cmd);
        cmd
    }

    /// Replaces the current process with the planned command. Only returns
    /// when the exec itself failed.
    #[cfg(unix)]
    pub fn exec(self) -> BndlError {
        use std::os::unix::process::CommandExt;

        info!("Executing {}", self.program.display());
        let err = self.command().exec();
        BndlError::CommandExecError(format!("{}: {err}", self.program.display()))
    }

    #[cfg(not(unix))]
    pub fn exec(self) -> BndlError {
        BndlError::CommandExecError(format!(
            "{}: replacing the current process is only supported on unix",
            self.program.display()
        ))
    }
}

pub struct BundleExec<'a> {
    config: &'a Config,
    formulary: &'a Formulary,
    base_env: HashMap<String, String>,
    cwd: PathBuf,
}

impl<'a> BundleExec<'a> {
    /// `base_env` is the environment snapshot everything is derived from;
    /// the process environment itself is never read or modified.
    pub fn new(
        config: &'a Config,
        formulary: &'a Formulary,
        base_env: HashMap<String, String>,
        cwd: PathBuf,
    ) -> Self {
        Self {
            config,
            formulary,
            base_env,
            cwd,
        }
    }

    pub fn prepare(&self, args: &[String], global: bool, file: Option<&str>) -> Result<ExecPlan> {
        let Some((command, rest)) = args.split_first() else {
            return Err(BndlError::Usage(
                "No command to execute was specified!".to_string(),
            ));
        };

        // The rebuilt PATH would otherwise hide a command found on the
        // caller's PATH.
        let command_dir = if command.contains('/') {
            None
        } else {
            let found = self
                .which(command, self.base_env.get("PATH").map(String::as_str))
                .ok_or_else(|| BndlError::CommandNotFound(command.clone()))?;
            debug!("Resolved '{}' to {}", command, found.display());
            found.parent().map(Path::to_path_buf)
        };

        let mut env = self.environment(global, file)?;
        if let Some(dir) = &command_dir {
            env.prepend_path("PATH", dir);
        }

        let program = self.resolve_program(command, &env)?;
        Ok(ExecPlan {
            program,
            arg0: command.clone(),
            args: rest.to_vec(),
            env,
        })
    }

    /// Plan for an interactive `$SHELL` inside the bundle environment.
    pub fn prepare_shell(&self, global: bool, file: Option<&str>) -> Result<ExecPlan> {
        let shell = self
            .base_env
            .get("SHELL")
            .filter(|s| !s.is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_SHELL.to_string());

        let mut env = self.environment(global, file)?;
        env.set_var(SHELL_MARKER_VAR, "1");

        let program = self.resolve_program(&shell, &env)?;
        Ok(ExecPlan {
            program,
            arg0: shell,
            args: Vec::new(),
            env,
        })
    }

    /// The bundle environment for the selected Brewfile.
    pub fn environment(&self, global: bool, file: Option<&str>) -> Result<BuildEnvironment> {
        let brewfile = Brewfile::read(self.config, global, file, &self.base_env)?;
        let brews = brewfile.brews();
        debug!(
            "Brewfile {} lists {} formulae",
            brewfile.path.display(),
            brews.len()
        );

        let deps = expand_bundle(self.formulary, &brews)?;
        let mut env = BuildEnvironment::setup(self.config, &deps, &self.base_env)?;
        env.refurbish_args();

        for dep in &deps {
            if VERSION_MANAGER_FORMULAE.contains(&dep.name.as_str()) {
                let root = self.version_manager_root(&dep.name);
                env.prepend_path("PATH", &root.join("shims"));
            }
        }

        let pkg_config = self.formulary.canonical_name("pkg-config");
        if self
            .formulary
            .keg_registry()
            .any_version_installed(&pkg_config)
        {
            env.prepend_path("PATH", &self.config.formula_opt_path(&pkg_config).join("bin"));
        }

        Ok(env)
    }

    fn version_manager_root(&self, name: &str) -> PathBuf {
        let key = format!("HOMEBREW_{}_ROOT", name.to_uppercase());
        match self.base_env.get(&key).filter(|v| !v.is_empty()) {
            Some(root) => PathBuf::from(root),
            None => self.config.home_dir().join(format!(".{name}")),
        }
    }

    fn resolve_program(&self, command: &str, env: &BuildEnvironment) -> Result<PathBuf> {
        if command.contains('/') {
            return Ok(PathBuf::from(command));
        }
        self.which(command, env.get_var("PATH"))
            .ok_or_else(|| BndlError::CommandNotFound(command.to_string()))
    }

    fn which(&self, command: &str, path: Option<&str>) -> Option<PathBuf> {
        which::which_in(command, path.map(OsStr::new), &self.cwd).ok()
    }
}
