// bndl-core/src/build/env.rs
//
// Superenv-like build environment: starts from a snapshot of the caller's
// environment, drops compiler pollution, and points every build tool at the
// prefix and the bundle's dependencies.

use std::collections::{BTreeMap, HashMap};
use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use bndl_common::config::Config;
use bndl_common::dependency::keg_only;
use bndl_common::error::{BndlError, Result};
use bndl_common::model::formula::Formula;
use tracing::{debug, warn};

use super::devtools;
use super::refurbish::{refurbish_flags, FLAG_VARS};

/// Variables removed from the snapshot before anything is set.
pub const SANITIZED_VARS: &[&str] = &[
    "CDPATH",
    "CLICOLOR_FORCE",
    "CPATH",
    "C_INCLUDE_PATH",
    "CPLUS_INCLUDE_PATH",
    "OBJC_INCLUDE_PATH",
    "CC",
    "CXX",
    "OBJC",
    "OBJCXX",
    "CPP",
    "MAKE",
    "LD",
    "LDSHARED",
    "CFLAGS",
    "CXXFLAGS",
    "OBJCFLAGS",
    "OBJCXXFLAGS",
    "LDFLAGS",
    "CPPFLAGS",
    "MACOSX_DEPLOYMENT_TARGET",
    "SDKROOT",
    "DEVELOPER_DIR",
    "CMAKE_PREFIX_PATH",
    "CMAKE_INCLUDE_PATH",
    "CMAKE_FRAMEWORK_PATH",
    "GOBIN",
    "GOPATH",
    "GOROOT",
    "PERL_MB_OPT",
    "PERL_MM_OPT",
    "LIBRARY_PATH",
    "LD_LIBRARY_PATH",
    "LD_PRELOAD",
    "LD_RUN_PATH",
    "RUSTFLAGS",
];

/// Always last on `PATH`; never prepended.
pub const SYSTEM_PATH_DIRS: &[&str] = &["/usr/bin", "/bin", "/usr/sbin", "/sbin"];

const BASE_OPT_FLAGS: &str = "-Os -w -pipe";

#[derive(Debug, Clone)]
pub struct BuildEnvironment {
    vars: BTreeMap<String, String>,
}

impl BuildEnvironment {
    /// Builds the environment for `deps` (the expanded bundle) on top of
    /// `base_env`.
    pub fn setup(
        config: &Config,
        deps: &[Arc<Formula>],
        base_env: &HashMap<String, String>,
    ) -> Result<Self> {
        let keg_only_deps = keg_only(deps);
        debug!(
            "Setting up build environment for {} dependencies ({} keg-only)",
            deps.len(),
            keg_only_deps.len()
        );

        let vars: BTreeMap<String, String> = base_env
            .iter()
            .filter(|(key, _)| !SANITIZED_VARS.contains(&key.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for key in SANITIZED_VARS {
            if base_env.contains_key(*key) {
                debug!("Removed {key} from build environment");
            }
        }

        let mut build_env = Self { vars };

        build_env.set_path_list_var("PATH", &Self::path_dirs(config, deps), true)?;

        build_env.set_var("HOMEBREW_PREFIX", config.prefix().display().to_string());
        build_env.set_var("HOMEBREW_CELLAR", config.cellar_dir().display().to_string());
        build_env.set_var("HOMEBREW_DEPENDENCIES", join_names(deps));
        build_env.set_var("HOMEBREW_KEG_ONLY_DEPENDENCIES", join_names(&keg_only_deps));

        let jobs = base_env
            .get("HOMEBREW_MAKE_JOBS")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|jobs| *jobs > 0)
            .unwrap_or_else(num_cpus::get);
        build_env.set_var("MAKEFLAGS", format!("-j{jobs}"));

        build_env.setup_compilers(base_env);
        build_env.setup_flags(config, &keg_only_deps);
        build_env.setup_search_paths(config, &keg_only_deps)?;

        Ok(build_env)
    }

    fn path_dirs(config: &Config, deps: &[Arc<Formula>]) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        for dep in deps {
            dirs.push(dep.opt_bin(config));
            dirs.push(dep.opt_sbin(config));
        }
        dirs.push(config.bin_dir());
        dirs.push(config.sbin_dir());

        let mut path_dirs: Vec<PathBuf> = Vec::new();
        for dir in dirs {
            if dir.is_dir() && !path_dirs.contains(&dir) && !is_system_dir(&dir) {
                path_dirs.push(dir);
            }
        }
        path_dirs.extend(SYSTEM_PATH_DIRS.iter().map(PathBuf::from));
        path_dirs
    }

    fn setup_compilers(&mut self, base_env: &HashMap<String, String>) {
        let cc_name = base_env
            .get("HOMEBREW_CC")
            .filter(|cc| !cc.is_empty())
            .cloned()
            .unwrap_or_else(|| devtools::default_compiler().to_string());
        let search_path = base_env.get("PATH").map(OsStr::new);

        let Some(cc) = devtools::find_compiler(&cc_name, search_path) else {
            warn!("Could not find compiler '{cc_name}'; CC and CXX are left unset");
            return;
        };
        let cxx_name = devtools::cxx_for(&cc_name);
        let cxx = devtools::find_compiler(&cxx_name, search_path);

        let cc = cc.display().to_string();
        self.set_var("CC", cc.clone());
        self.set_var("HOMEBREW_CC", cc);
        match cxx {
            Some(cxx) => {
                let cxx = cxx.display().to_string();
                self.set_var("CXX", cxx.clone());
                self.set_var("HOMEBREW_CXX", cxx);
            }
            None => warn!("Could not find C++ compiler '{cxx_name}'; CXX is left unset"),
        }
    }

    fn setup_flags(&mut self, config: &Config, keg_only_deps: &[Arc<Formula>]) {
        let cflags = match devtools::get_arch_flag() {
            Some(arch) => format!("{BASE_OPT_FLAGS} {arch}"),
            None => BASE_OPT_FLAGS.to_string(),
        };
        for key in ["CFLAGS", "CXXFLAGS", "OBJCFLAGS", "OBJCXXFLAGS"] {
            self.set_var(key, cflags.clone());
        }

        let cppflags = keg_only_deps
            .iter()
            .map(|dep| dep.opt_include(config))
            .chain(std::iter::once(config.include_dir()))
            .map(|dir| format!("-I{}", dir.display()))
            .collect::<Vec<_>>()
            .join(" ");
        self.set_var("CPPFLAGS", cppflags);

        let ldflags = keg_only_deps
            .iter()
            .map(|dep| dep.opt_lib(config))
            .chain(std::iter::once(config.lib_dir()))
            .map(|dir| format!("-L{}", dir.display()))
            .collect::<Vec<_>>()
            .join(" ");
        self.set_var("LDFLAGS", ldflags);

        if let Some(sdk) = devtools::find_sdk_path() {
            self.set_var("SDKROOT", sdk.display().to_string());
        }
        if let Some(version) = devtools::get_macos_version() {
            self.set_var("MACOSX_DEPLOYMENT_TARGET", version);
        }
    }

    fn setup_search_paths(&mut self, config: &Config, keg_only_deps: &[Arc<Formula>]) -> Result<()> {
        let roots: Vec<PathBuf> = keg_only_deps
            .iter()
            .map(|dep| dep.opt_path(config))
            .chain(std::iter::once(config.prefix().to_path_buf()))
            .collect();

        let under = |subdirs: &[&str]| -> Vec<PathBuf> {
            roots
                .iter()
                .flat_map(|root| subdirs.iter().map(move |sub| root.join(sub)))
                .collect()
        };

        self.set_path_list_var(
            "PKG_CONFIG_PATH",
            &under(&["lib/pkgconfig", "share/pkgconfig"]),
            false,
        )?;
        self.set_path_list_var("ACLOCAL_PATH", &under(&["share/aclocal"]), false)?;
        self.set_path_list_var("CMAKE_PREFIX_PATH", &roots, false)?;
        self.set_path_list_var("CMAKE_INCLUDE_PATH", &under(&["include"]), false)?;
        self.set_path_list_var("CMAKE_LIBRARY_PATH", &under(&["lib"]), false)?;
        Ok(())
    }

    /// Joins the existing directories of `paths` into `name`. With
    /// `keep_missing` every entry is kept as given.
    fn set_path_list_var(&mut self, name: &str, paths: &[PathBuf], keep_missing: bool) -> Result<()> {
        let existing: Vec<&Path> = paths
            .iter()
            .filter(|p| keep_missing || p.is_dir())
            .map(PathBuf::as_path)
            .collect();
        if existing.is_empty() {
            debug!("No directories found for {name}, leaving it unset");
            self.vars.remove(name);
            return Ok(());
        }
        let joined = env::join_paths(existing)
            .map_err(|e| BndlError::BuildEnvError(format!("Failed to join paths for {name}: {e}")))?
            .into_string()
            .map_err(|os_str| {
                BndlError::BuildEnvError(format!("{name} contains non-UTF8 characters: {os_str:?}"))
            })?;
        self.set_var(name, joined);
        Ok(())
    }

    pub fn set_var(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        debug!("Setting {key}={value}");
        self.vars.insert(key.to_string(), value);
    }

    /// Puts `dir` at the front of the colon separated list in `key`.
    /// System directories and paths that are not directories are ignored.
    pub fn prepend_path(&mut self, key: &str, dir: &Path) {
        if is_system_dir(dir) || !dir.is_dir() {
            debug!("Not prepending {} to {key}", dir.display());
            return;
        }
        let dir_str = dir.display().to_string();
        let rest: Vec<&str> = self
            .vars
            .get(key)
            .map(|old| {
                old.split(':')
                    .filter(|entry| !entry.is_empty() && *entry != dir_str)
                    .collect()
            })
            .unwrap_or_default();

        let value = if rest.is_empty() {
            dir_str
        } else {
            format!("{dir_str}:{}", rest.join(":"))
        };
        self.set_var(key, value);
    }

    /// Strips optimization, debug and tuning flags so build scripts run in
    /// this environment choose their own.
    pub fn refurbish_args(&mut self) {
        let mut cccfg = self.get_var("HOMEBREW_CCCFG").unwrap_or_default().to_string();
        if !cccfg.contains('O') {
            cccfg.push('O');
        }
        self.set_var("HOMEBREW_CCCFG", cccfg);

        for key in FLAG_VARS {
            let Some(value) = self.vars.get(*key).cloned() else {
                continue;
            };
            let refurbished = refurbish_flags(&value);
            if refurbished.is_empty() {
                debug!("Removing empty {key}");
                self.vars.remove(*key);
            } else if refurbished != value {
                self.set_var(*key, refurbished);
            }
        }
    }

    /// Replaces the environment of `command` with this one.
    pub fn apply_to_command(&self, command: &mut Command) {
        command.env_clear();
        command.envs(&self.vars);
    }

    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    /// `export KEY="VALUE"` lines, sorted by key, quoted for POSIX shells.
    pub fn export_lines(&self) -> Vec<String> {
        self.vars
            .iter()
            .map(|(key, value)| format!("export {key}=\"{}\"", shell_escape(value)))
            .collect()
    }
}

fn is_system_dir(dir: &Path) -> bool {
    SYSTEM_PATH_DIRS.iter().any(|sys| dir == Path::new(sys))
}

fn join_names(formulae: &[Arc<Formula>]) -> String {
    formulae
        .iter()
        .map(|f| f.name.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

fn shell_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '"' | '$' | '`') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
