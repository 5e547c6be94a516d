// bndl-common/src/model/formula.rs
// Formula definitions as published by the Homebrew formulae API.

use std::path::PathBuf;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::config::Config;
use crate::dependency::{Dependency, DependencyTag};

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct FormulaVersions {
    pub stable: Option<String>,
    #[serde(default)]
    pub head: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct KegOnlyReason {
    pub reason: String,
    #[serde(default)]
    pub explanation: String,
}

/// One `uses_from_macos` item: either a plain name or `{ "name": tag(s) }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsesFromMacos {
    pub name: String,
    pub tags: DependencyTag,
}

impl<'de> Deserialize<'de> for UsesFromMacos {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::String(name) => Ok(Self {
                name,
                tags: DependencyTag::RUNTIME,
            }),
            Value::Object(map) => {
                let (name, tag_value) = map
                    .into_iter()
                    .next()
                    .ok_or_else(|| serde::de::Error::custom("empty uses_from_macos object"))?;
                let tags = match tag_value {
                    Value::String(tag) => DependencyTag::from_uses_from_macos(&tag),
                    Value::Array(items) => items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(DependencyTag::from_uses_from_macos)
                        .fold(DependencyTag::empty(), |acc, t| acc | t),
                    _ => DependencyTag::RUNTIME,
                };
                Ok(Self { name, tags })
            }
            other => Err(serde::de::Error::custom(format!(
                "unexpected uses_from_macos entry: {other}"
            ))),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Formula {
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub versions: FormulaVersions,
    #[serde(default)]
    pub revision: u32,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub oldnames: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub build_dependencies: Vec<String>,
    #[serde(default)]
    pub test_dependencies: Vec<String>,
    #[serde(default)]
    pub recommended_dependencies: Vec<String>,
    #[serde(default)]
    pub optional_dependencies: Vec<String>,
    #[serde(default)]
    pub uses_from_macos: Vec<UsesFromMacos>,
    #[serde(default, deserialize_with = "deserialize_keg_only")]
    pub keg_only: bool,
    #[serde(default)]
    pub keg_only_reason: Option<KegOnlyReason>,
}

impl Formula {
    /// Builds a formula from an installed keg's receipt when the API data
    /// does not know it (e.g. third-party taps).
    pub fn from_installed(
        name: &str,
        version: &str,
        runtime_dependencies: Vec<String>,
        keg_only: bool,
    ) -> Self {
        Self {
            name: name.to_string(),
            full_name: name.to_string(),
            versions: FormulaVersions {
                stable: Some(version.to_string()),
                head: None,
            },
            revision: 0,
            desc: None,
            aliases: Vec::new(),
            oldnames: Vec::new(),
            dependencies: runtime_dependencies,
            build_dependencies: Vec::new(),
            test_dependencies: Vec::new(),
            recommended_dependencies: Vec::new(),
            optional_dependencies: Vec::new(),
            uses_from_macos: Vec::new(),
            keg_only,
            keg_only_reason: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_keg_only(&self) -> bool {
        self.keg_only || self.keg_only_reason.is_some()
    }

    /// Full version string including revision (e.g. "1.2.3_1").
    pub fn version_str_full(&self) -> String {
        let stable = self.versions.stable.as_deref().unwrap_or("HEAD");
        if self.revision > 0 {
            format!("{stable}_{}", self.revision)
        } else {
            stable.to_string()
        }
    }

    /// All declared dependencies with their tags. `uses_from_macos` only
    /// turns into real dependencies off macOS.
    pub fn dependencies(&self) -> Vec<Dependency> {
        let mut deps: Vec<Dependency> = Vec::new();
        let mut push = |name: &str, tags: DependencyTag| {
            if let Some(existing) = deps.iter_mut().find(|d| d.name == name) {
                existing.tags |= tags;
            } else {
                deps.push(Dependency::new_with_tags(name, tags));
            }
        };

        for name in &self.dependencies {
            push(name, DependencyTag::RUNTIME);
        }
        for name in &self.build_dependencies {
            push(name, DependencyTag::BUILD);
        }
        for name in &self.recommended_dependencies {
            push(name, DependencyTag::RECOMMENDED);
        }
        for name in &self.optional_dependencies {
            push(name, DependencyTag::OPTIONAL);
        }
        for name in &self.test_dependencies {
            push(name, DependencyTag::TEST);
        }
        if !cfg!(target_os = "macos") {
            for uses in &self.uses_from_macos {
                push(&uses.name, uses.tags);
            }
        }
        deps
    }

    pub fn opt_path(&self, config: &Config) -> PathBuf {
        config.formula_opt_path(&self.name)
    }

    pub fn opt_bin(&self, config: &Config) -> PathBuf {
        self.opt_path(config).join("bin")
    }

    pub fn opt_sbin(&self, config: &Config) -> PathBuf {
        self.opt_path(config).join("sbin")
    }

    pub fn opt_include(&self, config: &Config) -> PathBuf {
        self.opt_path(config).join("include")
    }

    pub fn opt_lib(&self, config: &Config) -> PathBuf {
        self.opt_path(config).join("lib")
    }
}

fn deserialize_keg_only<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(matches!(Value::deserialize(deserializer)?, Value::Bool(true)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPENSSL_JSON: &str = r#"{
        "name": "openssl@3",
        "full_name": "openssl@3",
        "aliases": ["openssl"],
        "versions": { "stable": "3.3.1", "head": null, "bottle": true },
        "revision": 2,
        "dependencies": ["ca-certificates"],
        "build_dependencies": [],
        "test_dependencies": [],
        "recommended_dependencies": [],
        "optional_dependencies": [],
        "uses_from_macos": ["zlib", { "perl": "build" }],
        "keg_only": true,
        "keg_only_reason": { "reason": ":shadowed_by_macos", "explanation": "" }
    }"#;

    #[test]
    fn deserializes_api_formula() {
        let formula: Formula = serde_json::from_str(OPENSSL_JSON).unwrap();
        assert_eq!(formula.name(), "openssl@3");
        assert!(formula.is_keg_only());
        assert_eq!(formula.version_str_full(), "3.3.1_2");
        assert_eq!(formula.aliases, vec!["openssl"]);
        assert_eq!(
            formula.uses_from_macos[1],
            UsesFromMacos {
                name: "perl".to_string(),
                tags: DependencyTag::BUILD
            }
        );
    }

    #[test]
    fn keg_only_defaults_to_false() {
        let formula: Formula =
            serde_json::from_str(r#"{ "name": "jq", "versions": { "stable": "1.7.1" } }"#).unwrap();
        assert!(!formula.is_keg_only());
        assert_eq!(formula.version_str_full(), "1.7.1");
        assert!(formula.dependencies().is_empty());
    }

    #[test]
    fn dependencies_merge_tags_for_repeated_names() {
        let formula: Formula = serde_json::from_str(
            r#"{ "name": "x", "dependencies": ["a"], "build_dependencies": ["a", "b"] }"#,
        )
        .unwrap();

        let deps = formula.dependencies();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].tags, DependencyTag::RUNTIME | DependencyTag::BUILD);
        assert_eq!(deps[1].tags, DependencyTag::BUILD);
    }

    #[test]
    fn uses_from_macos_counts_only_off_macos() {
        let formula: Formula = serde_json::from_str(OPENSSL_JSON).unwrap();
        let names: Vec<_> = formula.dependencies().into_iter().map(|d| d.name).collect();
        if cfg!(target_os = "macos") {
            assert_eq!(names, vec!["ca-certificates"]);
        } else {
            assert_eq!(names, vec!["ca-certificates", "zlib", "perl"]);
        }
    }

    #[test]
    fn opt_paths_follow_the_prefix() {
        let config = Config {
            prefix: PathBuf::from("/opt/homebrew"),
            api_base_url: String::new(),
            cache_dir: PathBuf::from("/tmp"),
            home: PathBuf::from("/tmp"),
            github_api_token: None,
        };
        let formula = Formula::from_installed("libpq", "16.3", Vec::new(), true);
        assert_eq!(
            formula.opt_bin(&config),
            PathBuf::from("/opt/homebrew/opt/libpq/bin")
        );
        assert_eq!(
            formula.opt_include(&config),
            PathBuf::from("/opt/homebrew/opt/libpq/include")
        );
    }
}
