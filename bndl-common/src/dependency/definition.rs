use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct DependencyTag: u8 {
        const RUNTIME     = 0b00000001;
        const BUILD       = 0b00000010;
        const TEST        = 0b00000100;
        const OPTIONAL    = 0b00001000;
        const RECOMMENDED = 0b00010000;
    }
}

impl DependencyTag {
    /// Tags pulled into a bundle environment. Optional and test-only
    /// dependencies are never requested by a Brewfile entry.
    pub const EXPANDED: Self = Self::RUNTIME
        .union(Self::BUILD)
        .union(Self::RECOMMENDED);

    pub fn from_uses_from_macos(tag: &str) -> Self {
        match tag {
            "build" => Self::BUILD,
            "test" => Self::TEST,
            "optional" => Self::OPTIONAL,
            "recommended" => Self::RECOMMENDED,
            _ => Self::RUNTIME,
        }
    }
}

impl Default for DependencyTag {
    fn default() -> Self {
        Self::RUNTIME
    }
}

impl fmt::Display for DependencyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    #[serde(default)]
    pub tags: DependencyTag,
}

impl Dependency {
    pub fn new_runtime(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: DependencyTag::RUNTIME,
        }
    }

    pub fn new_with_tags(name: impl Into<String>, tags: DependencyTag) -> Self {
        Self {
            name: name.into(),
            tags,
        }
    }

    /// Followed during expansion unless its only tags are optional or test.
    pub fn is_expanded(&self) -> bool {
        self.tags.intersects(DependencyTag::EXPANDED)
    }
}

pub trait DependencyExt {
    fn expanded(&self) -> Vec<&Dependency>;
}

impl DependencyExt for Vec<Dependency> {
    fn expanded(&self) -> Vec<&Dependency> {
        self.iter().filter(|dep| dep.is_expanded()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expanded_skips_optional_and_test() {
        let deps = vec![
            Dependency::new_runtime("zlib"),
            Dependency::new_with_tags("cmake", DependencyTag::BUILD),
            Dependency::new_with_tags("gettext", DependencyTag::RECOMMENDED),
            Dependency::new_with_tags("docbook", DependencyTag::OPTIONAL),
            Dependency::new_with_tags("bats", DependencyTag::TEST),
            Dependency::new_with_tags("python", DependencyTag::BUILD | DependencyTag::TEST),
            Dependency::new_with_tags(
                "sphinx",
                DependencyTag::OPTIONAL | DependencyTag::TEST,
            ),
        ];

        let names: Vec<_> = deps.expanded().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["zlib", "cmake", "gettext", "python"]);
    }

    #[test]
    fn uses_from_macos_tags_map_to_flags() {
        assert_eq!(DependencyTag::from_uses_from_macos("build"), DependencyTag::BUILD);
        assert_eq!(DependencyTag::from_uses_from_macos("linked"), DependencyTag::RUNTIME);
    }
}
