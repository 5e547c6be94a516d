pub mod definition;
pub mod resolver;

pub use definition::{Dependency, DependencyExt, DependencyTag};
pub use resolver::{expand_bundle, keg_only, recursive_dependencies};
