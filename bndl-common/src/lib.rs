// bndl-common/src/lib.rs
pub mod brewfile;
pub mod cache;
pub mod config;
pub mod dependency;
pub mod error;
pub mod formulary;
pub mod keg;
pub mod model;

// Re-export key types
pub use brewfile::{Brewfile, BrewfileSource, Entry, EntryKind};
pub use cache::Cache;
pub use config::Config;
pub use error::{BndlError, Result};
pub use formulary::Formulary;
pub use keg::{InstalledKeg, KegRegistry};
pub use model::Formula;
