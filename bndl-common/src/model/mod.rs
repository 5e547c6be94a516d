// bndl-common/src/model/mod.rs
pub mod formula;

pub use formula::{Formula, KegOnlyReason, UsesFromMacos};
