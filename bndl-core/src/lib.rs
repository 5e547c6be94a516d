// bndl-core/src/lib.rs
pub mod build;
pub mod bundle;

pub use build::BuildEnvironment;
pub use bundle::{BundleExec, ExecPlan};
