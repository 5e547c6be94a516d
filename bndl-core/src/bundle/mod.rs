pub mod exec;

pub use exec::{BundleExec, ExecPlan};
