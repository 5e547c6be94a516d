pub mod devtools;
pub mod env;
pub mod refurbish;

pub use env::BuildEnvironment;
