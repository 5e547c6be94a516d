// bndl-net/src/lib.rs
pub mod api;

pub use api::{fetch_all_formulas, update_formula_cache};
