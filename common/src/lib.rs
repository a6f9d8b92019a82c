pub mod types;
pub mod utils;

pub use types::*;
