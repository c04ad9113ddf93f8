// Thin re-export module: block construction lives in `blockchain/block.rs`,
// integrity checks in `blockchain/validation.rs`.

pub mod block;
pub mod validation;

pub use block::*;
pub use validation::*;
