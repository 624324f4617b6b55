pub mod binary;
pub mod string;

pub use speedkit_core_derive::*;
