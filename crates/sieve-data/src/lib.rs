//! # sieve-data
//!
//! Tabular input loading and History persistence for Sieve.

pub mod loaders;
pub mod storage;

pub use loaders::*;
pub use storage::*;
