//! Core domain for stepsync: linked accounts and the incremental step sync engine.

pub mod accounts;
pub mod errors;
pub mod sync;

pub use errors::{Error, Result};
