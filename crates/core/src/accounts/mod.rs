//! Linked accounts: the per-user record holding upstream tokens, the
//! downstream stream, and the sync cursor.

mod accounts_model;
mod accounts_service;
mod accounts_traits;

pub use accounts_model::*;
pub use accounts_service::*;
pub use accounts_traits::*;
