//! Incremental step sync engine and the services around it.

mod single_flight;
mod sync_aggregator;
mod sync_classifier;
mod sync_config;
mod sync_model;
mod sync_orchestrator;
mod sync_scheduler;
mod sync_service;
mod sync_traits;
mod sync_window;

pub use single_flight::*;
pub use sync_aggregator::*;
pub use sync_classifier::*;
pub use sync_config::*;
pub use sync_model::*;
pub use sync_orchestrator::*;
pub use sync_scheduler::*;
pub use sync_service::*;
pub use sync_traits::*;
pub use sync_window::*;

#[cfg(test)]
mod tests;
