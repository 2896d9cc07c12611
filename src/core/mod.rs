//! Core module - project discovery, configuration and the order store

pub mod config;
pub mod project;
pub mod store;

pub use config::Config;
pub use project::{Project, ProjectError};
pub use store::{OrderFilter, OrderStore, SortBy, StoreCounts, StoreError, Summary, UpsertOutcome};
