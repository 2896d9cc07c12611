//! WOT: Work Order Toolkit
//!
//! Maps loosely formatted maintenance spreadsheets (one order per row, or
//! one freeform sheet per order) into normalized work orders with their
//! task, part and supply lines, stored in a local SQLite database.

pub mod cli;
pub mod core;
pub mod entities;
pub mod export;
pub mod mapping;
pub mod schema;
pub mod source;
