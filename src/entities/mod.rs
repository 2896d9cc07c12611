//! Entity type definitions
//!
//! - [`WorkOrder`] - a maintenance ticket, identified by its folio
//! - [`Task`] / [`Material`] - the line items it owns (tasks, parts, supplies)
//! - [`RawRowCapture`] - audit copy of an imported source row or sheet

pub mod work_order;

pub use work_order::{ItemKind, Material, OrderStatus, RawRowCapture, Task, WorkOrder};
