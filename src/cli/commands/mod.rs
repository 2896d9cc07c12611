//! CLI command implementations

pub mod completions;
pub mod export;
pub mod import;
pub mod init;
pub mod order;
pub mod raw;
pub mod reset;
pub mod summary;
