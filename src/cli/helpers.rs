//! Shared helper functions for CLI commands
//!
//! This module contains utility functions that are used across multiple
//! command modules to avoid code duplication.

use clap::ValueEnum;
use miette::Result;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::store::OrderStore;
use crate::core::{Config, Project};
use crate::entities::work_order::display_or_unspecified;

/// A discovered project with its merged configuration
pub struct Workspace {
    pub project: Project,
    pub config: Config,
}

impl Workspace {
    /// Locate the project from `--project` or the current directory
    pub fn discover(global: &GlobalOpts) -> Result<Self> {
        let project = match &global.project {
            Some(dir) => Project::discover_from(dir),
            None => Project::discover(),
        }
        .map_err(|e| miette::miette!("{}", e))?;
        let config = Config::load(Some(&project));
        Ok(Self { project, config })
    }

    /// Open (creating if needed) the project's order database
    pub fn open_store(&self) -> Result<OrderStore> {
        let path = self.config.database_path(&self.project);
        log::debug!("opening store at {}", path.display());
        OrderStore::open(&path).map_err(|e| miette::miette!("{}", e))
    }

    /// The requested format, or the configured default when `auto`
    pub fn format(&self, requested: OutputFormat) -> OutputFormat {
        if requested != OutputFormat::Auto {
            return requested;
        }
        self.config
            .default_format
            .as_deref()
            .and_then(|name| OutputFormat::from_str(name, true).ok())
            .unwrap_or(OutputFormat::Auto)
    }
}

/// Truncate a string to max_len characters, adding "..." if truncated
///
/// Useful for table columns that need fixed-width output.
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Escape a string for CSV output
///
/// Handles commas, quotes, and newlines according to RFC 4180.
pub fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Table cell text: "No Especificado" for empty values
pub fn cell(value: &str) -> String {
    display_or_unspecified(value).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 8), "hello...");
        assert_eq!(truncate_str("hi", 2), "hi");
        assert_eq!(truncate_str("Mantención eléctrica", 10), "Mantenc...");
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("simple"), "simple");
        assert_eq!(escape_csv("with,comma"), "\"with,comma\"");
        assert_eq!(escape_csv("with\"quote"), "\"with\"\"quote\"");
        assert_eq!(escape_csv("with\nnewline"), "\"with\nnewline\"");
    }

    #[test]
    fn test_workspace_format_falls_back_to_config() {
        let tmp = tempfile::tempdir().unwrap();
        let project = Project::init(tmp.path(), false).unwrap();
        let workspace = Workspace {
            project,
            config: Config { default_format: Some("JSON".into()), ..Default::default() },
        };
        assert_eq!(workspace.format(OutputFormat::Auto), OutputFormat::Json);
        assert_eq!(workspace.format(OutputFormat::Yaml), OutputFormat::Yaml);
    }
}
