//! Project discovery and structure

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Marker directory identifying a project root
pub const PROJECT_DIR: &str = ".wot";

/// A work order project: a directory holding `.wot/`
#[derive(Debug)]
pub struct Project {
    /// Root directory of the project (parent of .wot/)
    root: PathBuf,
}

impl Project {
    /// Find project root by walking up from the current directory
    pub fn discover() -> Result<Self, ProjectError> {
        let current = std::env::current_dir().map_err(|e| ProjectError::IoError(e.to_string()))?;
        Self::discover_from(&current)
    }

    /// Find project root by walking up from the given directory
    pub fn discover_from(start: &Path) -> Result<Self, ProjectError> {
        let mut current = start
            .canonicalize()
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        loop {
            if current.join(PROJECT_DIR).is_dir() {
                return Ok(Self { root: current });
            }

            if !current.pop() {
                return Err(ProjectError::NotFound {
                    searched_from: start.to_path_buf(),
                });
            }
        }
    }

    /// Create `.wot/` with a default config at the given path
    ///
    /// With `force`, an existing `.wot/` has its config rewritten; the
    /// database is left alone.
    pub fn init(path: &Path, force: bool) -> Result<Self, ProjectError> {
        std::fs::create_dir_all(path).map_err(|e| ProjectError::IoError(e.to_string()))?;
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        let wot_dir = root.join(PROJECT_DIR);
        if wot_dir.exists() && !force {
            return Err(ProjectError::AlreadyExists(root));
        }

        std::fs::create_dir_all(&wot_dir).map_err(|e| ProjectError::IoError(e.to_string()))?;
        std::fs::write(wot_dir.join("config.yaml"), Self::default_config())
            .map_err(|e| ProjectError::IoError(e.to_string()))?;
        std::fs::write(wot_dir.join(".gitignore"), "orders.db*\n")
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        Ok(Self { root })
    }

    fn default_config() -> &'static str {
        r#"# Work order project configuration

# SQLite database, relative to the project root
# database: .wot/orders.db

# Keep a raw JSON copy of every imported row / sheet
# capture_raw: true

# Spreadsheet layout when `wot import` gets no --layout (auto, rows, sheets)
# default_layout: auto

# Default output format (auto, yaml, tsv, json, csv, md, id)
# default_format: auto

# Cap on rows / sheets examined per import
# max_rows: 500
"#
    }

    /// Get the project root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the .wot configuration directory
    pub fn wot_dir(&self) -> PathBuf {
        self.root.join(PROJECT_DIR)
    }
}

/// Errors that can occur during project operations
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("not a work order project (searched from {searched_from:?}). Run 'wot init' to create one.")]
    NotFound { searched_from: PathBuf },

    #[error("work order project already exists at {0:?}")]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    IoError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_project_init_creates_structure() {
        let tmp = tempdir().unwrap();
        let project = Project::init(tmp.path(), false).unwrap();

        assert!(project.wot_dir().is_dir());
        assert!(project.wot_dir().join("config.yaml").exists());
    }

    #[test]
    fn test_project_init_fails_if_exists() {
        let tmp = tempdir().unwrap();
        Project::init(tmp.path(), false).unwrap();

        let err = Project::init(tmp.path(), false).unwrap_err();
        assert!(matches!(err, ProjectError::AlreadyExists(_)));
        assert!(Project::init(tmp.path(), true).is_ok());
    }

    #[test]
    fn test_project_discover_walks_up() {
        let tmp = tempdir().unwrap();
        Project::init(tmp.path(), false).unwrap();

        let subdir = tmp.path().join("plantas/norte");
        std::fs::create_dir_all(&subdir).unwrap();

        let project = Project::discover_from(&subdir).unwrap();
        assert_eq!(
            project.root().canonicalize().unwrap(),
            tmp.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_project_discover_fails_without_marker() {
        let tmp = tempdir().unwrap();
        let err = Project::discover_from(tmp.path()).unwrap_err();
        assert!(matches!(err, ProjectError::NotFound { .. }));
    }
}
