//! Configuration management with layered hierarchy

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::core::Project;
use crate::mapping::Layout;

/// Default database location, relative to the project root
pub const DEFAULT_DATABASE: &str = ".wot/orders.db";

/// Configuration merged from defaults, user config, project config and env
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Database path (relative paths resolve against the project root)
    pub database: Option<PathBuf>,

    /// Whether imports keep raw row captures
    pub capture_raw: Option<bool>,

    /// Layout used when an import does not name one
    pub default_layout: Option<Layout>,

    /// Default output format
    pub default_format: Option<String>,

    /// Default cap on rows / sheets examined per import
    pub max_rows: Option<usize>,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load(project: Option<&Project>) -> Self {
        let mut config = Config::default();

        // 1. Built-in defaults (accessors below)

        // 2. Global user config (~/.config/wot/config.yaml)
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global) = Self::read(&global_path) {
                config.merge(global);
            }
        }

        // 3. Project config (.wot/config.yaml)
        if let Some(project) = project {
            if let Some(project_config) = Self::read(&project.wot_dir().join("config.yaml")) {
                config.merge(project_config);
            }
        }

        // 4. Environment variables
        config.apply_env(|key| std::env::var(key).ok());

        config
    }

    fn read(path: &Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        let contents = std::fs::read_to_string(path).ok()?;
        match serde_yml::from_str::<Config>(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("ignoring unreadable config {}: {}", path.display(), e);
                None
            }
        }
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(db) = var("WOT_DB").filter(|v| !v.is_empty()) {
            self.database = Some(PathBuf::from(db));
        }
        if let Some(raw) = var("WOT_CAPTURE_RAW") {
            self.capture_raw = Some(!matches!(raw.trim().to_lowercase().as_str(), "0" | "false" | "no" | "off"));
        }
    }

    /// Get the path to the global config file
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "wot").map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.database.is_some() {
            self.database = other.database;
        }
        if other.capture_raw.is_some() {
            self.capture_raw = other.capture_raw;
        }
        if other.default_layout.is_some() {
            self.default_layout = other.default_layout;
        }
        if other.default_format.is_some() {
            self.default_format = other.default_format;
        }
        if other.max_rows.is_some() {
            self.max_rows = other.max_rows;
        }
    }

    /// Resolved database path for a project
    pub fn database_path(&self, project: &Project) -> PathBuf {
        let path = self
            .database
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE));
        if path.is_absolute() {
            path
        } else {
            project.root().join(path)
        }
    }

    pub fn capture_raw(&self) -> bool {
        self.capture_raw.unwrap_or(true)
    }

    pub fn default_layout(&self) -> Layout {
        self.default_layout.unwrap_or_default()
    }
}
