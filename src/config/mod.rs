//! Configuration module for Uartium
//!
//! This module handles application configuration:
//! - Where lines come from (demo device, stdin, a capture file)
//! - Reader queue sizing and shutdown timeouts
//! - Trigger engine limits and the trigger persistence file
//! - Export defaults
//! - Logging filter and the trigger log directory
//!
//! # Config Location
//!
//! The config file is stored in the platform-appropriate location:
//! - **Linux**: `~/.local/share/dev.uartium.uartium-rs/uartium.toml`
//! - **macOS**: `~/Library/Application Support/dev.uartium.uartium-rs/uartium.toml`
//! - **Windows**: `%APPDATA%\dev.uartium.uartium-rs\uartium.toml`
//!
//! Every section and field is optional; missing values take their defaults.
//!
//! # Example
//!
//! ```toml
//! [source]
//! kind = "file"
//! path = "capture.log"
//!
//! [reader]
//! queue_capacity = 5000
//! batch_limit = 50
//!
//! [triggers]
//! triggers_file = "uartium_triggers.json"
//! ```

use crate::error::{Result, ResultExt, UartiumError};
use crate::types::Level;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for data directories
pub const APP_ID: &str = "dev.uartium.uartium-rs";

/// Config filename
pub const CONFIG_FILE: &str = "uartium.toml";

/// Default trigger persistence filename
pub const DEFAULT_TRIGGERS_FILE: &str = "uartium_triggers.json";

/// Default capacity of the reader queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 5000;

/// Default number of records drained per consumer tick
pub const DEFAULT_BATCH_LIMIT: usize = 50;

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Ensure the app data directory exists
pub fn ensure_app_data_dir() -> Result<PathBuf> {
    let dir = app_data_dir().ok_or_else(|| {
        UartiumError::Config("Could not determine app data directory".to_string())
    })?;

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| {
            UartiumError::Config(format!("Failed to create app data directory: {}", e))
        })?;
    }

    Ok(dir)
}

/// Get the path to the default config file
pub fn default_config_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== App Config ====================

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Line source selection
    #[serde(default)]
    pub source: SourceConfig,

    /// Reader worker and queue settings
    #[serde(default)]
    pub reader: ReaderConfig,

    /// Trigger engine settings
    #[serde(default)]
    pub triggers: TriggerConfig,

    /// Export defaults
    #[serde(default)]
    pub export: ExportConfig,

    /// Consumer loop settings
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .map_err(|e| UartiumError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        Self::from_toml_str(&content).with_context(|| format!("In config file {:?}", path))
    }

    /// Load from `path`, or from the default location when `path` is `None`
    ///
    /// A missing default file, or any error, yields the default configuration.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) if p.exists() => p,
                _ => return Self::default(),
            },
        };

        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save the configuration as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    UartiumError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| UartiumError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            UartiumError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        fn reject(msg: impl Into<String>) -> Result<()> {
            Err(UartiumError::Config(msg.into()))
        }

        if self.source.kind == SourceKind::File && self.source.path.is_none() {
            return reject("source.path is required when source.kind = \"file\"");
        }
        if !(self.source.demo_interval_secs.is_finite() && self.source.demo_interval_secs > 0.0) {
            return reject("source.demo_interval_secs must be > 0");
        }
        if self.reader.queue_capacity == 0 {
            return reject("reader.queue_capacity must be > 0");
        }
        if self.reader.batch_limit == 0 {
            return reject("reader.batch_limit must be > 0");
        }
        if self.triggers.history_capacity == 0 {
            return reject("triggers.history_capacity must be > 0");
        }
        if !(self.triggers.retention_secs.is_finite() && self.triggers.retention_secs > 0.0) {
            return reject("triggers.retention_secs must be > 0");
        }
        if self.monitor.max_records == 0 {
            return reject("monitor.max_records must be > 0");
        }
        if self.monitor.tick_ms == 0 {
            return reject("monitor.tick_ms must be > 0");
        }
        Ok(())
    }
}

// ==================== Source Config ====================

/// Where raw lines come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Built-in fake device
    #[default]
    Demo,
    /// Standard input
    Stdin,
    /// A capture file, read line by line
    File,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Demo => write!(f, "demo"),
            SourceKind::Stdin => write!(f, "stdin"),
            SourceKind::File => write!(f, "file"),
        }
    }
}

/// Line source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,

    /// Capture file path (for `kind = "file"`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Mean interval between demo lines in seconds
    pub demo_interval_secs: f64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Demo,
            path: None,
            demo_interval_secs: 0.5,
        }
    }
}

// ==================== Reader Config ====================

/// Reader worker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Capacity of the decoded-record queue; arrivals beyond it are dropped
    pub queue_capacity: usize,

    /// Maximum records drained per consumer tick
    pub batch_limit: usize,

    /// How long `stop()` waits for the worker before detaching it
    pub join_timeout_ms: u64,

    /// Poll interval used by sources that support read timeouts
    pub read_timeout_ms: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            batch_limit: DEFAULT_BATCH_LIMIT,
            join_timeout_ms: 2000,
            read_timeout_ms: 100,
        }
    }
}

// ==================== Trigger Config ====================

/// Trigger engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Maximum number of events kept in the history
    pub history_capacity: usize,

    /// Look-back retained by the rolling windows, in seconds
    pub retention_secs: f64,

    /// Trigger persistence file
    pub triggers_file: PathBuf,

    /// Zero fire counters after loading the trigger file
    pub reset_fire_counts_on_load: bool,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            history_capacity: crate::trigger::DEFAULT_HISTORY_CAPACITY,
            retention_secs: crate::trigger::DEFAULT_RETENTION_SECS,
            triggers_file: PathBuf::from(DEFAULT_TRIGGERS_FILE),
            reset_fire_counts_on_load: false,
        }
    }
}

// ==================== Export Config ====================

/// Export file format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Comma separated values, one row per variable
    #[default]
    Csv,
    /// Structured JSON document
    Json,
    /// Human readable text grouped by level
    Txt,
}

impl ExportFormat {
    /// File extension (without the dot)
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Txt => "txt",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::Csv => write!(f, "CSV"),
            ExportFormat::Json => write!(f, "JSON"),
            ExportFormat::Txt => write!(f, "TXT"),
        }
    }
}

/// Export configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory export files are written to
    pub directory: PathBuf,

    /// Default format
    pub format: ExportFormat,

    /// Only export the levels listed in `levels`
    pub apply_level_filter: bool,

    /// Levels kept when the filter is applied
    pub levels: Vec<Level>,

    /// Export captured records when the monitor exits
    pub on_exit: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            format: ExportFormat::Csv,
            apply_level_filter: false,
            levels: Level::EXPORT_ORDER.to_vec(),
            on_exit: false,
        }
    }
}

// ==================== Monitor Config ====================

/// Consumer loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Records kept in memory for export (oldest dropped first)
    pub max_records: usize,

    /// Consumer tick period in milliseconds
    pub tick_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_records: 10_000,
            tick_ms: 16,
        }
    }
}

// ==================== Logging Config ====================

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter used when `RUST_LOG` is not set
    pub filter: String,

    /// Directory for the daily trigger log (LOG_TO_FILE action)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,uartium_rs=debug".to_string(),
            trigger_log_dir: None,
        }
    }
}
