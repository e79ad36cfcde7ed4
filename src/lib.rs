//! # Uartium-RS: UART Telemetry Decoder and Trigger Engine
//!
//! Decodes the line-oriented text frames an embedded device prints over a
//! serial link into leveled, timestamped records with typed variables, and
//! evaluates the record stream against user-defined trigger rules.
//!
//! ## Architecture
//!
//! - **Protocol**: Tokenizer, typed value converter and record builder for
//!   `[LEVEL] :m"text" name:type=value :t=ts` lines
//! - **Backend**: A reader thread pulls lines from a [`backend::LineSource`]
//!   and pushes decoded records into a bounded crossbeam channel
//! - **Trigger**: Threshold, pattern, rate and error-count rules over rolling
//!   windows, with injectable action handlers and JSON persistence
//! - **Monitor**: The consumer loop that drains the queue in batches
//! - **Export**: CSV, JSON and plain text export of captured records
//! - **Logging**: Console and trigger log outputs with separate filters
//!
//! ## Configuration
//!
//! Settings are stored as TOML in the platform-appropriate data directory
//! under `dev.uartium.uartium-rs`:
//!
//! - **Linux**: `~/.local/share/dev.uartium.uartium-rs/`
//! - **macOS**: `~/Library/Application Support/dev.uartium.uartium-rs/`
//! - **Windows**: `%APPDATA%\dev.uartium.uartium-rs\`
//!
//! ## Example
//!
//! ```
//! use uartium_rs::protocol::decode_line;
//! use uartium_rs::trigger::{Comparison, TriggerBuilder, TriggerEngine};
//! use uartium_rs::types::Level;
//!
//! let mut engine = TriggerEngine::new();
//! engine.add(TriggerBuilder::threshold("Overheat", "temp", Comparison::GreaterThan, 30.0).build());
//!
//! let record = decode_line(r#"[WARNING] :m"Sensor" temp:f=31.5 :t=1000"#);
//! assert_eq!(record.level, Level::Warning);
//! assert_eq!(record.device_timestamp, Some(1000));
//!
//! let events = engine.evaluate(&record);
//! assert_eq!(events.len(), 1);
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod monitor;
pub mod protocol;
pub mod trigger;
pub mod types;

// Re-export commonly used types
pub use backend::{FrameReader, LineSource};
pub use config::AppConfig;
pub use error::{Result, UartiumError};
pub use monitor::Monitor;
pub use protocol::{decode_line, FrameDecoder};
pub use trigger::{TriggerBuilder, TriggerCondition, TriggerEngine, TriggerEvent};
pub use types::{FrameRecord, Level, TypeTag, TypedValue, Variant};
