//! Core data types for Uartium
//!
//! This module contains the fundamental data structures produced by the
//! frame decoder and consumed by the trigger engine, the monitor and the
//! exporters.
//!
//! # Main Types
//!
//! - [`Level`] - Severity of a frame (INFO, WARNING, ERROR, DEBUG)
//! - [`TypeTag`] - Declared type of a `name:type=value` field
//! - [`Variant`] - Converted native value, or the raw text when conversion failed
//! - [`TypedValue`] - A value together with its declared type
//! - [`DataFields`] - Insertion-ordered, unique-key field map of one frame
//! - [`FrameRecord`] - One decoded line
//!
//! # Field Types
//!
//! The wire format declares a field type with a one-letter suffix:
//! - `u` unsigned 32-bit integer
//! - `i` signed integer
//! - `f` double precision float
//! - `s` string (the default when the suffix is missing or unknown)
//! - `t` timestamp (unsigned 32-bit)
//! - `m` message text

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Severity classification of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    /// Informational frame (also the fallback for untagged lines)
    #[default]
    Info,
    /// Warning frame
    Warning,
    /// Error frame
    Error,
    /// Debug frame
    Debug,
}

impl Level {
    /// All levels in the fixed order used for prefix detection
    pub const ALL: [Level; 4] = [Level::Info, Level::Warning, Level::Error, Level::Debug];

    /// The order exporters group records in
    pub const EXPORT_ORDER: [Level; 4] = [Level::Debug, Level::Info, Level::Warning, Level::Error];

    /// The tag as it appears on the wire
    pub fn tag(&self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Debug => "DEBUG",
        }
    }

    /// Look up a level by tag, ignoring ASCII case
    pub fn from_tag(tag: &str) -> Option<Level> {
        Level::ALL
            .into_iter()
            .find(|level| level.tag().eq_ignore_ascii_case(tag))
    }

    fn index(&self) -> usize {
        match self {
            Level::Info => 0,
            Level::Warning => 1,
            Level::Error => 2,
            Level::Debug => 3,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Declared type of a data field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    /// Unsigned 32-bit integer (`u`)
    Uint,
    /// Signed integer (`i`)
    Int,
    /// IEEE double (`f`)
    Float,
    /// Raw string (`s`, missing or unknown suffix)
    #[default]
    Str,
    /// Unsigned 32-bit timestamp (`t`)
    Timestamp,
    /// Message text (`m`)
    Message,
}

impl TypeTag {
    /// Map a type suffix to its tag. Unknown suffixes fall back to [`TypeTag::Str`].
    pub fn from_suffix(suffix: &str) -> TypeTag {
        match suffix {
            "u" => TypeTag::Uint,
            "i" => TypeTag::Int,
            "s" => TypeTag::Str,
            "f" => TypeTag::Float,
            "t" => TypeTag::Timestamp,
            "m" => TypeTag::Message,
            _ => TypeTag::Str,
        }
    }

    /// The one-letter suffix for this tag
    pub fn suffix(&self) -> &'static str {
        match self {
            TypeTag::Uint => "u",
            TypeTag::Int => "i",
            TypeTag::Float => "f",
            TypeTag::Str => "s",
            TypeTag::Timestamp => "t",
            TypeTag::Message => "m",
        }
    }

    /// Whether this tag declares a numeric payload
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            TypeTag::Uint | TypeTag::Int | TypeTag::Float | TypeTag::Timestamp
        )
    }

    /// Human readable label (matches the serialized form)
    pub fn label(&self) -> &'static str {
        match self {
            TypeTag::Uint => "uint",
            TypeTag::Int => "int",
            TypeTag::Float => "float",
            TypeTag::Str => "str",
            TypeTag::Timestamp => "timestamp",
            TypeTag::Message => "message",
        }
    }
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A converted field value
///
/// When a numeric conversion fails the raw text is kept verbatim in
/// [`Variant::Str`] while the owning [`TypedValue`] keeps the declared tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Variant {
    Uint(u32),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Variant {
    /// Numeric view of the value, if it holds a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Variant::Uint(v) => Some(*v as f64),
            Variant::Int(v) => Some(*v as f64),
            Variant::Float(v) => Some(*v),
            Variant::Str(_) => None,
        }
    }

    /// String view of the value, if it holds text
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Variant::Uint(v) => write!(f, "{}", v),
            Variant::Int(v) => write!(f, "{}", v),
            Variant::Float(v) => write!(f, "{}", v),
            Variant::Str(s) => write!(f, "{}", s),
        }
    }
}

/// A field value together with its declared type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedValue {
    /// Converted value (or raw text on conversion failure)
    pub value: Variant,
    /// Declared type, kept even when conversion failed
    #[serde(rename = "type")]
    pub type_tag: TypeTag,
}

impl TypedValue {
    /// Create a new typed value
    pub fn new(value: Variant, type_tag: TypeTag) -> Self {
        Self { value, type_tag }
    }

    /// Whether a declared numeric type failed to convert
    pub fn conversion_failed(&self) -> bool {
        self.type_tag.is_numeric() && matches!(self.value, Variant::Str(_))
    }

    /// Numeric comparand used by threshold triggers
    ///
    /// Numbers convert directly. Text is parsed as a float only for fields that
    /// were declared as text; a declared numeric field whose payload was
    /// malformed has no comparand.
    pub fn numeric_comparand(&self) -> Option<f64> {
        match &self.value {
            Variant::Str(raw) if !self.type_tag.is_numeric() => raw.trim().parse::<f64>().ok(),
            other => other.as_f64(),
        }
    }
}

/// Insertion-ordered field map with unique names
///
/// Repeated names are upserted: the value is replaced but the position of the
/// first occurrence is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataFields {
    entries: Vec<(String, TypedValue)>,
    /// Position of each name in `entries`
    index: HashMap<String, usize>,
}

impl DataFields {
    /// Create an empty field map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field. Returns the previous value if the name existed.
    pub fn upsert(&mut self, name: impl Into<String>, value: TypedValue) -> Option<TypedValue> {
        let name = name.into();
        if let Some(&pos) = self.index.get(&name) {
            return Some(std::mem::replace(&mut self.entries[pos].1, value));
        }
        self.index.insert(name.clone(), self.entries.len());
        self.entries.push((name, value));
        None
    }

    /// Look up a field by name
    pub fn get(&self, name: &str) -> Option<&TypedValue> {
        self.index.get(name).map(|&pos| &self.entries[pos].1)
    }

    /// Check whether a field exists
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate fields in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypedValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Field names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for DataFields {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<N: Into<String>> FromIterator<(N, TypedValue)> for DataFields {
    fn from_iter<I: IntoIterator<Item = (N, TypedValue)>>(iter: I) -> Self {
        let mut fields = DataFields::new();
        for (name, value) in iter {
            fields.upsert(name, value);
        }
        fields
    }
}

/// One decoded line of device telemetry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameRecord {
    /// Host wall-clock time of receipt
    pub timestamp: DateTime<Utc>,
    /// Severity level
    pub level: Level,
    /// Human readable message, possibly empty
    pub text: String,
    /// Device timestamp extracted from a `:t=` field
    pub device_timestamp: Option<u32>,
    /// Typed variables carried by the line
    pub data_fields: DataFields,
}

impl FrameRecord {
    /// Create a record stamped with the current host time
    pub fn new(level: Level, text: impl Into<String>) -> Self {
        Self::at(Utc::now(), level, text)
    }

    /// Create a record with an explicit host timestamp
    pub fn at(timestamp: DateTime<Utc>, level: Level, text: impl Into<String>) -> Self {
        Self {
            timestamp,
            level,
            text: text.into(),
            device_timestamp: None,
            data_fields: DataFields::new(),
        }
    }

    /// Set the device timestamp
    pub fn with_device_timestamp(mut self, ts: u32) -> Self {
        self.device_timestamp = Some(ts);
        self
    }

    /// Add (or replace) a data field
    pub fn with_field(mut self, name: impl Into<String>, value: TypedValue) -> Self {
        self.data_fields.upsert(name, value);
        self
    }

    /// Host timestamp as fractional Unix seconds
    pub fn unix_seconds(&self) -> f64 {
        self.timestamp.timestamp_micros() as f64 / 1_000_000.0
    }
}

/// Per-level frame counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LevelCounts {
    counts: [u64; 4],
}

impl LevelCounts {
    /// Count one frame of the given level
    #[inline]
    pub fn record(&mut self, level: Level) {
        self.counts[level.index()] += 1;
    }

    /// Frames seen for a level
    pub fn get(&self, level: Level) -> u64 {
        self.counts[level.index()]
    }

    /// Frames seen across all levels
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Reset all counters
    pub fn clear(&mut self) {
        self.counts = [0; 4];
    }
}

impl Serialize for LevelCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(4))?;
        for level in Level::EXPORT_ORDER {
            map.serialize_entry(level.tag(), &self.get(level))?;
        }
        map.end()
    }
}
