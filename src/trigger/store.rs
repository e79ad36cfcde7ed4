//! Trigger persistence
//!
//! Triggers are stored as pretty-printed JSON:
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "triggers": [
//!     {
//!       "trigger_id": "3f1c...",
//!       "name": "Overheat",
//!       "enabled": true,
//!       "trigger_type": "variable_threshold",
//!       "variable_name": "temp",
//!       "comparison": ">",
//!       "threshold_value": 30.0,
//!       "message_pattern": null,
//!       "pattern_is_regex": false,
//!       "rate_threshold": null,
//!       "rate_window": 60.0,
//!       "actions": ["visual_alert"],
//!       "created_at": 1700000000.0,
//!       "fire_count": 0,
//!       "last_fired": null
//!     }
//!   ]
//! }
//! ```
//!
//! Every trigger carries all parameter slots; the ones its kind does not use
//! are `null`. Timestamps are fractional Unix seconds.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ResultExt, UartiumError};
use crate::trigger::types::{
    normalize_actions, Comparison, TriggerAction, TriggerCondition, TriggerKind,
    DEFAULT_RATE_WINDOW_SECS,
};

/// Current file format version
pub const FORMAT_VERSION: &str = "1.0";

/// Top-level document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerFile {
    pub version: String,
    #[serde(default)]
    pub triggers: Vec<StoredTrigger>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoredKind {
    VariableThreshold,
    MessagePattern,
    MessageRate,
    ErrorCount,
}

/// Flat on-disk form of a [`TriggerCondition`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTrigger {
    pub trigger_id: String,
    pub name: String,
    pub enabled: bool,
    pub trigger_type: StoredKind,
    #[serde(default)]
    pub variable_name: Option<String>,
    #[serde(default)]
    pub comparison: Option<Comparison>,
    #[serde(default)]
    pub threshold_value: Option<f64>,
    #[serde(default)]
    pub message_pattern: Option<String>,
    #[serde(default)]
    pub pattern_is_regex: bool,
    #[serde(default)]
    pub rate_threshold: Option<f64>,
    #[serde(default = "default_rate_window")]
    pub rate_window: f64,
    #[serde(default)]
    pub actions: Vec<TriggerAction>,
    #[serde(default)]
    pub created_at: f64,
    #[serde(default)]
    pub fire_count: u64,
    #[serde(default)]
    pub last_fired: Option<f64>,
}

fn default_rate_window() -> f64 {
    DEFAULT_RATE_WINDOW_SECS
}

fn to_epoch_secs(ts: DateTime<Utc>) -> f64 {
    ts.timestamp_micros() as f64 / 1_000_000.0
}

fn from_epoch_secs(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    DateTime::from_timestamp_micros((secs * 1_000_000.0).round() as i64)
}

impl From<&TriggerCondition> for StoredTrigger {
    fn from(t: &TriggerCondition) -> Self {
        let mut stored = StoredTrigger {
            trigger_id: t.id.clone(),
            name: t.name.clone(),
            enabled: t.enabled,
            trigger_type: StoredKind::VariableThreshold,
            variable_name: None,
            comparison: None,
            threshold_value: None,
            message_pattern: None,
            pattern_is_regex: false,
            rate_threshold: None,
            rate_window: DEFAULT_RATE_WINDOW_SECS,
            actions: t.actions.clone(),
            created_at: to_epoch_secs(t.created_at),
            fire_count: t.fire_count,
            last_fired: t.last_fired.map(to_epoch_secs),
        };

        match &t.kind {
            TriggerKind::VariableThreshold {
                variable_name,
                comparison,
                threshold,
            } => {
                stored.variable_name = Some(variable_name.clone());
                stored.comparison = Some(*comparison);
                stored.threshold_value = Some(*threshold);
            }
            TriggerKind::MessagePattern { pattern, is_regex } => {
                stored.trigger_type = StoredKind::MessagePattern;
                stored.message_pattern = Some(pattern.clone());
                stored.pattern_is_regex = *is_regex;
            }
            TriggerKind::MessageRate {
                rate_threshold,
                window_secs,
            } => {
                stored.trigger_type = StoredKind::MessageRate;
                stored.rate_threshold = Some(*rate_threshold);
                stored.rate_window = *window_secs;
            }
            TriggerKind::ErrorCount {
                threshold,
                window_secs,
            } => {
                stored.trigger_type = StoredKind::ErrorCount;
                stored.threshold_value = Some(*threshold);
                stored.rate_window = *window_secs;
            }
        }

        stored
    }
}

impl TryFrom<StoredTrigger> for TriggerCondition {
    type Error = String;

    fn try_from(s: StoredTrigger) -> std::result::Result<Self, Self::Error> {
        let missing = |field: &str| format!("trigger '{}' is missing {}", s.trigger_id, field);

        let kind = match s.trigger_type {
            StoredKind::VariableThreshold => TriggerKind::VariableThreshold {
                variable_name: s.variable_name.clone().ok_or_else(|| missing("variable_name"))?,
                comparison: s.comparison.ok_or_else(|| missing("comparison"))?,
                threshold: s.threshold_value.ok_or_else(|| missing("threshold_value"))?,
            },
            StoredKind::MessagePattern => TriggerKind::MessagePattern {
                pattern: s.message_pattern.clone().unwrap_or_default(),
                is_regex: s.pattern_is_regex,
            },
            StoredKind::MessageRate => TriggerKind::MessageRate {
                rate_threshold: s.rate_threshold.ok_or_else(|| missing("rate_threshold"))?,
                window_secs: s.rate_window,
            },
            StoredKind::ErrorCount => TriggerKind::ErrorCount {
                threshold: s.threshold_value.ok_or_else(|| missing("threshold_value"))?,
                window_secs: s.rate_window,
            },
        };

        let created_at = if s.created_at == 0.0 {
            Utc::now()
        } else {
            from_epoch_secs(s.created_at).ok_or_else(|| {
                format!("trigger '{}' has invalid created_at {}", s.trigger_id, s.created_at)
            })?
        };

        Ok(TriggerCondition {
            id: s.trigger_id,
            name: s.name,
            enabled: s.enabled,
            kind,
            actions: normalize_actions(s.actions),
            created_at,
            fire_count: s.fire_count,
            last_fired: s.last_fired.and_then(from_epoch_secs),
        })
    }
}

/// Write triggers to `path`, creating the parent directory if needed
pub fn save_triggers<'a>(
    path: &Path,
    triggers: impl IntoIterator<Item = &'a TriggerCondition>,
) -> Result<()> {
    let file = TriggerFile {
        version: FORMAT_VERSION.to_string(),
        triggers: triggers.into_iter().map(StoredTrigger::from).collect(),
    };
    let json = serde_json::to_string_pretty(&file)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;

    tracing::debug!("Saved {} triggers to {:?}", file.triggers.len(), path);
    Ok(())
}

/// Read triggers from `path`
///
/// Returns `Ok(None)` when the file does not exist. A malformed file or an
/// unconvertible trigger fails the whole load.
pub fn load_triggers(path: &Path) -> Result<Option<Vec<TriggerCondition>>> {
    if !path.exists() {
        tracing::debug!("Trigger file {:?} not found, nothing to load", path);
        return Ok(None);
    }

    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let file_error = |reason: String| UartiumError::TriggerFile {
        path: path.display().to_string(),
        reason,
    };

    let file: TriggerFile = serde_json::from_str(&content).map_err(|e| file_error(e.to_string()))?;
    if file.version != FORMAT_VERSION {
        tracing::warn!(
            "Trigger file {:?} has version {}, expected {}",
            path,
            file.version,
            FORMAT_VERSION
        );
    }

    let triggers = file
        .triggers
        .into_iter()
        .map(TriggerCondition::try_from)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(file_error)?;

    Ok(Some(triggers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::types::TriggerBuilder;

    fn fixed_time() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 250_000_000).unwrap()
    }

    #[test]
    fn test_stored_form_fills_unused_slots_with_null() {
        let t = TriggerBuilder::pattern("p", "ERR.*", true)
            .id("abc")
            .created_at(fixed_time())
            .build();
        let json = serde_json::to_value(StoredTrigger::from(&t)).unwrap();
        assert_eq!(json["trigger_type"], "message_pattern");
        assert_eq!(json["message_pattern"], "ERR.*");
        assert_eq!(json["pattern_is_regex"], true);
        assert!(json["variable_name"].is_null());
        assert!(json["comparison"].is_null());
        assert_eq!(json["rate_window"], 60.0);
        assert_eq!(json["created_at"], 1_700_000_000.25);
        assert_eq!(json["actions"][0], "visual_alert");
    }

    #[test]
    fn test_stored_roundtrip_each_kind() {
        let triggers = vec![
            TriggerBuilder::threshold("t", "temp", Comparison::LessEqual, -3.5),
            TriggerBuilder::pattern("p", "TIMEOUT", false),
            TriggerBuilder::rate("r", 5.0, 10.0),
            TriggerBuilder::error_count("e", 3.0, 30.0),
        ];
        for builder in triggers {
            let mut t = builder.created_at(fixed_time()).build();
            t.fire_count = 7;
            t.last_fired = Some(fixed_time());
            let back = TriggerCondition::try_from(StoredTrigger::from(&t)).unwrap();
            assert_eq!(back, t);
        }
    }

    #[test]
    fn test_missing_threshold_fields_rejected() {
        let json = r#"{
            "trigger_id": "x", "name": "n", "enabled": true,
            "trigger_type": "variable_threshold", "variable_name": "temp"
        }"#;
        let stored: StoredTrigger = serde_json::from_str(json).unwrap();
        let err = TriggerCondition::try_from(stored).unwrap_err();
        assert!(err.contains("comparison"));
    }

    #[test]
    fn test_empty_actions_default_to_visual() {
        let json = r#"{
            "trigger_id": "x", "name": "n", "enabled": false,
            "trigger_type": "error_count", "threshold_value": 2, "actions": []
        }"#;
        let stored: StoredTrigger = serde_json::from_str(json).unwrap();
        let t = TriggerCondition::try_from(stored).unwrap();
        assert_eq!(t.actions, vec![TriggerAction::VisualAlert]);
        assert_eq!(
            t.kind,
            TriggerKind::ErrorCount {
                threshold: 2.0,
                window_secs: 60.0
            }
        );
    }

    #[test]
    fn test_load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_triggers(&dir.path().join("absent.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_triggers(&path).unwrap_err();
        assert!(matches!(err, UartiumError::TriggerFile { .. }));
    }

    #[test]
    fn test_load_unknown_type_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(
            &path,
            r#"{"version":"1.0","triggers":[{"trigger_id":"x","name":"n","enabled":true,"trigger_type":"bogus"}]}"#,
        )
        .unwrap();
        assert!(load_triggers(&path).is_err());
    }

    #[test]
    fn test_save_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("triggers.json");
        let t = TriggerBuilder::rate("r", 1.0, 5.0).build();
        save_triggers(&path, [&t]).unwrap();
        assert!(path.exists());

        let loaded = load_triggers(&path).unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, t.id);
    }
}
