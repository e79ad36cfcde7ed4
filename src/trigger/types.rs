//! Trigger definitions and firing records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default look-back for rate and error-count triggers, in seconds
pub const DEFAULT_RATE_WINDOW_SECS: f64 = 60.0;

/// Tolerance for `==` and `!=` comparisons
pub const EQUALITY_EPSILON: f64 = 1e-6;

/// Comparison operator of a threshold trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparison {
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = ">=")]
    GreaterEqual,
    #[serde(rename = "<=")]
    LessEqual,
}

impl Comparison {
    /// Operator symbol as written in files and event messages
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::GreaterThan => ">",
            Comparison::LessThan => "<",
            Comparison::Equal => "==",
            Comparison::NotEqual => "!=",
            Comparison::GreaterEqual => ">=",
            Comparison::LessEqual => "<=",
        }
    }

    /// Apply the operator to `value <op> threshold`
    pub fn apply(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparison::GreaterThan => value > threshold,
            Comparison::LessThan => value < threshold,
            Comparison::Equal => (value - threshold).abs() < EQUALITY_EPSILON,
            Comparison::NotEqual => (value - threshold).abs() >= EQUALITY_EPSILON,
            Comparison::GreaterEqual => value >= threshold,
            Comparison::LessEqual => value <= threshold,
        }
    }
}

impl std::fmt::Display for Comparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Side effect requested when a trigger fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerAction {
    VisualAlert,
    AudioAlert,
    LogToFile,
    PauseCapture,
    HighlightMessage,
}

impl TriggerAction {
    pub const ALL: [TriggerAction; 5] = [
        TriggerAction::VisualAlert,
        TriggerAction::AudioAlert,
        TriggerAction::LogToFile,
        TriggerAction::PauseCapture,
        TriggerAction::HighlightMessage,
    ];
}

/// Kind-specific parameters of a trigger
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerKind {
    /// Fires when a numeric field satisfies `value <comparison> threshold`
    VariableThreshold {
        variable_name: String,
        comparison: Comparison,
        threshold: f64,
    },
    /// Fires when the record text contains the pattern (or the regex matches)
    MessagePattern { pattern: String, is_regex: bool },
    /// Fires when records per second over the window exceed the threshold
    MessageRate { rate_threshold: f64, window_secs: f64 },
    /// Fires when ERROR records over the window exceed the threshold
    ErrorCount { threshold: f64, window_secs: f64 },
}

impl TriggerKind {
    /// Persisted type tag
    pub fn type_name(&self) -> &'static str {
        match self {
            TriggerKind::VariableThreshold { .. } => "variable_threshold",
            TriggerKind::MessagePattern { .. } => "message_pattern",
            TriggerKind::MessageRate { .. } => "message_rate",
            TriggerKind::ErrorCount { .. } => "error_count",
        }
    }
}

/// A user-defined rule and its fire statistics
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerCondition {
    /// Unique identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Disabled triggers are skipped during evaluation
    pub enabled: bool,
    /// Kind and parameters
    pub kind: TriggerKind,
    /// Actions to dispatch on fire (never empty)
    pub actions: Vec<TriggerAction>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Number of times this trigger fired
    pub fire_count: u64,
    /// Timestamp of the last fire
    pub last_fired: Option<DateTime<Utc>>,
}

impl TriggerCondition {
    /// Record a fire at the given time
    pub(crate) fn mark_fired(&mut self, at: DateTime<Utc>) {
        self.fire_count += 1;
        self.last_fired = Some(at);
    }
}

/// Deduplicate while keeping order; an empty list becomes `[VisualAlert]`
pub(crate) fn normalize_actions(actions: Vec<TriggerAction>) -> Vec<TriggerAction> {
    let mut out: Vec<TriggerAction> = Vec::with_capacity(actions.len());
    for action in actions {
        if !out.contains(&action) {
            out.push(action);
        }
    }
    if out.is_empty() {
        out.push(TriggerAction::VisualAlert);
    }
    out
}

/// Builder for [`TriggerCondition`]
///
/// # Example
///
/// ```
/// use uartium_rs::trigger::{Comparison, TriggerAction, TriggerBuilder};
///
/// let trigger = TriggerBuilder::threshold("Overheat", "temp", Comparison::GreaterThan, 30.0)
///     .action(TriggerAction::AudioAlert)
///     .build();
/// assert!(trigger.enabled);
/// assert_eq!(trigger.actions, vec![TriggerAction::AudioAlert]);
/// ```
#[derive(Debug, Clone)]
pub struct TriggerBuilder {
    id: Option<String>,
    name: String,
    enabled: bool,
    kind: TriggerKind,
    actions: Vec<TriggerAction>,
    created_at: Option<DateTime<Utc>>,
}

impl TriggerBuilder {
    pub fn new(name: impl Into<String>, kind: TriggerKind) -> Self {
        Self {
            id: None,
            name: name.into(),
            enabled: true,
            kind,
            actions: Vec::new(),
            created_at: None,
        }
    }

    pub fn threshold(
        name: impl Into<String>,
        variable_name: impl Into<String>,
        comparison: Comparison,
        threshold: f64,
    ) -> Self {
        Self::new(
            name,
            TriggerKind::VariableThreshold {
                variable_name: variable_name.into(),
                comparison,
                threshold,
            },
        )
    }

    pub fn pattern(name: impl Into<String>, pattern: impl Into<String>, is_regex: bool) -> Self {
        Self::new(
            name,
            TriggerKind::MessagePattern {
                pattern: pattern.into(),
                is_regex,
            },
        )
    }

    pub fn rate(name: impl Into<String>, rate_threshold: f64, window_secs: f64) -> Self {
        Self::new(
            name,
            TriggerKind::MessageRate {
                rate_threshold,
                window_secs,
            },
        )
    }

    pub fn error_count(name: impl Into<String>, threshold: f64, window_secs: f64) -> Self {
        Self::new(name, TriggerKind::ErrorCount { threshold, window_secs })
    }

    /// Use a fixed id instead of a generated one
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Add an action
    pub fn action(mut self, action: TriggerAction) -> Self {
        self.actions.push(action);
        self
    }

    /// Replace the action list
    pub fn actions(mut self, actions: impl IntoIterator<Item = TriggerAction>) -> Self {
        self.actions = actions.into_iter().collect();
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    pub fn build(self) -> TriggerCondition {
        TriggerCondition {
            id: self
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            name: self.name,
            enabled: self.enabled,
            kind: self.kind,
            actions: normalize_actions(self.actions),
            created_at: self.created_at.unwrap_or_else(Utc::now),
            fire_count: 0,
            last_fired: None,
        }
    }
}

/// Kind-specific diagnostics attached to an event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventDetails {
    Threshold {
        variable: String,
        value: f64,
        threshold: f64,
        comparison: Comparison,
    },
    Pattern {
        pattern: String,
        text: String,
    },
    Rate {
        rate: f64,
        threshold: f64,
        window_secs: f64,
    },
    ErrorCount {
        error_count: usize,
        threshold: f64,
        window_secs: f64,
    },
}

/// Immutable record of one trigger firing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggerEvent {
    pub trigger_id: String,
    pub trigger_name: String,
    /// Host timestamp of the record that caused the fire
    pub timestamp: DateTime<Utc>,
    /// Human readable description
    pub message: String,
    pub details: EventDetails,
}

/// Outcome of evaluating one trigger against one record
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Fired(TriggerEvent),
    NotFired,
    /// The rule cannot be evaluated (bad regex, bad window); treated as not fired
    Invalid(String),
}

impl Evaluation {
    pub fn fired(&self) -> bool {
        matches!(self, Evaluation::Fired(_))
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Evaluation::Invalid(_))
    }
}

/// Aggregate trigger statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TriggerStats {
    pub total_triggers: usize,
    pub enabled_triggers: usize,
    pub total_fires: u64,
    pub history_count: usize,
    /// Evaluations that came out invalid since the engine was created
    pub invalid_evaluations: u64,
}
