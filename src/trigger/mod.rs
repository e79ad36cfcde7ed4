//! Trigger engine
//!
//! Evaluates every incoming [`FrameRecord`] against a set of user-defined
//! rules and produces [`TriggerEvent`]s.
//!
//! # Rule kinds
//!
//! - **Variable threshold**: compares a numeric field against a constant
//! - **Message pattern**: substring or regex search over the record text
//! - **Message rate**: records per second over a trailing window
//! - **Error count**: ERROR records over a trailing window
//!
//! # Windows
//!
//! The engine keeps the host timestamps of all records and of ERROR records
//! in two [`RollingWindow`]s. Both are pruned to the retention period
//! (300 s by default) relative to the record being evaluated, so evaluation
//! is deterministic for a given stream.
//!
//! # Failure model
//!
//! Evaluation never fails. A rule that cannot be evaluated (invalid regex,
//! non-positive window) yields [`Evaluation::Invalid`], which is counted in
//! [`TriggerStats::invalid_evaluations`] and otherwise behaves like
//! "not fired". Only [`TriggerEngine::save`] and [`TriggerEngine::load`]
//! return errors.

pub mod actions;
pub mod store;
pub mod types;
pub mod window;

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::config::TriggerConfig;
use crate::error::Result;
use crate::types::{FrameRecord, Level};

pub use actions::{ActionHandler, ActionHandlers};
pub use types::{
    Comparison, EventDetails, Evaluation, TriggerAction, TriggerBuilder, TriggerCondition,
    TriggerEvent, TriggerKind, TriggerStats,
};
pub use window::RollingWindow;

use window::secs_to_duration;

/// Default bound of the event history
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Default look-back kept in the rolling windows, in seconds
pub const DEFAULT_RETENTION_SECS: f64 = 300.0;

/// Start of a look-back window ending at `now`
fn window_start(now: DateTime<Utc>, secs: f64) -> DateTime<Utc> {
    now.checked_sub_signed(secs_to_duration(secs))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Rule engine over the record stream
pub struct TriggerEngine {
    /// Triggers in insertion order
    triggers: Vec<TriggerCondition>,
    /// Compiled regexes of regex pattern triggers, keyed by trigger id
    regex_cache: HashMap<String, std::result::Result<Regex, String>>,
    history: VecDeque<TriggerEvent>,
    history_capacity: usize,
    message_window: RollingWindow,
    error_window: RollingWindow,
    retention_secs: f64,
    handlers: ActionHandlers,
    invalid_evaluations: u64,
}

impl Default for TriggerEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TriggerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerEngine")
            .field("triggers", &self.triggers.len())
            .field("history", &self.history.len())
            .field("retention_secs", &self.retention_secs)
            .field("handlers", &self.handlers)
            .finish()
    }
}

impl TriggerEngine {
    /// Create an engine with the default history bound and retention
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_HISTORY_CAPACITY, DEFAULT_RETENTION_SECS)
    }

    /// Create an engine from the `[triggers]` config section
    pub fn from_config(config: &TriggerConfig) -> Self {
        Self::with_limits(config.history_capacity, config.retention_secs)
    }

    pub fn with_limits(history_capacity: usize, retention_secs: f64) -> Self {
        Self {
            triggers: Vec::new(),
            regex_cache: HashMap::new(),
            history: VecDeque::with_capacity(history_capacity.min(DEFAULT_HISTORY_CAPACITY)),
            history_capacity,
            message_window: RollingWindow::new(),
            error_window: RollingWindow::new(),
            retention_secs,
            handlers: ActionHandlers::new(),
            invalid_evaluations: 0,
        }
    }

    /// Add a trigger. A trigger with the same id is replaced in place.
    pub fn add(&mut self, trigger: TriggerCondition) {
        self.compile_pattern(&trigger);
        match self.triggers.iter_mut().find(|t| t.id == trigger.id) {
            Some(existing) => *existing = trigger,
            None => {
                tracing::debug!(trigger_id = %trigger.id, "Added trigger '{}'", trigger.name);
                self.triggers.push(trigger);
            }
        }
    }

    /// Remove a trigger. Unknown ids are ignored.
    pub fn remove(&mut self, id: &str) -> Option<TriggerCondition> {
        let idx = self.triggers.iter().position(|t| t.id == id)?;
        self.regex_cache.remove(id);
        Some(self.triggers.remove(idx))
    }

    /// Enable or disable a trigger. Unknown ids are ignored.
    pub fn set_enabled(&mut self, id: &str, enabled: bool) {
        if let Some(t) = self.triggers.iter_mut().find(|t| t.id == id) {
            t.enabled = enabled;
        }
    }

    /// Remove every trigger
    pub fn clear(&mut self) {
        self.triggers.clear();
        self.regex_cache.clear();
    }

    pub fn get(&self, id: &str) -> Option<&TriggerCondition> {
        self.triggers.iter().find(|t| t.id == id)
    }

    /// Triggers in evaluation order
    pub fn triggers(&self) -> &[TriggerCondition] {
        &self.triggers
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    /// Reset fire statistics of every trigger
    pub fn reset_counters(&mut self) {
        for t in &mut self.triggers {
            t.fire_count = 0;
            t.last_fired = None;
        }
    }

    fn compile_pattern(&mut self, trigger: &TriggerCondition) {
        self.regex_cache.remove(&trigger.id);
        if let TriggerKind::MessagePattern {
            pattern,
            is_regex: true,
        } = &trigger.kind
        {
            let compiled = Regex::new(pattern).map_err(|e| e.to_string());
            if let Err(ref e) = compiled {
                tracing::warn!(
                    trigger_id = %trigger.id,
                    "Invalid regex in trigger '{}': {}",
                    trigger.name,
                    e
                );
            }
            self.regex_cache.insert(trigger.id.clone(), compiled);
        }
    }

    /// Register the handler for an action
    pub fn on_action<F>(&mut self, action: TriggerAction, handler: F)
    where
        F: FnMut(&TriggerEvent) + Send + 'static,
    {
        self.handlers.set(action, handler);
    }

    pub fn handlers_mut(&mut self) -> &mut ActionHandlers {
        &mut self.handlers
    }

    /// Evaluate a record against every enabled trigger and return the fired events
    pub fn evaluate(&mut self, record: &FrameRecord) -> Vec<TriggerEvent> {
        self.evaluate_with_outcomes(record)
            .into_iter()
            .filter_map(|(_, outcome)| match outcome {
                Evaluation::Fired(event) => Some(event),
                _ => None,
            })
            .collect()
    }

    /// Evaluate a record and return the outcome of every enabled trigger
    ///
    /// Fired triggers get their statistics updated, their events appended to
    /// the history and their action handlers invoked before this returns.
    pub fn evaluate_with_outcomes(&mut self, record: &FrameRecord) -> Vec<(String, Evaluation)> {
        let now = record.timestamp;
        self.message_window.push(now);
        if record.level == Level::Error {
            self.error_window.push(now);
        }
        let cutoff = window_start(now, self.retention_secs);
        self.message_window.prune(cutoff);
        self.error_window.prune(cutoff);

        let outcomes: Vec<(usize, Evaluation)> = self
            .triggers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.enabled)
            .map(|(idx, t)| (idx, self.evaluate_trigger(t, record)))
            .collect();

        let mut results = Vec::with_capacity(outcomes.len());
        for (idx, outcome) in outcomes {
            match &outcome {
                Evaluation::Fired(event) => self.record_fire(idx, event),
                Evaluation::Invalid(reason) => {
                    self.invalid_evaluations += 1;
                    tracing::trace!(trigger_id = %self.triggers[idx].id, "Invalid evaluation: {}", reason);
                }
                Evaluation::NotFired => {}
            }
            results.push((self.triggers[idx].id.clone(), outcome));
        }
        results
    }

    fn record_fire(&mut self, idx: usize, event: &TriggerEvent) {
        let trigger = &mut self.triggers[idx];
        trigger.mark_fired(event.timestamp);
        tracing::debug!(
            trigger_id = %trigger.id,
            fire_count = trigger.fire_count,
            "Trigger fired: {}",
            event.message
        );

        if self.history.len() >= self.history_capacity {
            self.history.pop_front();
        }
        if self.history_capacity > 0 {
            self.history.push_back(event.clone());
        }

        for action in &trigger.actions {
            self.handlers.dispatch(*action, event);
        }
    }

    fn evaluate_trigger(&self, trigger: &TriggerCondition, record: &FrameRecord) -> Evaluation {
        let fired = |message: String, details: EventDetails| {
            Evaluation::Fired(TriggerEvent {
                trigger_id: trigger.id.clone(),
                trigger_name: trigger.name.clone(),
                timestamp: record.timestamp,
                message,
                details,
            })
        };

        match &trigger.kind {
            TriggerKind::VariableThreshold {
                variable_name,
                comparison,
                threshold,
            } => {
                if threshold.is_nan() {
                    return Evaluation::Invalid("threshold is NaN".into());
                }
                let Some(value) = record
                    .data_fields
                    .get(variable_name)
                    .and_then(|v| v.numeric_comparand())
                else {
                    return Evaluation::NotFired;
                };
                if !comparison.apply(value, *threshold) {
                    return Evaluation::NotFired;
                }
                fired(
                    format!("{} {} {:?} (value={:?})", variable_name, comparison, threshold, value),
                    EventDetails::Threshold {
                        variable: variable_name.clone(),
                        value,
                        threshold: *threshold,
                        comparison: *comparison,
                    },
                )
            }

            TriggerKind::MessagePattern { pattern, is_regex } => {
                if pattern.is_empty() {
                    return Evaluation::NotFired;
                }
                let (matched, message) = if *is_regex {
                    match self.regex_cache.get(&trigger.id) {
                        Some(Ok(re)) => (re.is_match(&record.text), format!("Pattern matched: {}", pattern)),
                        Some(Err(e)) => return Evaluation::Invalid(format!("invalid regex: {}", e)),
                        None => return Evaluation::Invalid("regex not compiled".into()),
                    }
                } else {
                    (record.text.contains(pattern.as_str()), format!("Text contains: {}", pattern))
                };
                if !matched {
                    return Evaluation::NotFired;
                }
                fired(
                    message,
                    EventDetails::Pattern {
                        pattern: pattern.clone(),
                        text: record.text.clone(),
                    },
                )
            }

            TriggerKind::MessageRate {
                rate_threshold,
                window_secs,
            } => {
                if !(window_secs.is_finite() && *window_secs > 0.0) {
                    return Evaluation::Invalid(format!("window must be positive, got {}", window_secs));
                }
                let count = self
                    .message_window
                    .count_since(window_start(record.timestamp, *window_secs));
                let rate = count as f64 / window_secs;
                let exceeded = rate > *rate_threshold;
                if !exceeded {
                    return Evaluation::NotFired;
                }
                fired(
                    format!(
                        "Message rate {:.2} msg/s exceeds threshold {:?} msg/s",
                        rate, rate_threshold
                    ),
                    EventDetails::Rate {
                        rate,
                        threshold: *rate_threshold,
                        window_secs: *window_secs,
                    },
                )
            }

            TriggerKind::ErrorCount {
                threshold,
                window_secs,
            } => {
                if !(window_secs.is_finite() && *window_secs > 0.0) {
                    return Evaluation::Invalid(format!("window must be positive, got {}", window_secs));
                }
                let error_count = self
                    .error_window
                    .count_since(window_start(record.timestamp, *window_secs));
                let exceeded = error_count as f64 > *threshold;
                if !exceeded {
                    return Evaluation::NotFired;
                }
                fired(
                    format!("Error count {} exceeds threshold {:?}", error_count, threshold),
                    EventDetails::ErrorCount {
                        error_count,
                        threshold: *threshold,
                        window_secs: *window_secs,
                    },
                )
            }
        }
    }

    /// Fired events, oldest first
    pub fn history(&self) -> &VecDeque<TriggerEvent> {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn stats(&self) -> TriggerStats {
        TriggerStats {
            total_triggers: self.triggers.len(),
            enabled_triggers: self.triggers.iter().filter(|t| t.enabled).count(),
            total_fires: self.triggers.iter().map(|t| t.fire_count).sum(),
            history_count: self.history.len(),
            invalid_evaluations: self.invalid_evaluations,
        }
    }

    /// Number of records currently held in the rate window
    pub fn tracked_messages(&self) -> usize {
        self.message_window.len()
    }

    /// Number of ERROR records currently held in the error window
    pub fn tracked_errors(&self) -> usize {
        self.error_window.len()
    }

    /// Save the trigger set as JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        store::save_triggers(path, &self.triggers)
    }

    /// Replace the trigger set with the contents of `path`
    ///
    /// A missing file leaves the engine untouched and returns `Ok(0)`. On any
    /// error the current set is kept. Returns the number of loaded triggers.
    pub fn load(&mut self, path: &Path) -> Result<usize> {
        let Some(loaded) = store::load_triggers(path)? else {
            return Ok(0);
        };

        self.clear();
        for trigger in loaded {
            self.add(trigger);
        }
        tracing::info!("Loaded {} triggers from {:?}", self.triggers.len(), path);
        Ok(self.triggers.len())
    }
}

/// Thread-safe handle to a [`TriggerEngine`]
///
/// Every operation takes the single lock, so add/remove/evaluate are
/// serialized against each other.
#[derive(Clone, Default)]
pub struct SharedTriggerEngine {
    inner: Arc<Mutex<TriggerEngine>>,
}

impl SharedTriggerEngine {
    pub fn new(engine: TriggerEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Lock the engine. A poisoned lock is recovered; the engine holds no
    /// invariants a panicking handler could break halfway.
    pub fn lock(&self) -> MutexGuard<'_, TriggerEngine> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn add(&self, trigger: TriggerCondition) {
        self.lock().add(trigger);
    }

    pub fn remove(&self, id: &str) -> Option<TriggerCondition> {
        self.lock().remove(id)
    }

    pub fn set_enabled(&self, id: &str, enabled: bool) {
        self.lock().set_enabled(id, enabled);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn evaluate(&self, record: &FrameRecord) -> Vec<TriggerEvent> {
        self.lock().evaluate(record)
    }

    pub fn stats(&self) -> TriggerStats {
        self.lock().stats()
    }

    /// Copy of the history, oldest first
    pub fn history_snapshot(&self) -> Vec<TriggerEvent> {
        self.lock().history().iter().cloned().collect()
    }
}

impl std::fmt::Debug for SharedTriggerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SharedTriggerEngine").field(&*self.lock()).finish()
    }
}
