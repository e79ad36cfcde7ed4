//! Consumer loop
//!
//! The [`Monitor`] is the single consumer of the reader queue. On each tick
//! it pops at most `batch_limit` records, runs them through the trigger
//! engine, updates per-level counters and keeps a bounded log of records for
//! export.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::backend::FrameReader;
use crate::config::{MonitorConfig, ReaderConfig};
use crate::trigger::{TriggerAction, TriggerEngine, TriggerEvent};
use crate::types::{FrameRecord, LevelCounts};

/// Result of one consumer tick
#[derive(Debug, Clone, Default)]
pub struct TickSummary {
    /// Records taken from the queue
    pub processed: usize,
    /// Trigger events fired while processing them
    pub events: Vec<TriggerEvent>,
}

/// Drains records, evaluates triggers and keeps the capture log
#[derive(Debug)]
pub struct Monitor {
    engine: TriggerEngine,
    batch_limit: usize,
    max_records: usize,
    records: VecDeque<FrameRecord>,
    level_counts: LevelCounts,
    paused: Arc<AtomicBool>,
}

impl Monitor {
    /// Create a monitor around an engine
    ///
    /// A PAUSE_CAPTURE handler is registered on the engine that pauses this
    /// monitor; register your own afterwards to replace it.
    pub fn new(mut engine: TriggerEngine, reader: &ReaderConfig, config: &MonitorConfig) -> Self {
        let paused = Arc::new(AtomicBool::new(false));
        let flag = paused.clone();
        engine.on_action(TriggerAction::PauseCapture, move |event| {
            tracing::info!(trigger_id = %event.trigger_id, "Capture paused by trigger '{}'", event.trigger_name);
            flag.store(true, Ordering::SeqCst);
        });

        Self {
            engine,
            batch_limit: reader.batch_limit.max(1),
            max_records: config.max_records.max(1),
            records: VecDeque::new(),
            level_counts: LevelCounts::default(),
            paused,
        }
    }

    /// Process one record outside of a tick
    pub fn process(&mut self, record: FrameRecord) -> Vec<TriggerEvent> {
        let events = self.engine.evaluate(&record);
        self.level_counts.record(record.level);
        if self.records.len() >= self.max_records {
            self.records.pop_front();
        }
        self.records.push_back(record);
        events
    }

    /// Drain up to `batch_limit` records from the reader
    pub fn tick(&mut self, reader: &FrameReader) -> TickSummary {
        self.tick_with(|| reader.read_record())
    }

    /// Drain up to `batch_limit` records from `next`
    ///
    /// Stops early when `next` runs dry or when a trigger paused capture.
    pub fn tick_with<F>(&mut self, mut next: F) -> TickSummary
    where
        F: FnMut() -> Option<FrameRecord>,
    {
        let mut summary = TickSummary::default();
        while summary.processed < self.batch_limit && !self.is_paused() {
            let Some(record) = next() else {
                break;
            };
            summary.events.extend(self.process(record));
            summary.processed += 1;
        }
        summary
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Captured records, oldest first
    pub fn records(&self) -> &VecDeque<FrameRecord> {
        &self.records
    }

    pub fn level_counts(&self) -> LevelCounts {
        self.level_counts
    }

    pub fn engine(&self) -> &TriggerEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut TriggerEngine {
        &mut self.engine
    }

    /// Forget captured records and counters (triggers and history are kept)
    pub fn clear(&mut self) {
        self.records.clear();
        self.level_counts.clear();
    }
}
