//! Reader Worker Thread Implementation
//!
//! This module contains the loop that runs in a separate thread, pulls raw
//! lines from a [`LineSource`], decodes them and pushes the records into a
//! bounded crossbeam channel.
//!
//! # Backpressure
//!
//! The worker never blocks on a full queue. Records that do not fit are
//! dropped and counted; the consumer drains at its own pace. On a bounded
//! queue with room for more than one record, the last slot is reserved for
//! the connection-lost record so a disconnect is reported even while the
//! queue is overflowing.
//!
//! # Source failures
//!
//! Failures are reported in-band as synthetic ERROR records:
//!
//! - A disconnect injects `Serial connection lost` and ends the worker
//! - Any other read error injects `Reader error: <e>` and the worker keeps going

use crate::backend::source::LineSource;
use crate::protocol::FrameDecoder;
use crate::types::{FrameRecord, Level};
use crossbeam_channel::{SendTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Text of the record injected when the source disconnects
pub const CONNECTION_LOST_TEXT: &str = "Serial connection lost";

/// Upper bound on the pause after a read that returned no line
const MAX_IDLE_BACKOFF: Duration = Duration::from_millis(1);

/// Counters shared between the worker and its handle
#[derive(Debug, Default)]
pub struct ReaderCounters {
    received: AtomicU64,
    dropped: AtomicU64,
    errors: AtomicU64,
}

impl ReaderCounters {
    pub fn snapshot(&self) -> ReaderStats {
        ReaderStats {
            received_lines: self.received.load(Ordering::Relaxed),
            dropped_records: self.dropped.load(Ordering::Relaxed),
            read_errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Statistics about the reader
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    /// Lines read from the source and decoded
    pub received_lines: u64,
    /// Records dropped because the queue was full
    pub dropped_records: u64,
    /// Read errors reported by the source
    pub read_errors: u64,
}

/// The worker that runs the read loop
pub struct ReaderWorker<S> {
    /// Source of raw lines (already started)
    source: S,
    decoder: FrameDecoder,
    /// Sender side of the record queue
    record_tx: Sender<FrameRecord>,
    /// Signalled once when the loop has exited
    done_tx: Sender<()>,
    /// Cleared by the handle to request shutdown, or by the worker on disconnect
    running: Arc<AtomicBool>,
    counters: Arc<ReaderCounters>,
    /// Pause after a transient read error; also bounds the idle backoff and
    /// the wait for room for the connection-lost record
    poll_interval: Duration,
}

impl<S: LineSource> ReaderWorker<S> {
    pub fn new(
        source: S,
        record_tx: Sender<FrameRecord>,
        done_tx: Sender<()>,
        running: Arc<AtomicBool>,
        counters: Arc<ReaderCounters>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            source,
            decoder: FrameDecoder::new(),
            record_tx,
            done_tx,
            running,
            counters,
            poll_interval,
        }
    }

    /// Run the read loop until stopped or disconnected
    pub fn run(mut self) {
        tracing::info!("Reader worker started");

        while self.running.load(Ordering::SeqCst) {
            match self.source.read_line() {
                Ok(Some(line)) => {
                    self.counters.received.fetch_add(1, Ordering::Relaxed);
                    let record = self.decoder.decode(&line);
                    self.push(record);
                }
                Ok(None) => self.idle(),
                Err(e) if e.is_disconnect() => {
                    tracing::warn!("Line source disconnected: {}", e);
                    self.push_final(FrameRecord::new(Level::Error, CONNECTION_LOST_TEXT));
                    break;
                }
                Err(e) => {
                    self.counters.errors.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("Read error: {}", e);
                    self.push(FrameRecord::new(Level::Error, format!("Reader error: {}", e)));
                    if !self.poll_interval.is_zero() {
                        std::thread::sleep(self.poll_interval);
                    }
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        self.source.stop();
        let _ = self.done_tx.send(());

        let stats = self.counters.snapshot();
        tracing::info!(
            received = stats.received_lines,
            dropped = stats.dropped_records,
            "Reader worker stopped"
        );
    }

    fn idle(&self) {
        let backoff = self.poll_interval.min(MAX_IDLE_BACKOFF);
        if backoff.is_zero() {
            std::thread::yield_now();
        } else {
            std::thread::sleep(backoff);
        }
    }

    /// Whether only the reserved slot is left in the queue
    fn reserved_slot_only(&self) -> bool {
        match self.record_tx.capacity() {
            Some(capacity) if capacity > 1 => self.record_tx.len() + 1 >= capacity,
            _ => false,
        }
    }

    fn count_drop(&self) {
        let dropped = self.counters.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        if dropped == 1 || dropped % 1000 == 0 {
            tracing::warn!(dropped, "Record queue full, dropping records");
        }
    }

    /// Queue a record without blocking, counting it if the queue is full
    fn push(&mut self, record: FrameRecord) {
        if self.reserved_slot_only() {
            self.count_drop();
            return;
        }
        match self.record_tx.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => self.count_drop(),
            Err(TrySendError::Disconnected(_)) => {
                tracing::debug!("Record receiver gone, stopping reader");
                self.running.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Queue the last record of the stream, using the reserved slot and
    /// waiting up to `poll_interval` if the queue is still full
    fn push_final(&mut self, record: FrameRecord) {
        match self.record_tx.send_timeout(record, self.poll_interval) {
            Ok(()) | Err(SendTimeoutError::Disconnected(_)) => {}
            Err(SendTimeoutError::Timeout(_)) => {
                self.count_drop();
                tracing::warn!("Record queue full, connection-lost record dropped");
            }
        }
    }
}
