//! Backend module for reading device lines
//!
//! This module handles all line I/O in a separate thread so the consumer
//! loop stays responsive. Decoded records reach the consumer through a
//! bounded crossbeam channel.
//!
//! # Architecture
//!
//! - [`LineSource`] - Producer of raw text lines (`start` / `stop` / `read_line`)
//! - [`ReaderWorker`] - Worker loop: read, decode, push without blocking
//! - [`FrameReader`] - Consumer-side handle: spawn, pop, batch drain, stop
//!
//! # Sources
//!
//! - [`ReaderLineSource`] - Any `BufRead` (stdin, sockets, test cursors)
//! - [`FileLineSource`] - A capture file opened on start
//! - [`DemoLineSource`] - Fake device for running without hardware (feature-gated)
//!
//! # Example
//!
//! ```ignore
//! use uartium_rs::backend::{FrameReader, ReaderLineSource};
//! use uartium_rs::config::ReaderConfig;
//!
//! let mut reader = FrameReader::spawn(ReaderLineSource::stdin(), &ReaderConfig::default())?;
//!
//! // Once per tick
//! for record in reader.drain_batch(50) {
//!     println!("[{}] {}", record.level, record.text);
//! }
//!
//! reader.stop();
//! ```

#[cfg(feature = "demo-source")]
pub mod demo;
pub mod source;
pub mod worker;

#[cfg(feature = "demo-source")]
pub use demo::DemoLineSource;
pub use source::{FileLineSource, LineSource, ReaderLineSource};
pub use worker::{ReaderCounters, ReaderStats, ReaderWorker, CONNECTION_LOST_TEXT};

use crate::config::{ReaderConfig, SourceConfig, SourceKind};
use crate::error::{Result, ResultExt, UartiumError};
use crate::types::FrameRecord;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Build the line source described by the `[source]` config section
pub fn open_source(source: &SourceConfig, reader: &ReaderConfig) -> Result<Box<dyn LineSource>> {
    match source.kind {
        SourceKind::Demo => {
            #[cfg(feature = "demo-source")]
            {
                Ok(Box::new(DemoLineSource::new(
                    Duration::from_secs_f64(source.demo_interval_secs),
                    Duration::from_millis(reader.read_timeout_ms),
                )))
            }
            #[cfg(not(feature = "demo-source"))]
            {
                let _ = reader;
                Err(UartiumError::Config(
                    "demo source is not available (built without the demo-source feature)"
                        .to_string(),
                ))
            }
        }
        SourceKind::Stdin => Ok(Box::new(ReaderLineSource::stdin())),
        SourceKind::File => {
            let path = source.path.as_ref().ok_or_else(|| {
                UartiumError::Config("source.path is required for a file source".to_string())
            })?;
            Ok(Box::new(FileLineSource::new(path)))
        }
    }
}

/// Handle to a running reader worker
pub struct FrameReader {
    record_rx: Receiver<FrameRecord>,
    done_rx: Receiver<()>,
    running: Arc<AtomicBool>,
    counters: Arc<ReaderCounters>,
    handle: Option<JoinHandle<()>>,
    join_timeout: Duration,
}

impl FrameReader {
    /// Start `source` and spawn the worker thread
    ///
    /// The source is started on the calling thread so open failures surface
    /// here rather than as an in-band record.
    pub fn spawn<S: LineSource + 'static>(mut source: S, config: &ReaderConfig) -> Result<Self> {
        source.start().context("Failed to start line source")?;

        let (record_tx, record_rx) = bounded(config.queue_capacity);
        let (done_tx, done_rx) = bounded(1);
        let running = Arc::new(AtomicBool::new(true));
        let counters = Arc::new(ReaderCounters::default());

        let worker = ReaderWorker::new(
            source,
            record_tx,
            done_tx,
            running.clone(),
            counters.clone(),
            Duration::from_millis(config.read_timeout_ms),
        );

        let handle = std::thread::Builder::new()
            .name("uartium-reader".to_string())
            .spawn(move || worker.run())
            .map_err(|e| UartiumError::Source(format!("Failed to spawn reader thread: {}", e)))?;

        Ok(Self {
            record_rx,
            done_rx,
            running,
            counters,
            handle: Some(handle),
            join_timeout: Duration::from_millis(config.join_timeout_ms),
        })
    }

    /// Pop one record without blocking
    pub fn read_record(&self) -> Option<FrameRecord> {
        self.record_rx.try_recv().ok()
    }

    /// Pop up to `max` records without blocking
    pub fn drain_batch(&self, max: usize) -> Vec<FrameRecord> {
        self.record_rx.try_iter().take(max).collect()
    }

    /// Records waiting in the queue
    pub fn pending(&self) -> usize {
        self.record_rx.len()
    }

    /// Whether the worker is still reading
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> ReaderStats {
        self.counters.snapshot()
    }

    pub fn dropped_count(&self) -> u64 {
        self.stats().dropped_records
    }

    pub fn received_count(&self) -> u64 {
        self.stats().received_lines
    }

    /// Request the worker to exit and wait for it, up to the join timeout
    ///
    /// Returns `true` if the worker exited in time. A worker stuck in a
    /// blocking read is detached. Records already queued stay readable.
    pub fn stop(&mut self) -> bool {
        self.running.store(false, Ordering::SeqCst);
        let Some(handle) = self.handle.take() else {
            return true;
        };

        match self.done_rx.recv_timeout(self.join_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if handle.join().is_err() {
                    tracing::error!("Reader thread panicked");
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    "Reader thread did not stop within {:?}, detaching",
                    self.join_timeout
                );
                false
            }
        }
    }
}

impl Drop for FrameReader {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for FrameReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameReader")
            .field("running", &self.is_running())
            .field("pending", &self.pending())
            .field("stats", &self.stats())
            .finish()
    }
}
