//! Uartium - Main Entry Point
//!
//! Reads device lines from the configured source, prints decoded records,
//! evaluates triggers and saves the trigger set on exit.
//!
//! The config file is taken from `UARTIUM_CONFIG` when set, otherwise from
//! the platform data directory.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use uartium_rs::{
    backend::{open_source, FrameReader},
    config::AppConfig,
    export::{export_to_directory, ExportOptions},
    logging::{self, TRIGGER_LOG_TARGET},
    monitor::Monitor,
    trigger::{TriggerAction, TriggerEngine},
    types::FrameRecord,
};

fn main() -> anyhow::Result<()> {
    let config = match std::env::var_os("UARTIUM_CONFIG").map(PathBuf::from) {
        Some(path) => AppConfig::load(&path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => AppConfig::load_or_default(None),
    };

    let _trigger_log_guard = logging::init(&config.logging);

    tracing::info!("Starting Uartium");

    let mut engine = TriggerEngine::from_config(&config.triggers);
    match engine.load(&config.triggers.triggers_file) {
        Ok(n) if n > 0 && config.triggers.reset_fire_counts_on_load => engine.reset_counters(),
        Ok(_) => {}
        Err(e) => tracing::warn!("Failed to load triggers, starting empty: {}", e),
    }
    register_action_handlers(&mut engine);

    let mut monitor = Monitor::new(engine, &config.reader, &config.monitor);

    let source = open_source(&config.source, &config.reader)?;
    let mut reader = FrameReader::spawn(source, &config.reader)?;
    tracing::info!("Reading from {:?} source", config.source.kind);

    let tick = Duration::from_millis(config.monitor.tick_ms);
    loop {
        let summary = monitor.tick_with(|| {
            let record = reader.read_record()?;
            print_record(&record);
            Some(record)
        });

        if monitor.is_paused() {
            tracing::info!("Capture paused, stopping reader");
            break;
        }
        if summary.processed == 0 && !reader.is_running() && reader.pending() == 0 {
            break;
        }
        if summary.processed < config.reader.batch_limit {
            std::thread::sleep(tick);
        }
    }

    // Signal the reader to stop and wait for it
    tracing::info!("Shutting down...");
    reader.stop();

    let reader_stats = reader.stats();
    let trigger_stats = monitor.engine().stats();
    tracing::info!(
        received = reader_stats.received_lines,
        dropped = reader_stats.dropped_records,
        fires = trigger_stats.total_fires,
        "Capture finished"
    );

    monitor
        .engine()
        .save(&config.triggers.triggers_file)
        .context("Failed to save triggers")?;

    if config.export.on_exit {
        let path = export_to_directory(
            &config.export.directory,
            monitor.records(),
            monitor.level_counts(),
            &ExportOptions::from_config(&config.export),
        )
        .context("Export failed")?;
        tracing::info!("Exported capture to {:?}", path);
    }

    Ok(())
}

/// Wire trigger actions to this binary's outputs
///
/// PAUSE_CAPTURE is handled by the [`Monitor`].
fn register_action_handlers(engine: &mut TriggerEngine) {
    engine.on_action(TriggerAction::VisualAlert, |event| {
        tracing::warn!(trigger_id = %event.trigger_id, "ALERT [{}] {}", event.trigger_name, event.message);
    });

    engine.on_action(TriggerAction::AudioAlert, |_| {
        eprint!("\x07");
    });

    engine.on_action(TriggerAction::LogToFile, |event| {
        let details = serde_json::to_string(&event.details).unwrap_or_default();
        tracing::info!(
            target: TRIGGER_LOG_TARGET,
            trigger_id = %event.trigger_id,
            trigger = %event.trigger_name,
            details = %details,
            "{}",
            event.message
        );
    });

    engine.on_action(TriggerAction::HighlightMessage, |event| {
        tracing::info!(trigger_id = %event.trigger_id, "Highlight: {}", event.message);
    });
}

fn print_record(record: &FrameRecord) {
    let mut line = format!(
        "{} [{}] {}",
        record.timestamp.with_timezone(&chrono::Local).format("%H:%M:%S%.3f"),
        record.level,
        record.text
    );
    for (name, value) in record.data_fields.iter() {
        line.push_str(&format!(" {}={}", name, value.value));
    }
    if let Some(ts) = record.device_timestamp {
        line.push_str(&format!(" (t={})", ts));
    }
    println!("{}", line);
}
