//! Integration tests for exporting a capture
//!
//! Records go through the monitor (so level counts are real) and are then
//! written in each export format.

mod common;

use common::builders::RecordBuilder;
use uartium_rs::config::{ExportConfig, ExportFormat, MonitorConfig, ReaderConfig};
use uartium_rs::export::{export_records, export_to_directory, ExportOptions};
use uartium_rs::monitor::Monitor;
use uartium_rs::trigger::TriggerEngine;
use uartium_rs::types::Level;

fn captured_monitor() -> Monitor {
    let mut monitor = Monitor::new(
        TriggerEngine::new(),
        &ReaderConfig::default(),
        &MonitorConfig::default(),
    );
    let records = vec![
        RecordBuilder::info("Voltage check")
            .at_ms(0)
            .device_ts(100)
            .float("voltage", 4.75)
            .float("current", 0.5)
            .build(),
        RecordBuilder::error("CRC mismatch").at_ms(10).build(),
        RecordBuilder::new(Level::Warning, "Battery low").at_ms(20).uint("battery", 9).build(),
        RecordBuilder::new(Level::Debug, "tick").at_ms(30).build(),
    ];
    for record in records {
        monitor.process(record);
    }
    monitor
}

#[test]
fn test_csv_export_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capture.csv");
    let monitor = captured_monitor();

    let written = export_records(
        &path,
        monitor.records(),
        monitor.level_counts(),
        &ExportOptions::new(ExportFormat::Csv),
    )
    .unwrap();
    assert_eq!(written, 4);

    let content = std::fs::read_to_string(&path).unwrap();
    let rows: Vec<_> = content.lines().skip(6).collect();
    assert_eq!(rows.len(), 5);
    assert!(rows[0].contains(",DEBUG,tick,"));
    assert_eq!(rows[1], "100,INFO,Voltage check,voltage,4.75,float");
    assert_eq!(rows[2], "100,INFO,Voltage check,current,0.5,float");
    assert!(rows[3].ends_with(",WARNING,Battery low,battery,9,uint"));
    assert!(rows[4].ends_with(",ERROR,CRC mismatch,,,"));
}

#[test]
fn test_filtered_json_export() {
    let dir = tempfile::tempdir().unwrap();
    let monitor = captured_monitor();
    let config = ExportConfig {
        directory: dir.path().to_path_buf(),
        format: ExportFormat::Json,
        apply_level_filter: true,
        levels: vec![Level::Error, Level::Warning],
        on_exit: false,
    };

    let path = export_to_directory(
        &config.directory,
        monitor.records(),
        monitor.level_counts(),
        &ExportOptions::from_config(&config),
    )
    .unwrap();
    assert_eq!(path.extension().unwrap(), "json");

    let doc: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(doc["metadata"]["total_messages"], 4);
    assert_eq!(doc["metadata"]["filters_applied"], true);

    let levels: Vec<_> = doc["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["level"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(levels, vec!["WARNING", "ERROR"]);
    assert_eq!(doc["messages"][0]["data_fields"]["battery"]["value"], 9);
}

#[test]
fn test_txt_export_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capture.txt");
    let monitor = captured_monitor();

    export_records(
        &path,
        monitor.records(),
        monitor.level_counts(),
        &ExportOptions::new(ExportFormat::Txt).only([Level::Info]),
    )
    .unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("Filters Applied: true"));
    assert!(content.contains("[INFO] Messages (1)"));
    assert!(content.contains("| Voltage check"));
    assert!(content.contains("           voltage = 4.75 (float)"));
    assert!(!content.contains("CRC mismatch"));
    assert!(content.contains("END OF EXPORT"));
}
