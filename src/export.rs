//! Record export
//!
//! Writes captured records to CSV, JSON or plain text. Every format groups
//! records by level in the order DEBUG, INFO, WARNING, ERROR and can be
//! restricted to a subset of levels.
//!
//! - **CSV**: a `#`-prefixed metadata header, then one row per variable
//!   (or one row per record without variables)
//! - **JSON**: `metadata` (including level counts) plus a `messages` array
//!   with typed fields
//! - **TXT**: human readable log, one section per level

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeZone};
use serde::Serialize;

use crate::config::{ExportConfig, ExportFormat};
use crate::error::{Result, ResultExt, UartiumError};
use crate::types::{DataFields, FrameRecord, Level, LevelCounts};

const APPLICATION: &str = "Uartium UART Monitor";
const FORMAT_VERSION: &str = "1.0";
const CSV_COLUMNS: [&str; 6] = [
    "TIMESTAMP",
    "EVENT_LEVEL",
    "MESSAGE_TEXT",
    "VARIABLE_NAME",
    "VARIABLE_VALUE",
    "VARIABLE_TYPE",
];

/// What to export and how
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub format: ExportFormat,
    /// Only export the levels in `levels`
    pub apply_level_filter: bool,
    pub levels: Vec<Level>,
}

impl ExportOptions {
    /// Export every level in `format`
    pub fn new(format: ExportFormat) -> Self {
        Self {
            format,
            apply_level_filter: false,
            levels: Level::EXPORT_ORDER.to_vec(),
        }
    }

    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            format: config.format,
            apply_level_filter: config.apply_level_filter,
            levels: config.levels.clone(),
        }
    }

    /// Restrict the export to `levels`
    pub fn only(mut self, levels: impl IntoIterator<Item = Level>) -> Self {
        self.apply_level_filter = true;
        self.levels = levels.into_iter().collect();
        self
    }

    /// Whether records of `level` are exported
    pub fn includes(&self, level: Level) -> bool {
        !self.apply_level_filter || self.levels.contains(&level)
    }
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::new(ExportFormat::default())
    }
}

/// Header values shared by all formats
#[derive(Debug, Clone, Copy)]
pub struct ExportMeta {
    pub exported_at: DateTime<Local>,
    /// Counts over everything captured, not just what is exported
    pub level_counts: LevelCounts,
    pub filters_applied: bool,
}

/// Records of one level, in capture order
pub type LevelGroup<'a> = (Level, Vec<&'a FrameRecord>);

/// Group records by level in export order, dropping filtered levels
pub fn group_by_level<'a, I>(records: I, options: &ExportOptions) -> Vec<LevelGroup<'a>>
where
    I: IntoIterator<Item = &'a FrameRecord>,
{
    let mut groups: Vec<LevelGroup<'a>> = Level::EXPORT_ORDER
        .into_iter()
        .filter(|level| options.includes(*level))
        .map(|level| (level, Vec::new()))
        .collect();

    for record in records {
        if let Some((_, group)) = groups.iter_mut().find(|(level, _)| *level == record.level) {
            group.push(record);
        }
    }
    groups
}

/// `uartium_export_YYYYMMDD_HHMMSS.<ext>`
pub fn default_export_filename<Tz: TimeZone>(format: ExportFormat, at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "uartium_export_{}.{}",
        at.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

/// Export `records` into `dir` under the default file name
///
/// Returns the path written.
pub fn export_to_directory<'a, I>(
    dir: impl AsRef<Path>,
    records: I,
    level_counts: LevelCounts,
    options: &ExportOptions,
) -> Result<PathBuf>
where
    I: IntoIterator<Item = &'a FrameRecord>,
{
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory {:?}", dir))?;

    let now = Local::now();
    let path = dir.join(default_export_filename(options.format, &now));
    export_records(&path, records, level_counts, options)?;
    Ok(path)
}

/// Export `records` to `path`
///
/// Returns the number of records written.
pub fn export_records<'a, I>(
    path: impl AsRef<Path>,
    records: I,
    level_counts: LevelCounts,
    options: &ExportOptions,
) -> Result<usize>
where
    I: IntoIterator<Item = &'a FrameRecord>,
{
    let path = path.as_ref();
    let groups = group_by_level(records, options);
    let meta = ExportMeta {
        exported_at: Local::now(),
        level_counts,
        filters_applied: options.apply_level_filter,
    };

    let file = File::create(path)
        .with_context(|| format!("Failed to create export file {:?}", path))?;
    let mut writer = BufWriter::new(file);
    write_export(&mut writer, options.format, &groups, &meta)?;
    writer
        .flush()
        .with_context(|| format!("Failed to write export file {:?}", path))?;

    let written = groups.iter().map(|(_, group)| group.len()).sum();
    tracing::info!(
        format = %options.format,
        records = written,
        "Exported records to {:?}",
        path
    );
    Ok(written)
}

/// Write grouped records in `format`
pub fn write_export<W: Write>(
    writer: &mut W,
    format: ExportFormat,
    groups: &[LevelGroup<'_>],
    meta: &ExportMeta,
) -> Result<()> {
    match format {
        ExportFormat::Csv => write_csv(writer, groups, meta).context("Failed to write CSV export"),
        ExportFormat::Json => write_json(writer, groups, meta),
        ExportFormat::Txt => write_txt(writer, groups, meta).context("Failed to write text export"),
    }
}

// ==================== CSV ====================

/// Quote a CSV cell when it contains a delimiter, quote or line break
fn csv_cell(value: &str) -> std::borrow::Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\"")).into()
    } else {
        value.into()
    }
}

fn csv_row<W: Write>(writer: &mut W, cells: &[&str]) -> std::io::Result<()> {
    let row: Vec<_> = cells.iter().map(|c| csv_cell(c)).collect();
    writeln!(writer, "{}", row.join(","))
}

/// Device timestamp if present, else whole host Unix seconds
fn export_timestamp(record: &FrameRecord) -> String {
    match record.device_timestamp {
        Some(ts) => ts.to_string(),
        None => record.timestamp.timestamp().to_string(),
    }
}

fn write_csv<W: Write>(
    writer: &mut W,
    groups: &[LevelGroup<'_>],
    meta: &ExportMeta,
) -> std::io::Result<()> {
    let exported_at = meta.exported_at.format("%Y-%m-%dT%H:%M:%S%.6f").to_string();
    let total = meta.level_counts.total().to_string();
    let filtered = meta.filters_applied.to_string();
    csv_row(writer, &["# Uartium Export"])?;
    csv_row(writer, &["# Export Time:", exported_at.as_str()])?;
    csv_row(writer, &["# Total Messages:", total.as_str()])?;
    csv_row(writer, &["# Filters Applied:", filtered.as_str()])?;
    writeln!(writer)?;
    csv_row(writer, &CSV_COLUMNS)?;

    for (level, records) in groups {
        for record in records {
            let ts = export_timestamp(record);
            if record.data_fields.is_empty() {
                csv_row(writer, &[ts.as_str(), level.tag(), record.text.as_str(), "", "", ""])?;
                continue;
            }
            for (name, value) in record.data_fields.iter() {
                let rendered = value.value.to_string();
                csv_row(
                    writer,
                    &[
                        ts.as_str(),
                        level.tag(),
                        record.text.as_str(),
                        name,
                        rendered.as_str(),
                        value.type_tag.label(),
                    ],
                )?;
            }
        }
    }
    Ok(())
}

// ==================== JSON ====================

#[derive(Serialize)]
struct JsonExport<'a> {
    metadata: JsonMetadata,
    messages: Vec<JsonMessage<'a>>,
}

#[derive(Serialize)]
struct JsonMetadata {
    export_time: String,
    application: &'static str,
    version: &'static str,
    total_messages: u64,
    filters_applied: bool,
    level_counts: LevelCounts,
}

#[derive(Serialize)]
struct JsonMessage<'a> {
    /// Host Unix seconds
    timestamp: f64,
    device_timestamp: Option<u32>,
    level: Level,
    text: &'a str,
    data_fields: &'a DataFields,
}

fn write_json<W: Write>(writer: &mut W, groups: &[LevelGroup<'_>], meta: &ExportMeta) -> Result<()> {
    let document = JsonExport {
        metadata: JsonMetadata {
            export_time: meta.exported_at.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            application: APPLICATION,
            version: FORMAT_VERSION,
            total_messages: meta.level_counts.total(),
            filters_applied: meta.filters_applied,
            level_counts: meta.level_counts,
        },
        messages: groups
            .iter()
            .flat_map(|(_, records)| records.iter())
            .map(|record| JsonMessage {
                timestamp: record.unix_seconds(),
                device_timestamp: record.device_timestamp,
                level: record.level,
                text: &record.text,
                data_fields: &record.data_fields,
            })
            .collect(),
    };

    serde_json::to_writer_pretty(&mut *writer, &document)
        .map_err(|e| UartiumError::Export(format!("JSON export failed: {}", e)))?;
    writeln!(writer).context("Failed to write JSON export")?;
    Ok(())
}

// ==================== TXT ====================

fn write_txt<W: Write>(
    writer: &mut W,
    groups: &[LevelGroup<'_>],
    meta: &ExportMeta,
) -> std::io::Result<()> {
    let rule = "=".repeat(80);
    writeln!(writer, "{}", rule)?;
    writeln!(writer, "UARTIUM UART MONITOR - MESSAGE LOG")?;
    writeln!(writer, "{}", rule)?;
    writeln!(writer, "Export Time: {}", meta.exported_at.format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(writer, "Total Messages: {}", meta.level_counts.total())?;
    writeln!(writer, "Filters Applied: {}", meta.filters_applied)?;
    writeln!(writer, "{}", rule)?;
    writeln!(writer)?;

    for (level, records) in groups {
        if records.is_empty() {
            continue;
        }
        writeln!(writer)?;
        writeln!(writer, "[{}] Messages ({})", level, records.len())?;
        writeln!(writer, "{}", "-".repeat(80))?;

        for record in records {
            let local = record.timestamp.with_timezone(&Local);
            writeln!(writer, "{} | {}", local.format("%H:%M:%S%.3f"), record.text)?;
            for (name, value) in record.data_fields.iter() {
                writeln!(
                    writer,
                    "           {} = {} ({})",
                    name,
                    value.value,
                    value.type_tag.label()
                )?;
            }
        }
    }

    writeln!(writer)?;
    writeln!(writer, "{}", rule)?;
    writeln!(writer, "END OF EXPORT")?;
    writeln!(writer, "{}", rule)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TypeTag, TypedValue, Variant};
    use chrono::{TimeZone, Utc};

    fn sample_records() -> Vec<FrameRecord> {
        let t0 = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        vec![
            FrameRecord::at(t0, Level::Error, "boom"),
            FrameRecord::at(t0, Level::Info, "Sensor, readings")
                .with_device_timestamp(1234)
                .with_field("temp", TypedValue::new(Variant::Float(23.5), TypeTag::Float))
                .with_field("ok", TypedValue::new(Variant::Uint(1), TypeTag::Uint)),
            FrameRecord::at(t0, Level::Debug, "say \"hi\""),
        ]
    }

    fn counts(records: &[FrameRecord]) -> LevelCounts {
        let mut counts = LevelCounts::default();
        for r in records {
            counts.record(r.level);
        }
        counts
    }

    fn render(format: ExportFormat, options: &ExportOptions, records: &[FrameRecord]) -> String {
        let groups = group_by_level(records, options);
        let meta = ExportMeta {
            exported_at: Local::now(),
            level_counts: counts(records),
            filters_applied: options.apply_level_filter,
        };
        let mut out = Vec::new();
        write_export(&mut out, format, &groups, &meta).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_group_order_and_filter() {
        let records = sample_records();
        let groups = group_by_level(&records, &ExportOptions::default());
        let levels: Vec<_> = groups.iter().map(|(l, _)| *l).collect();
        assert_eq!(levels, Level::EXPORT_ORDER.to_vec());

        let only = ExportOptions::default().only([Level::Error]);
        let groups = group_by_level(&records, &only);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].1[0].text, "boom");
    }

    #[test]
    fn test_default_filename() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(
            default_export_filename(ExportFormat::Json, &at),
            "uartium_export_20240309_070501.json"
        );
    }

    #[test]
    fn test_csv_rows() {
        let records = sample_records();
        let csv = render(ExportFormat::Csv, &ExportOptions::default(), &records);
        let lines: Vec<_> = csv.lines().collect();

        assert_eq!(lines[0], "# Uartium Export");
        assert_eq!(lines[2], "# Total Messages:,3");
        assert_eq!(lines[3], "# Filters Applied:,false");
        assert_eq!(lines[4], "");
        assert_eq!(lines[5], CSV_COLUMNS.join(","));
        assert_eq!(lines[6], "1700000000,DEBUG,\"say \"\"hi\"\"\",,,");
        assert_eq!(lines[7], "1234,INFO,\"Sensor, readings\",temp,23.5,float");
        assert_eq!(lines[8], "1234,INFO,\"Sensor, readings\",ok,1,uint");
        assert_eq!(lines[9], "1700000000,ERROR,boom,,,");
        assert_eq!(lines.len(), 10);
    }

    #[test]
    fn test_json_document() {
        let records = sample_records();
        let options = ExportOptions::default().only([Level::Info, Level::Error]);
        let json = render(ExportFormat::Json, &options, &records);
        let doc: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(doc["metadata"]["total_messages"], 3);
        assert_eq!(doc["metadata"]["filters_applied"], true);
        assert_eq!(doc["metadata"]["level_counts"]["DEBUG"], 1);

        let messages = doc["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["level"], "INFO");
        assert_eq!(messages[0]["device_timestamp"], 1234);
        assert_eq!(messages[0]["data_fields"]["temp"]["value"], 23.5);
        assert_eq!(messages[0]["data_fields"]["temp"]["type"], "float");
        assert_eq!(messages[1]["device_timestamp"], serde_json::Value::Null);
        assert_eq!(messages[1]["timestamp"], 1_700_000_000.0);
    }

    #[test]
    fn test_txt_sections() {
        let records = sample_records();
        let txt = render(ExportFormat::Txt, &ExportOptions::default(), &records);

        assert!(txt.starts_with(&"=".repeat(80)));
        assert!(txt.contains("Total Messages: 3"));
        assert!(txt.contains("[INFO] Messages (1)"));
        assert!(txt.contains("           temp = 23.5 (float)"));
        assert!(txt.trim_end().ends_with(&"=".repeat(80)));
        assert!(txt.find("[DEBUG]").unwrap() < txt.find("[ERROR]").unwrap());
        assert!(!txt.contains("[WARNING]"));
    }

    #[test]
    fn test_export_to_directory() {
        let dir = tempfile::tempdir().unwrap();
        let records = sample_records();
        let options = ExportOptions::new(ExportFormat::Txt);
        let path =
            export_to_directory(dir.path().join("out"), &records, counts(&records), &options)
                .unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("uartium_export_") && name.ends_with(".txt"));
        assert!(std::fs::read_to_string(&path).unwrap().contains("END OF EXPORT"));
    }

    #[test]
    fn test_export_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("x.csv");
        let records = sample_records();
        assert!(export_records(&path, &records, counts(&records), &ExportOptions::default()).is_err());
    }
}
