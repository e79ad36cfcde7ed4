//! Test data builders for creating test objects

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use uartium_rs::types::{FrameRecord, Level, TypeTag, TypedValue, Variant};

/// Fixed host time all builders count from
pub fn base_time() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

/// Builder for creating test FrameRecords
pub struct RecordBuilder {
    level: Level,
    text: String,
    offset_ms: i64,
    device_timestamp: Option<u32>,
    fields: Vec<(String, TypedValue)>,
}

impl RecordBuilder {
    pub fn new(level: Level, text: &str) -> Self {
        Self {
            level,
            text: text.to_string(),
            offset_ms: 0,
            device_timestamp: None,
            fields: Vec::new(),
        }
    }

    pub fn info(text: &str) -> Self {
        Self::new(Level::Info, text)
    }

    pub fn error(text: &str) -> Self {
        Self::new(Level::Error, text)
    }

    /// Host timestamp as an offset from [`base_time`]
    pub fn at_ms(mut self, offset_ms: i64) -> Self {
        self.offset_ms = offset_ms;
        self
    }

    pub fn device_ts(mut self, ts: u32) -> Self {
        self.device_timestamp = Some(ts);
        self
    }

    pub fn float(mut self, name: &str, value: f64) -> Self {
        self.fields
            .push((name.to_string(), TypedValue::new(Variant::Float(value), TypeTag::Float)));
        self
    }

    pub fn uint(mut self, name: &str, value: u32) -> Self {
        self.fields
            .push((name.to_string(), TypedValue::new(Variant::Uint(value), TypeTag::Uint)));
        self
    }

    pub fn build(self) -> FrameRecord {
        let mut record = FrameRecord::at(
            base_time() + ChronoDuration::milliseconds(self.offset_ms),
            self.level,
            self.text,
        );
        record.device_timestamp = self.device_timestamp;
        for (name, value) in self.fields {
            record = record.with_field(name, value);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_builder() {
        let record = RecordBuilder::error("boom")
            .at_ms(1500)
            .device_ts(42)
            .float("temp", 31.5)
            .build();

        assert_eq!(record.level, Level::Error);
        assert_eq!(record.text, "boom");
        assert_eq!(record.device_timestamp, Some(42));
        assert_eq!(record.timestamp, base_time() + ChronoDuration::milliseconds(1500));
        assert_eq!(record.data_fields.get("temp").unwrap().value, Variant::Float(31.5));
    }
}
