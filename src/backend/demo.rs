//! Demo line source
//!
//! Generates fake device output so the tool can run without hardware:
//! roughly 40% structured lines (`:m"..."` plus typed fields and a device
//! timestamp) and 60% plain level-tagged text. Lines are spaced by the
//! configured interval with 0.3x to 1.7x jitter.

use std::time::{Duration, Instant};

use crate::backend::source::LineSource;
use crate::error::Result;
use crate::protocol::encode_record;
use crate::types::{FrameRecord, Level, TypeTag, TypedValue, Variant};

/// Plain text lines
const PLAIN_MESSAGES: &[(Level, &str)] = &[
    (Level::Info, "Reading temperature: 23.4 °C"),
    (Level::Info, "Reading humidity: 61 %"),
    (Level::Warning, "Battery voltage low: 3.21 V"),
    (Level::Debug, "ADC sample buffer flushed"),
    (Level::Error, "CRC mismatch on packet #1042"),
    (Level::Info, "Uptime: 00:42:17"),
    (Level::Info, "RSSI: -67 dBm"),
    (Level::Warning, "Temperature above threshold: 38.1 °C"),
    (Level::Error, "I2C NACK from address 0x48"),
    (Level::Debug, "Entering low-power mode"),
    (Level::Info, "GPS fix acquired: 40.7128 N, 74.0060 W"),
    (Level::Warning, "Flash write near sector limit"),
    (Level::Error, "Timeout waiting for ACK"),
    (Level::Info, "Packet TX count: 8571"),
    (Level::Debug, "Heap free: 34816 bytes"),
];

/// How a demo field value is generated
#[derive(Debug, Clone, Copy)]
enum FieldGen {
    /// Uniform float in `[lo, hi)` rounded to `decimals`
    Float(f64, f64, i32),
    /// Uniform unsigned integer in `[lo, hi]`
    Uint(u32, u32),
    /// Uniform signed integer in `[lo, hi]`
    Int(i64, i64),
}

const TEMP: FieldGen = FieldGen::Float(18.0, 45.0, 1);
const VOLT: FieldGen = FieldGen::Float(4.0, 5.5, 2);
const CURRENT: FieldGen = FieldGen::Float(0.1, 2.0, 2);

/// Structured lines: level, message, fields
const STRUCTURED_TEMPLATES: &[(Level, &str, &[(&str, FieldGen)])] = &[
    (Level::Info, "Temperature reading", &[("temp", TEMP)]),
    (
        Level::Warning,
        "High temperature alert",
        &[("temp", TEMP), ("threshold", FieldGen::Float(35.0, 45.0, 1))],
    ),
    (
        Level::Error,
        "Connection lost",
        &[("error", FieldGen::Int(-10, 0)), ("retries", FieldGen::Uint(1, 5))],
    ),
    (Level::Info, "Voltage check", &[("voltage", VOLT), ("current", CURRENT)]),
    (
        Level::Info,
        "Sensor readings",
        &[
            ("temp", TEMP),
            ("humidity", FieldGen::Float(30.0, 90.0, 1)),
            ("pressure", FieldGen::Float(990.0, 1030.0, 1)),
            ("altitude", FieldGen::Float(0.0, 500.0, 1)),
        ],
    ),
    (
        Level::Info,
        "Power status",
        &[
            ("voltage", VOLT),
            ("current", CURRENT),
            ("power", FieldGen::Float(0.5, 10.0, 2)),
            ("battery", FieldGen::Uint(0, 100)),
            ("charging", FieldGen::Uint(0, 1)),
        ],
    ),
    (
        Level::Warning,
        "System diagnostics",
        &[
            ("cpu", FieldGen::Uint(10, 95)),
            ("memory", FieldGen::Uint(30, 85)),
            ("disk", FieldGen::Uint(20, 90)),
            ("temp", TEMP),
            ("uptime", FieldGen::Uint(100, 99_999)),
        ],
    ),
    (
        Level::Debug,
        "Motor telemetry",
        &[
            ("rpm", FieldGen::Uint(0, 8000)),
            ("current", CURRENT),
            ("voltage", FieldGen::Float(4.0, 5.5, 1)),
            ("temp", TEMP),
            ("torque", FieldGen::Float(0.0, 5.0, 2)),
            ("efficiency", FieldGen::Float(75.0, 98.0, 1)),
        ],
    ),
];

/// Xorshift generator, seeded per instance
#[derive(Debug, Clone)]
struct XorShift(u64);

impl XorShift {
    fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    /// Uniform in `[0, 1)`
    fn next_f64(&mut self) -> f64 {
        let mut s = self.0;
        s ^= s << 13;
        s ^= s >> 7;
        s ^= s << 17;
        self.0 = s;
        (s >> 11) as f64 / (1u64 << 53) as f64
    }

    fn range_f64(&mut self, lo: f64, hi: f64) -> f64 {
        lo + self.next_f64() * (hi - lo)
    }

    fn range_i64(&mut self, lo: i64, hi: i64) -> i64 {
        let span = (hi - lo + 1) as f64;
        lo + (self.next_f64() * span) as i64
    }

    fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        let idx = (self.next_f64() * items.len() as f64) as usize;
        &items[idx.min(items.len() - 1)]
    }
}

/// Fake device producing protocol lines at a jittered interval
#[derive(Debug)]
pub struct DemoLineSource {
    interval: Duration,
    poll: Duration,
    rng: XorShift,
    next_due: Option<Instant>,
    running: bool,
}

impl DemoLineSource {
    /// Create a demo source
    ///
    /// `interval` is the mean spacing of lines; `poll` bounds how long a
    /// single `read_line` call may block.
    pub fn new(interval: Duration, poll: Duration) -> Self {
        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x9E37_79B9_7F4A_7C15);
        Self::with_seed(interval, poll, seed)
    }

    /// Create a demo source with a fixed seed (deterministic line sequence)
    pub fn with_seed(interval: Duration, poll: Duration, seed: u64) -> Self {
        Self {
            interval,
            poll,
            rng: XorShift::new(seed),
            next_due: None,
            running: false,
        }
    }

    /// Generate the next line immediately
    pub fn generate_line(&mut self) -> String {
        if self.rng.next_f64() < 0.4 {
            let (level, message, fields) = *self.rng.pick(STRUCTURED_TEMPLATES);
            let mut record = FrameRecord::new(level, message);
            for (name, kind) in fields {
                let value = self.generate_value(*kind);
                record = record.with_field(*name, value);
            }
            let ts = self.rng.range_i64(1000, 9999) as u32;
            encode_record(&record.with_device_timestamp(ts))
        } else {
            let (level, text) = *self.rng.pick(PLAIN_MESSAGES);
            format!("[{}] {}", level.tag(), text)
        }
    }

    fn generate_value(&mut self, kind: FieldGen) -> TypedValue {
        match kind {
            FieldGen::Float(lo, hi, decimals) => {
                let scale = 10f64.powi(decimals);
                let v = (self.rng.range_f64(lo, hi) * scale).round() / scale;
                TypedValue::new(Variant::Float(v), TypeTag::Float)
            }
            FieldGen::Uint(lo, hi) => {
                let v = self.rng.range_i64(lo as i64, hi as i64) as u32;
                TypedValue::new(Variant::Uint(v), TypeTag::Uint)
            }
            FieldGen::Int(lo, hi) => {
                TypedValue::new(Variant::Int(self.rng.range_i64(lo, hi)), TypeTag::Int)
            }
        }
    }

    fn jittered_interval(&mut self) -> Duration {
        self.interval.mul_f64(self.rng.range_f64(0.3, 1.7))
    }
}

impl LineSource for DemoLineSource {
    fn start(&mut self) -> Result<()> {
        self.running = true;
        self.next_due = Some(Instant::now());
        tracing::info!("Demo source started (interval {:?})", self.interval);
        Ok(())
    }

    fn stop(&mut self) {
        self.running = false;
        self.next_due = None;
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        if !self.running {
            return Ok(None);
        }

        let now = Instant::now();
        let due = *self.next_due.get_or_insert(now);
        if due > now {
            std::thread::sleep((due - now).min(self.poll));
            if Instant::now() < due {
                return Ok(None);
            }
        }

        let next = self.jittered_interval();
        self.next_due = Some(Instant::now() + next);
        Ok(Some(self.generate_line()))
    }
}
