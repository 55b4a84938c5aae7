//! Human-readable sizes, speeds and percentages

use std::fmt;
use std::time::Duration;

const KB: u64 = 1024;
const MB: u64 = 1024 * KB;
const GB: u64 = 1024 * MB;
const TB: u64 = 1024 * GB;

pub fn size_human(bytes: u64) -> String {
    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else if bytes < GB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes < TB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedUnit {
    BytesPerSec,
    KiloBytesPerSec,
    MegaBytesPerSec,
}

impl SpeedUnit {
    pub fn label(self) -> &'static str {
        match self {
            SpeedUnit::BytesPerSec => "bytes/sec",
            SpeedUnit::KiloBytesPerSec => "kB/s",
            SpeedUnit::MegaBytesPerSec => "MB/s",
        }
    }
}

/// Instantaneous transfer rate already scaled into its display unit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownloadSpeed {
    pub value: f64,
    pub unit: SpeedUnit,
}

impl DownloadSpeed {
    /// `received * 1000 / elapsed_ms`, scaled by 1024 per threshold crossed.
    /// Zero elapsed time counts as one millisecond.
    pub fn measure(received: u64, elapsed: Duration) -> Self {
        let elapsed_ms = elapsed.as_millis().max(1) as f64;
        Self::from_bytes_per_sec(received as f64 * 1000.0 / elapsed_ms)
    }

    pub fn from_bytes_per_sec(bytes_per_sec: f64) -> Self {
        if bytes_per_sec < KB as f64 {
            Self {
                value: bytes_per_sec,
                unit: SpeedUnit::BytesPerSec,
            }
        } else if bytes_per_sec < MB as f64 {
            Self {
                value: bytes_per_sec / KB as f64,
                unit: SpeedUnit::KiloBytesPerSec,
            }
        } else {
            Self {
                value: bytes_per_sec / MB as f64,
                unit: SpeedUnit::MegaBytesPerSec,
            }
        }
    }
}

impl fmt::Display for DownloadSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} {}", self.value, self.unit.label())
    }
}

/// `part / whole * 100`, zero when `whole` is zero
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Format with `digits` significant digits, dropping trailing zeros
pub fn significant(value: f64, digits: u32) -> String {
    if value == 0.0 || !value.is_finite() {
        return "0".to_string();
    }
    let magnitude = value.abs().log10().floor() as i32;
    let decimals = (digits as i32 - 1 - magnitude).max(0) as usize;
    let formatted = format!("{:.*}", decimals, value);
    if formatted.contains('.') {
        formatted.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        formatted
    }
}
