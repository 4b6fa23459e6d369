//! On-disk and on-wire sample encodings.
//!
//! The log holds one JSON object per line:
//!
//! ```text
//! {"seq":41,"ts":120500,"load_cell":-1834,"strain_gauge":977}\n
//! ```
//!
//! The broker only ever sees the two channel values:
//!
//! ```text
//! {"load_cell":-1834,"strain_gauge":977}
//! ```

use serde::{Deserialize, Serialize};

use crate::app::ports::ChannelReadings;
use crate::error::QueueError;

/// Longest encoded log line accepted, newline included.
pub const MAX_RECORD_LEN: usize = 128;

/// One captured reading pair.  Immutable once appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Append sequence number within the current log.
    pub seq: u32,
    /// Uptime at capture (milliseconds, monotonic).
    #[serde(rename = "ts")]
    pub timestamp_ms: u64,
    pub load_cell: i32,
    pub strain_gauge: i32,
}

impl Sample {
    pub fn new(seq: u32, timestamp_ms: u64, readings: ChannelReadings) -> Self {
        Self {
            seq,
            timestamp_ms,
            load_cell: readings.load_cell,
            strain_gauge: readings.strain_gauge,
        }
    }

    /// The telemetry body published for this sample.
    pub fn payload(&self) -> TelemetryPayload {
        TelemetryPayload {
            load_cell: self.load_cell,
            strain_gauge: self.strain_gauge,
        }
    }
}

/// Broker message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryPayload {
    pub load_cell: i32,
    pub strain_gauge: i32,
}

impl TelemetryPayload {
    pub fn to_json(&self) -> Result<Vec<u8>, QueueError> {
        serde_json::to_vec(self).map_err(|_| QueueError::Encode)
    }
}

/// Encode `sample` as one newline-terminated log line.
pub fn encode_line(sample: &Sample) -> Result<Vec<u8>, QueueError> {
    let mut line = serde_json::to_vec(sample).map_err(|_| QueueError::Encode)?;
    line.push(b'\n');
    if line.len() > MAX_RECORD_LEN {
        return Err(QueueError::Encode);
    }
    Ok(line)
}

/// Decode one log line.  Accepts the line with or without its newline.
pub fn decode_line(line: &[u8]) -> Option<Sample> {
    let body = line.strip_suffix(b"\n").unwrap_or(line);
    serde_json::from_slice(body).ok()
}
