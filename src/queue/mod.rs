//! Durable, append-only sample queue.
//!
//! ```text
//!   byte 0                cursor                         log_len
//!   ├── confirmed ─────────┼──── unsent (pending) ─────────┤
//!   │ {"seq":0,..}\n ...   │ {"seq":12,..}\n {"seq":13,..}\n│
//! ```
//!
//! - `append` writes one line and returns only after the device reports it
//!   durable.  Records are never rewritten or reordered.
//! - `drain_next` peeks the oldest unsent record; `confirm_sent` advances
//!   the cursor past it and refuses any other record (`OrderViolation`).
//! - `reset` discards the confirmed prefix to reclaim space;
//!   `compact_if_worthwhile` does so only once the prefix outweighs the
//!   records that would have to be copied.
//!
//! The cursor lives in RAM.  After a restart it starts at byte 0 again, so
//! records confirmed since the last compaction are sent a second time.  That
//! is the at-least-once contract; nothing unsent is ever dropped.

pub mod record;

use log::{error, info, warn};

use crate::app::ports::{ChannelReadings, LogDevice, StorageError};
use crate::error::QueueError;
use record::{MAX_RECORD_LEN, Sample, decode_line, encode_line};

/// A persisted sample together with its position in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueRecord {
    /// Byte offset of the line in the log.
    pub offset: u64,
    /// Encoded line length, newline included.
    pub len: u32,
    pub sample: Sample,
}

impl QueueRecord {
    fn end(&self) -> u64 {
        self.offset + u64::from(self.len)
    }
}

/// Point-in-time queue counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    pub pending: usize,
    pub log_bytes: u64,
    pub cursor: u64,
    pub next_seq: u32,
    pub corrupt_skipped: u32,
    pub torn_bytes_recovered: u64,
}

/// Result of looking for the head record: the record (if any), the
/// undecodable lines in front of it, and where it starts.
struct HeadScan {
    record: Option<QueueRecord>,
    skipped: u32,
    resume_at: u64,
}

pub struct DurableQueue<D: LogDevice> {
    device: D,
    capacity: u64,
    /// Offset of the next unsent line.
    cursor: u64,
    log_len: u64,
    /// Decodable records at or after `cursor`.
    pending: usize,
    next_seq: u32,
    /// Cached result of the last `drain_next`.
    head: Option<QueueRecord>,
    corrupt_skipped: u32,
    torn_bytes_recovered: u64,
}

fn map_storage(e: StorageError) -> QueueError {
    match e {
        StorageError::Full => QueueError::StorageFull,
        StorageError::NotFound | StorageError::IoError => QueueError::StorageUnavailable,
    }
}

impl<D: LogDevice> DurableQueue<D> {
    /// Open the queue over `device`, recovering from any earlier crash.
    ///
    /// A final line without its newline is the remains of an interrupted
    /// append and is cut off; it was never acknowledged to the sampler.
    pub fn open(device: D, capacity: u64) -> Result<Self, QueueError> {
        let mut q = Self {
            device,
            capacity,
            cursor: 0,
            log_len: 0,
            pending: 0,
            next_seq: 0,
            head: None,
            corrupt_skipped: 0,
            torn_bytes_recovered: 0,
        };
        q.log_len = q.device.len().map_err(map_storage)?;

        let mut offset = 0;
        while offset < q.log_len {
            let Some(end) = q.line_end(offset)? else {
                let torn = q.log_len - offset;
                warn!("Queue: dropping {} byte torn tail at offset {}", torn, offset);
                q.device.truncate(offset).map_err(map_storage)?;
                q.log_len = offset;
                q.torn_bytes_recovered = torn;
                break;
            };
            if let Some(sample) = q.decode_at(offset, end)? {
                q.pending += 1;
                q.next_seq = sample.seq.wrapping_add(1);
            }
            offset = end;
        }

        info!(
            "Queue: opened ({} pending, {} bytes, next seq {})",
            q.pending, q.log_len, q.next_seq
        );
        Ok(q)
    }

    /// Persist one sample.  On `Ok` the record survives a power cut.
    pub fn append(&mut self, timestamp_ms: u64, readings: ChannelReadings) -> Result<QueueRecord, QueueError> {
        let sample = Sample::new(self.next_seq, timestamp_ms, readings);
        let line = encode_line(&sample)?;

        if self.log_len + line.len() as u64 > self.capacity {
            return Err(QueueError::StorageFull);
        }

        if let Err(e) = self.device.append(&line) {
            self.repair_tail();
            return Err(map_storage(e));
        }

        let record = QueueRecord {
            offset: self.log_len,
            len: line.len() as u32,
            sample,
        };
        self.log_len += line.len() as u64;
        self.pending += 1;
        self.next_seq = self.next_seq.wrapping_add(1);
        Ok(record)
    }

    /// Oldest unsent record, left in place.
    ///
    /// Complete lines that do not decode are skipped (and counted); their
    /// content is already lost and they must not block the records behind
    /// them.
    pub fn drain_next(&mut self) -> Result<Option<QueueRecord>, QueueError> {
        if let Some(head) = self.head {
            return Ok(Some(head));
        }
        let scan = self.scan_head()?;
        if scan.skipped > 0 {
            error!(
                "Queue: skipped {} undecodable record(s) before offset {}",
                scan.skipped, scan.resume_at
            );
            self.corrupt_skipped += scan.skipped;
        }
        self.cursor = scan.resume_at;
        self.head = scan.record;
        Ok(scan.record)
    }

    /// Mark `record` delivered.  Only the current oldest unsent record is
    /// accepted; anything else fails with `OrderViolation` and changes
    /// nothing, counters included.
    pub fn confirm_sent(&mut self, record: &QueueRecord) -> Result<(), QueueError> {
        let scan = match self.head {
            Some(head) => HeadScan {
                record: Some(head),
                skipped: 0,
                resume_at: self.cursor,
            },
            None => self.scan_head()?,
        };
        match scan.record {
            Some(head) if head == *record => {
                self.corrupt_skipped += scan.skipped;
                self.cursor = head.end();
                self.pending -= 1;
                self.head = None;
                Ok(())
            }
            head => {
                error!(
                    "Queue: confirm of seq {} at offset {} rejected (head is {:?})",
                    record.sample.seq,
                    record.offset,
                    head.map(|h| h.sample.seq)
                );
                Err(QueueError::OrderViolation)
            }
        }
    }

    /// Drop every confirmed record from the log.  Unsent records are kept.
    pub fn reset(&mut self) -> Result<(), QueueError> {
        if self.cursor == 0 {
            return Ok(());
        }
        let dropped = self.cursor;
        self.device.discard_prefix(dropped).map_err(map_storage)?;
        self.log_len -= dropped;
        self.cursor = 0;
        if let Some(head) = self.head.as_mut() {
            head.offset -= dropped;
        }
        info!("Queue: compacted {} bytes, {} pending", dropped, self.pending);
        Ok(())
    }

    /// Compact only when the copy is cheap relative to what it reclaims:
    /// nothing is left to keep, or the confirmed prefix is at least as
    /// large as the unsent suffix.  Bytes rewritten over the life of the
    /// log therefore never exceed the bytes appended.
    ///
    /// Returns whether a compaction ran.
    pub fn compact_if_worthwhile(&mut self) -> Result<bool, QueueError> {
        let kept = self.log_len - self.cursor;
        if self.cursor == 0 || (self.pending > 0 && self.cursor < kept) {
            return Ok(false);
        }
        self.reset()?;
        Ok(true)
    }

    /// Number of unsent records.
    pub fn len(&self) -> usize {
        self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending == 0
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pending: self.pending,
            log_bytes: self.log_len,
            cursor: self.cursor,
            next_seq: self.next_seq,
            corrupt_skipped: self.corrupt_skipped,
            torn_bytes_recovered: self.torn_bytes_recovered,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Give the device back (e.g. to reopen it after a simulated reboot).
    pub fn into_device(self) -> D {
        self.device
    }

    // ── Internal ──────────────────────────────────────────────

    /// Locate the oldest decodable record at or after the cursor without
    /// touching any queue state.
    fn scan_head(&mut self) -> Result<HeadScan, QueueError> {
        let mut scan = HeadScan {
            record: None,
            skipped: 0,
            resume_at: self.cursor,
        };
        while scan.resume_at < self.log_len {
            let offset = scan.resume_at;
            let Some(end) = self.line_end(offset)? else {
                break;
            };
            if let Some(sample) = self.decode_at(offset, end)? {
                scan.record = Some(QueueRecord {
                    offset,
                    len: (end - offset) as u32,
                    sample,
                });
                break;
            }
            scan.skipped += 1;
            scan.resume_at = end;
        }
        Ok(scan)
    }

    /// End offset (exclusive, past the newline) of the line starting at
    /// `offset`, or `None` if the log ends before a newline.
    fn line_end(&mut self, offset: u64) -> Result<Option<u64>, QueueError> {
        let mut buf = [0u8; MAX_RECORD_LEN];
        let mut pos = offset;
        while pos < self.log_len {
            let n = self.device.read_at(pos, &mut buf).map_err(map_storage)?;
            if n == 0 {
                break;
            }
            if let Some(i) = buf[..n].iter().position(|&b| b == b'\n') {
                return Ok(Some(pos + i as u64 + 1));
            }
            pos += n as u64;
        }
        Ok(None)
    }

    fn decode_at(&mut self, offset: u64, end: u64) -> Result<Option<Sample>, QueueError> {
        let len = (end - offset) as usize;
        if len > MAX_RECORD_LEN {
            return Ok(None);
        }
        let mut buf = [0u8; MAX_RECORD_LEN];
        let n = self.device.read_at(offset, &mut buf[..len]).map_err(map_storage)?;
        if n < len {
            return Err(QueueError::StorageUnavailable);
        }
        Ok(decode_line(&buf[..len]))
    }

    /// After a failed append the device may hold a partial line; cut it so
    /// the next record starts on a clean boundary.
    fn repair_tail(&mut self) {
        match self.device.len() {
            Ok(len) if len > self.log_len => {
                if let Err(e) = self.device.truncate(self.log_len) {
                    warn!("Queue: could not trim partial append ({}), recovery deferred to reboot", e);
                }
            }
            _ => {}
        }
    }
}
