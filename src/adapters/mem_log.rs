//! RAM-backed [`LogDevice`] for host tests, fuzzing and simulation.
//!
//! Every successful append is "durable" by definition; a simulated reboot
//! is [`MemLogDevice::crash`], which keeps exactly the bytes written so
//! far.  Fault injection covers the failure modes the queue must survive:
//! a dead medium, a full medium, and a power cut in the middle of an
//! append.

use crate::app::ports::{LogDevice, StorageError};

#[derive(Debug, Clone, Default)]
pub struct MemLogDevice {
    data: Vec<u8>,
    /// Medium size; appends past it fail with `Full`.
    limit: Option<usize>,
    failing: bool,
    /// Bytes the next append writes before "losing power".
    tear_after: Option<usize>,
    /// Bytes moved by `discard_prefix` so far.
    rewritten: u64,
}

impl MemLogDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// A device whose medium already holds `data`.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    /// Limit the medium to `limit` bytes.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Make every operation fail with `IoError` (card pulled).
    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }

    /// Let the next append write only `keep` bytes, then fail.
    pub fn tear_next_append(&mut self, keep: usize) {
        self.tear_after = Some(keep);
    }

    /// Simulated power cycle: a fresh device with the persisted bytes.
    pub fn crash(self) -> Self {
        Self::from_bytes(self.data)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Total bytes compaction has had to copy on this device.
    pub fn bytes_rewritten(&self) -> u64 {
        self.rewritten
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.failing {
            Err(StorageError::IoError)
        } else {
            Ok(())
        }
    }
}

impl LogDevice for MemLogDevice {
    fn len(&mut self) -> Result<u64, StorageError> {
        self.check()?;
        Ok(self.data.len() as u64)
    }

    fn append(&mut self, data: &[u8]) -> Result<(), StorageError> {
        self.check()?;
        if let Some(keep) = self.tear_after.take() {
            self.data.extend_from_slice(&data[..keep.min(data.len())]);
            return Err(StorageError::IoError);
        }
        if let Some(limit) = self.limit {
            if self.data.len() + data.len() > limit {
                return Err(StorageError::Full);
            }
        }
        self.data.extend_from_slice(data);
        Ok(())
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, StorageError> {
        self.check()?;
        let start = (offset as usize).min(self.data.len());
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }

    fn truncate(&mut self, len: u64) -> Result<(), StorageError> {
        self.check()?;
        self.data.truncate(len as usize);
        Ok(())
    }

    fn discard_prefix(&mut self, upto: u64) -> Result<(), StorageError> {
        self.check()?;
        let upto = (upto as usize).min(self.data.len());
        self.rewritten += (self.data.len() - upto) as u64;
        self.data.drain(..upto);
        Ok(())
    }
}
