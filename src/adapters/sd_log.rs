//! File-backed [`LogDevice`] for the SD card.
//!
//! On target the card is mounted into the ESP-IDF VFS (FATFS) at
//! [`SD_MOUNT_POINT`] by `main`, after which plain `std::fs` calls reach
//! it.  On the host the same code runs against any directory, which is
//! what the tests use.
//!
//! ## Crash safety
//!
//! - `append` opens in append mode, writes, and `sync_all`s before
//!   returning.
//! - `discard_prefix` of the whole log is a plain truncate.  Otherwise it
//!   copies the kept suffix to `<log>.tmp`, syncs it, removes the log,
//!   then renames the temp file into place (FATFS cannot rename over an
//!   existing file).  [`FileLogDevice::open`] finishes or
//!   rolls back an interrupted compaction:
//!   - log and tmp both present → compaction never committed, tmp removed;
//!   - only tmp present → log was removed but not yet replaced, tmp renamed.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::app::ports::{LogDevice, StorageError};

/// VFS mount point of the SD card on target.
pub const SD_MOUNT_POINT: &str = "/sdcard";
/// Sample log file name under the mount point.
pub const LOG_FILE_NAME: &str = "samples.log";

const COPY_CHUNK: usize = 512;

pub struct FileLogDevice {
    path: PathBuf,
    tmp_path: PathBuf,
}

fn map_io(e: &std::io::Error) -> StorageError {
    match e.kind() {
        ErrorKind::NotFound => StorageError::NotFound,
        ErrorKind::StorageFull => StorageError::Full,
        _ => StorageError::IoError,
    }
}

impl FileLogDevice {
    /// Open (creating if needed) the log at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let dev = Self {
            path,
            tmp_path: PathBuf::from(tmp),
        };
        dev.recover_compaction()?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&dev.path)
            .map_err(|e| map_io(&e))?;
        info!("SdLog: using {}", dev.path.display());
        Ok(dev)
    }

    /// Open `samples.log` under the SD mount point.
    pub fn open_default() -> Result<Self, StorageError> {
        Self::open(Path::new(SD_MOUNT_POINT).join(LOG_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn recover_compaction(&self) -> Result<(), StorageError> {
        let log_exists = self.path.exists();
        let tmp_exists = self.tmp_path.exists();
        match (log_exists, tmp_exists) {
            (true, true) => {
                warn!("SdLog: discarding uncommitted compaction");
                fs::remove_file(&self.tmp_path).map_err(|e| map_io(&e))
            }
            (false, true) => {
                warn!("SdLog: completing interrupted compaction");
                fs::rename(&self.tmp_path, &self.path).map_err(|e| map_io(&e))
            }
            _ => Ok(()),
        }
    }
}

impl LogDevice for FileLogDevice {
    fn len(&mut self) -> Result<u64, StorageError> {
        fs::metadata(&self.path)
            .map(|m| m.len())
            .map_err(|e| map_io(&e))
    }

    fn append(&mut self, data: &[u8]) -> Result<(), StorageError> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| map_io(&e))?;
        f.write_all(data).map_err(|e| map_io(&e))?;
        f.sync_all().map_err(|e| map_io(&e))
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, StorageError> {
        let mut f = File::open(&self.path).map_err(|e| map_io(&e))?;
        f.seek(SeekFrom::Start(offset)).map_err(|e| map_io(&e))?;
        let mut filled = 0;
        while filled < buf.len() {
            match f.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(map_io(&e)),
            }
        }
        Ok(filled)
    }

    fn truncate(&mut self, len: u64) -> Result<(), StorageError> {
        let f = OpenOptions::new()
            .write(true)
            .open(&self.path)
            .map_err(|e| map_io(&e))?;
        f.set_len(len).map_err(|e| map_io(&e))?;
        f.sync_all().map_err(|e| map_io(&e))
    }

    fn discard_prefix(&mut self, upto: u64) -> Result<(), StorageError> {
        if upto >= self.len()? {
            // Nothing to keep: a crash mid-truncate leaves only
            // confirmed records behind.
            return self.truncate(0);
        }
        let mut src = File::open(&self.path).map_err(|e| map_io(&e))?;
        src.seek(SeekFrom::Start(upto)).map_err(|e| map_io(&e))?;
        let mut dst = File::create(&self.tmp_path).map_err(|e| map_io(&e))?;

        let mut buf = [0u8; COPY_CHUNK];
        loop {
            let n = match src.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(map_io(&e)),
            };
            dst.write_all(&buf[..n]).map_err(|e| map_io(&e))?;
        }
        dst.sync_all().map_err(|e| map_io(&e))?;
        drop(dst);
        drop(src);

        fs::remove_file(&self.path).map_err(|e| map_io(&e))?;
        fs::rename(&self.tmp_path, &self.path).map_err(|e| map_io(&e))
    }
}
