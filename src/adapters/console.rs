//! Serial console ingress.
//!
//! A small reader thread turns bytes from the console into
//! [`ConsoleCommand`]s and hands them to the main loop over a bounded
//! channel.  The main loop only ever calls `try_recv`, so a silent or
//! chatty console never delays sampling.
//!
//! ```text
//!  stdin ──bytes──▶ LineReader ──line──▶ ConsoleCommand::parse ──▶ channel ──▶ main loop
//! ```
//!
//! On target stdin is the ESP-IDF UART console, which returns no data
//! instead of blocking; the reader backs off briefly in that case.

use std::io::{ErrorKind, Read};
use std::sync::mpsc::{Receiver, SyncSender, TrySendError, sync_channel};
use std::time::Duration;

use log::{info, warn};

use crate::app::commands::ConsoleCommand;

/// Longest console line accepted (`WIFI ` + name + `,` + secret fits).
pub const LINE_MAX: usize = 112;
/// Commands waiting for the main loop.
const CHANNEL_DEPTH: usize = 4;
/// Back-off when the console has nothing to read.
const IDLE_POLL: Duration = Duration::from_millis(100);
const READER_STACK_BYTES: usize = 6 * 1024;

/// Result of feeding one byte.
#[derive(Debug, PartialEq, Eq)]
pub enum LineEvent<'a> {
    None,
    Complete(&'a [u8]),
    /// The line outgrew the buffer; the rest of it is dropped.
    Overflow,
}

/// Assembles newline-terminated lines in a fixed buffer.
pub struct LineReader {
    buf: [u8; LINE_MAX],
    len: usize,
    overflowed: bool,
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new()
    }
}

impl LineReader {
    pub const fn new() -> Self {
        Self {
            buf: [0; LINE_MAX],
            len: 0,
            overflowed: false,
        }
    }

    pub fn push(&mut self, byte: u8) -> LineEvent<'_> {
        if byte == b'\n' || byte == b'\r' {
            let len = core::mem::take(&mut self.len);
            if core::mem::take(&mut self.overflowed) || len == 0 {
                return LineEvent::None;
            }
            return LineEvent::Complete(&self.buf[..len]);
        }
        if self.overflowed {
            return LineEvent::None;
        }
        if self.len < LINE_MAX {
            self.buf[self.len] = byte;
            self.len += 1;
            return LineEvent::None;
        }
        self.len = 0;
        self.overflowed = true;
        LineEvent::Overflow
    }
}

/// Start the console reader on its own thread.
pub fn spawn<R: Read + Send + 'static>(input: R) -> std::io::Result<Receiver<ConsoleCommand>> {
    let (tx, rx) = sync_channel(CHANNEL_DEPTH);
    std::thread::Builder::new()
        .name("console".into())
        .stack_size(READER_STACK_BYTES)
        .spawn(move || run(input, &tx))?;
    info!("Console: accepting 'WIFI <ssid>,<secret>' and 'WIFI FORGET'");
    Ok(rx)
}

fn run<R: Read>(mut input: R, tx: &SyncSender<ConsoleCommand>) {
    let mut lines = LineReader::new();
    let mut chunk = [0u8; 32];
    loop {
        let n = match input.read(&mut chunk) {
            Ok(0) => {
                std::thread::sleep(IDLE_POLL);
                continue;
            }
            Ok(n) => n,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                std::thread::sleep(IDLE_POLL);
                continue;
            }
            Err(e) => {
                warn!("Console: read failed ({}), reader stopped", e);
                return;
            }
        };
        for &byte in &chunk[..n] {
            match lines.push(byte) {
                LineEvent::None => {}
                LineEvent::Overflow => warn!("Console: line longer than {} bytes dropped", LINE_MAX),
                LineEvent::Complete(line) => {
                    let Some(cmd) = ConsoleCommand::parse(line) else {
                        warn!("Console: unrecognised line ignored");
                        continue;
                    };
                    match tx.try_send(cmd) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => warn!("Console: command queue full, dropped"),
                        Err(TrySendError::Disconnected(_)) => return,
                    }
                }
            }
        }
    }
}
