//! Fuzz target: `DurableQueue` recovery over arbitrary log bytes
//!
//! Opens the queue over whatever is on the medium (torn tails, garbage
//! lines, binary noise) and drains it, verifying:
//! - No panics
//! - After open, the log ends on a line boundary
//! - Draining yields exactly the recovered count
//! - Appending after recovery always yields a drainable record
//!
//! cargo fuzz run fuzz_queue_recovery

#![no_main]

use crackwatch::adapters::mem_log::MemLogDevice;
use crackwatch::app::ports::ChannelReadings;
use crackwatch::queue::DurableQueue;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(mut q) = DurableQueue::open(MemLogDevice::from_bytes(data.to_vec()), 1 << 20) else {
        return;
    };
    let bytes = q.device().bytes();
    assert!(bytes.is_empty() || bytes.ends_with(b"\n"));

    let readings = ChannelReadings {
        load_cell: 1,
        strain_gauge: -1,
    };
    let appended = q.append(0, readings).ok();
    let pending = q.len();

    let mut last = None;
    let mut drained = 0usize;
    while let Ok(Some(rec)) = q.drain_next() {
        q.confirm_sent(&rec).expect("head confirm");
        last = Some(rec);
        drained += 1;
    }
    assert_eq!(drained, pending);
    assert!(q.is_empty());
    if let Some(rec) = appended {
        assert_eq!(last, Some(rec));
    }
});
