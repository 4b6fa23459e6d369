//! One drain pass: publish unsent records oldest first.
//!
//! The pass stops at the first publish failure and never skips a record;
//! the same record heads the next pass.  A pass publishes at most
//! `max_records` records so one loop iteration stays short; the session
//! resumes a capped pass on the following tick.  The confirmed prefix is
//! compacted away once it outweighs the unsent suffix, so draining a
//! backlog rewrites less than the backlog itself.

use log::{debug, warn};

use crate::app::ports::{BrokerPort, LogDevice};
use crate::error::Error;
use crate::queue::DurableQueue;

/// Outcome of one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrainReport {
    pub sent: usize,
    pub remaining: usize,
    /// Sequence number of the record whose publish failed, if any.
    pub failed_seq: Option<u32>,
}

pub(super) fn run_pass<D: LogDevice, B: BrokerPort>(
    queue: &mut DurableQueue<D>,
    broker: &mut B,
    topic: &str,
    max_records: usize,
) -> Result<DrainReport, Error> {
    let mut report = DrainReport::default();

    while report.sent < max_records {
        let Some(record) = queue.drain_next()? else {
            break;
        };
        let payload = record.sample.payload().to_json()?;
        if let Err(e) = broker.publish(topic, &payload) {
            warn!("Drain: seq {} not delivered ({}), retry next pass", record.sample.seq, e);
            report.failed_seq = Some(record.sample.seq);
            break;
        }
        queue.confirm_sent(&record)?;
        debug!("Drain: seq {} delivered", record.sample.seq);
        report.sent += 1;
    }

    if report.sent > 0 {
        // Compaction failing leaves the confirmed prefix on disk; it is
        // retried after the next pass.
        if let Err(e) = queue.compact_if_worthwhile() {
            warn!("Drain: compaction failed: {}", e);
        }
    }
    report.remaining = queue.len();
    Ok(report)
}
