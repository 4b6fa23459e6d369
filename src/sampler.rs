//! Periodic sample capture.
//!
//! Reads both force channels on its own cadence and appends the pair to
//! the durable queue.  Capture never depends on the network or on
//! authorization.
//!
//! ```text
//!   Running ──append fails (after one compact+retry)──▶ Halted
//!      ▲                                                  │
//!      └──────────── probe append succeeds ◀── every halt_retry_ms
//! ```
//!
//! While halted the sensors are not read on the sampling cadence; each
//! probe reads once and tries to append that reading.

use log::{error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{ChannelReadings, EventSink, LogDevice, SensorPort};
use crate::config::NodeConfig;
use crate::error::QueueError;
use crate::queue::{DurableQueue, QueueRecord};
use crate::scheduler::Cadence;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    Running,
    /// Appends are failing with the given error.
    Halted(QueueError),
}

pub struct SampleProducer {
    state: SamplerState,
    sample: Cadence,
    probe: Cadence,
}

impl SampleProducer {
    pub fn new(config: &NodeConfig) -> Self {
        Self {
            state: SamplerState::Running,
            sample: Cadence::new(config.sample_interval_ms),
            probe: Cadence::new(config.halt_retry_ms),
        }
    }

    pub fn state(&self) -> SamplerState {
        self.state
    }

    pub fn is_halted(&self) -> bool {
        matches!(self.state, SamplerState::Halted(_))
    }

    /// Capture one sample if one is due.  Returns the stored record.
    pub fn tick<D, S, E>(
        &mut self,
        now_ms: u64,
        sensors: &mut S,
        queue: &mut DurableQueue<D>,
        sink: &mut E,
    ) -> Option<QueueRecord>
    where
        D: LogDevice,
        S: SensorPort,
        E: EventSink,
    {
        let due = match self.state {
            SamplerState::Running => self.sample.poll(now_ms),
            SamplerState::Halted(_) => self.probe.poll(now_ms),
        };
        if !due {
            return None;
        }

        let readings = match sensors.read_channels() {
            Ok(r) => r,
            Err(e) => {
                warn!("Sampler: read failed ({}), cycle skipped", e);
                sink.emit(&AppEvent::SensorFault(e));
                return None;
            }
        };

        match store(queue, now_ms, readings) {
            Ok(record) => {
                if self.is_halted() {
                    info!("Sampler: storage recovered, sampling resumed");
                    self.state = SamplerState::Running;
                    self.sample.mark(now_ms);
                    sink.emit(&AppEvent::SamplingResumed);
                }
                sink.emit(&AppEvent::SampleStored {
                    seq: record.sample.seq,
                });
                Some(record)
            }
            Err(e) => {
                if !self.is_halted() {
                    error!("Sampler: append failed ({}), sampling HALTED", e);
                    self.probe.mark(now_ms);
                    sink.emit(&AppEvent::SamplingHalted(e));
                }
                self.state = SamplerState::Halted(e);
                None
            }
        }
    }
}

/// Append, compacting once and retrying if the log is full.
fn store<D: LogDevice>(
    queue: &mut DurableQueue<D>,
    now_ms: u64,
    readings: ChannelReadings,
) -> Result<QueueRecord, QueueError> {
    match queue.append(now_ms, readings) {
        Err(QueueError::StorageFull) => {
            warn!("Sampler: log full, compacting");
            queue.reset()?;
            queue.append(now_ms, readings)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mem_log::MemLogDevice;
    use crate::error::SensorError;

    struct Counter {
        reads: i32,
        fail: bool,
    }

    impl SensorPort for Counter {
        fn read_channels(&mut self) -> Result<ChannelReadings, SensorError> {
            if self.fail {
                return Err(SensorError::Timeout);
            }
            self.reads += 1;
            Ok(ChannelReadings {
                load_cell: self.reads,
                strain_gauge: -self.reads,
            })
        }
    }

    #[derive(Default)]
    struct Events(std::vec::Vec<AppEvent>);

    impl EventSink for Events {
        fn emit(&mut self, event: &AppEvent) {
            self.0.push(event.clone());
        }
    }

    fn sensors() -> Counter {
        Counter { reads: 0, fail: false }
    }

    #[test]
    fn samples_on_cadence() {
        let mut p = SampleProducer::new(&NodeConfig::default());
        let mut q = DurableQueue::open(MemLogDevice::new(), 1 << 16).unwrap();
        let mut s = sensors();
        let mut ev = Events::default();

        for t in (0..=3000).step_by(250) {
            p.tick(t, &mut s, &mut q, &mut ev);
        }
        assert_eq!(q.len(), 4);
        assert_eq!(s.reads, 4);
    }

    #[test]
    fn sensor_fault_skips_cycle() {
        let mut p = SampleProducer::new(&NodeConfig::default());
        let mut q = DurableQueue::open(MemLogDevice::new(), 1 << 16).unwrap();
        let mut s = Counter { reads: 0, fail: true };
        let mut ev = Events::default();

        assert!(p.tick(0, &mut s, &mut q, &mut ev).is_none());
        assert!(q.is_empty());
        assert_eq!(ev.0, [AppEvent::SensorFault(SensorError::Timeout)]);
        assert_eq!(p.state(), SamplerState::Running);
    }

    #[test]
    fn full_log_is_compacted_before_halting() {
        let mut q = DurableQueue::open(MemLogDevice::new(), 110).unwrap();
        // A confirmed record still occupies the log.
        q.append(0, ChannelReadings::default()).unwrap();
        let r = q.drain_next().unwrap().unwrap();
        q.confirm_sent(&r).unwrap();

        let mut p = SampleProducer::new(&NodeConfig::default());
        let mut s = sensors();
        let mut ev = Events::default();
        assert!(p.tick(0, &mut s, &mut q, &mut ev).is_some());
        assert!(p.tick(1000, &mut s, &mut q, &mut ev).is_some());
        assert_eq!(p.state(), SamplerState::Running);
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn halts_and_resumes_when_storage_returns() {
        let mut p = SampleProducer::new(&NodeConfig::default());
        let mut q = DurableQueue::open(MemLogDevice::new(), 1 << 16).unwrap();
        let mut s = sensors();
        let mut ev = Events::default();

        q.device_mut().set_failing(true);
        p.tick(0, &mut s, &mut q, &mut ev);
        assert_eq!(p.state(), SamplerState::Halted(QueueError::StorageUnavailable));
        assert!(ev.0.contains(&AppEvent::SamplingHalted(QueueError::StorageUnavailable)));

        // No reads between retries.
        for t in (1000..10_000).step_by(1000) {
            p.tick(t, &mut s, &mut q, &mut ev);
        }
        assert_eq!(s.reads, 1);

        q.device_mut().set_failing(false);
        let rec = p.tick(10_000, &mut s, &mut q, &mut ev).unwrap();
        assert_eq!(rec.sample.seq, 0);
        assert_eq!(p.state(), SamplerState::Running);
        assert!(ev.0.contains(&AppEvent::SamplingResumed));

        // Back on the sampling cadence.
        assert!(p.tick(11_000, &mut s, &mut q, &mut ev).is_some());
    }

    #[test]
    fn halted_alarm_is_emitted_once() {
        let mut p = SampleProducer::new(&NodeConfig::default());
        let mut q = DurableQueue::open(MemLogDevice::new(), 1 << 16).unwrap();
        let mut s = sensors();
        let mut ev = Events::default();
        q.device_mut().set_failing(true);
        for t in (0..=50_000).step_by(1000) {
            p.tick(t, &mut s, &mut q, &mut ev);
        }
        let alarms = ev
            .0
            .iter()
            .filter(|e| matches!(e, AppEvent::SamplingHalted(_)))
            .count();
        assert_eq!(alarms, 1);
    }
}
