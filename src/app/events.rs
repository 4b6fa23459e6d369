//! Outbound application events.
//!
//! The node's components emit these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them (serial log today).

use heapless::String;

use crate::error::{BrokerError, QueueError, SensorError};
use crate::session::SessionState;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The node finished boot; carries the number of samples recovered
    /// from the log.
    Started { pending: usize },

    /// WiFi association succeeded using the profile in `slot`.
    NetworkUp { slot: usize, name: String<32> },

    /// The WiFi link went down.
    NetworkDown,

    /// No stored profile could be used; the node waits for provisioning
    /// and retries on its own cadence.
    ProvisioningRequired,

    /// The broker session state machine moved.
    SessionChanged { from: SessionState, to: SessionState },

    /// A broker connect attempt failed; next try after the fixed delay.
    BrokerRetry(BrokerError),

    /// A command-channel message was ignored.
    CommandIgnored,

    /// A drain pass finished.
    DrainCompleted { sent: usize, remaining: usize },

    /// A publish failed; `seq` stays at the head of the queue.
    TransmitFailed { seq: u32 },

    /// One sample was captured and persisted.
    SampleStored { seq: u32 },

    /// A sensor read failed; nothing was captured this cycle.
    SensorFault(SensorError),

    /// Appends are failing; sampling is suspended until storage recovers.
    SamplingHalted(QueueError),

    /// Appends work again.
    SamplingResumed,
}
