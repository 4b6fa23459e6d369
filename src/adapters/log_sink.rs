//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing every application event to the
//! ESP-IDF logger (UART / USB-CDC in production).  Levels follow the
//! operator's view: storage alarms are errors, connection churn is a
//! warning, the rest is info.

use log::{debug, error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { pending } => {
                info!("START | {} samples pending from previous runs", pending);
            }
            AppEvent::NetworkUp { slot, name } => {
                info!("NET   | up via slot {} ('{}')", slot, name);
            }
            AppEvent::NetworkDown => warn!("NET   | link lost"),
            AppEvent::ProvisioningRequired => {
                warn!("NET   | no stored network reachable, provisioning required");
            }
            AppEvent::SessionChanged { from, to } => {
                info!("MQTT  | {:?} -> {:?}", from, to);
            }
            AppEvent::BrokerRetry(e) => warn!("MQTT  | {}, retrying", e),
            AppEvent::CommandIgnored => info!("MQTT  | command ignored"),
            AppEvent::DrainCompleted { sent, remaining } => {
                info!("DRAIN | sent={} remaining={}", sent, remaining);
            }
            AppEvent::TransmitFailed { seq } => warn!("DRAIN | seq {} not acknowledged", seq),
            AppEvent::SampleStored { seq } => debug!("SAMPLE| seq {} stored", seq),
            AppEvent::SensorFault(e) => warn!("SAMPLE| {}", e),
            AppEvent::SamplingHalted(e) => error!("SAMPLE| HALTED: {}", e),
            AppEvent::SamplingResumed => info!("SAMPLE| resumed"),
        }
    }
}
