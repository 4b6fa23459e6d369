//! Force sensing: the per-channel [`ForceSensor`] contract and the
//! [`ForcePair`] that turns two of them into a [`SensorPort`].
//!
//! ```text
//!   load cell    ── HX711 #1 ──┐
//!                              ├── ForcePair ──▶ ChannelReadings
//!   strain gauge ── HX711 #2 ──┘
//! ```

use log::info;

use crate::app::ports::{ChannelReadings, SensorPort};
use crate::error::SensorError;

/// One force channel producing a signed, tared integer.
pub trait ForceSensor {
    /// Power up / initialise the converter.
    fn begin(&mut self) -> Result<(), SensorError>;
    /// Record the mean of `times` readings as the zero offset.
    fn tare(&mut self, times: u8) -> Result<(), SensorError>;
    /// Mean of `times` readings minus the tare offset.
    fn read(&mut self, times: u8) -> Result<i32, SensorError>;
}

/// The node's two force channels, read together once per sample.
pub struct ForcePair<L, S> {
    load_cell: L,
    strain_gauge: S,
    samples_per_reading: u8,
}

impl<L: ForceSensor, S: ForceSensor> ForcePair<L, S> {
    pub fn new(load_cell: L, strain_gauge: S, samples_per_reading: u8) -> Self {
        Self {
            load_cell,
            strain_gauge,
            samples_per_reading: samples_per_reading.max(1),
        }
    }

    /// Boot sequence: wake both converters, let the bridge settle, tare.
    ///
    /// `settle` is called once between wake-up and taring (the caller
    /// passes a blocking delay on target).
    pub fn calibrate(&mut self, settle: impl FnOnce()) -> Result<(), SensorError> {
        self.load_cell.begin()?;
        self.strain_gauge.begin()?;
        settle();
        self.load_cell.tare(self.samples_per_reading)?;
        self.strain_gauge.tare(self.samples_per_reading)?;
        info!("Sensors: both channels tared");
        Ok(())
    }
}

impl<L: ForceSensor, S: ForceSensor> SensorPort for ForcePair<L, S> {
    fn read_channels(&mut self) -> Result<ChannelReadings, SensorError> {
        Ok(ChannelReadings {
            load_cell: self.load_cell.read(self.samples_per_reading)?,
            strain_gauge: self.strain_gauge.read(self.samples_per_reading)?,
        })
    }
}
