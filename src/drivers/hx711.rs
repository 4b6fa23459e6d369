//! HX711 24-bit bridge ADC, bit-banged over two GPIOs.
//!
//! ```text
//!   DOUT ‾‾‾‾\____ (low = conversion ready)
//!   SCK  ______/‾\_/‾\_ … 24 data pulses … _/‾\_   (+1 pulse: channel A, gain 128)
//! ```
//!
//! Bits are shifted out MSB first as two's complement.  The wait for
//! data-ready is bounded; a converter that never answers yields
//! [`SensorError::Timeout`] instead of stalling the loop.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::info;

use crate::error::SensorError;
use crate::sensors::ForceSensor;

/// Longest wait for DOUT to go low (the HX711 converts at 10 SPS).
const READY_TIMEOUT_MS: u32 = 500;
const READY_POLL_US: u32 = 500;
/// Extra SCK pulses after the 24 data bits: 1 selects channel A, gain 128.
const GAIN_128_PULSES: u8 = 1;

pub struct Hx711<DOUT, SCK, D> {
    dout: DOUT,
    sck: SCK,
    delay: D,
    offset: i32,
    started: bool,
}

impl<DOUT, SCK, D> Hx711<DOUT, SCK, D>
where
    DOUT: InputPin,
    SCK: OutputPin,
    D: DelayNs,
{
    pub fn new(dout: DOUT, sck: SCK, delay: D) -> Self {
        Self {
            dout,
            sck,
            delay,
            offset: 0,
            started: false,
        }
    }

    pub fn offset(&self) -> i32 {
        self.offset
    }

    /// One raw conversion, sign-extended from 24 bits.
    pub fn read_raw(&mut self) -> Result<i32, SensorError> {
        if !self.started {
            return Err(SensorError::NotInitialised);
        }
        self.wait_ready()?;

        let mut value: u32 = 0;
        for _ in 0..24 {
            self.pulse()?;
            let bit = self.dout.is_high().map_err(|_| SensorError::GpioFailed)?;
            value = (value << 1) | u32::from(bit);
        }
        for _ in 0..GAIN_128_PULSES {
            self.pulse()?;
        }
        Ok(sign_extend_24(value))
    }

    /// Mean of `times` raw conversions.
    pub fn read_average(&mut self, times: u8) -> Result<i32, SensorError> {
        let times = times.max(1);
        let mut sum: i64 = 0;
        for _ in 0..times {
            sum += i64::from(self.read_raw()?);
        }
        Ok((sum / i64::from(times)) as i32)
    }

    fn wait_ready(&mut self) -> Result<(), SensorError> {
        let mut waited_us: u32 = 0;
        while self.dout.is_high().map_err(|_| SensorError::GpioFailed)? {
            if waited_us >= READY_TIMEOUT_MS * 1000 {
                return Err(SensorError::Timeout);
            }
            self.delay.delay_us(READY_POLL_US);
            waited_us += READY_POLL_US;
        }
        Ok(())
    }

    fn pulse(&mut self) -> Result<(), SensorError> {
        self.sck.set_high().map_err(|_| SensorError::GpioFailed)?;
        self.delay.delay_us(1);
        self.sck.set_low().map_err(|_| SensorError::GpioFailed)?;
        self.delay.delay_us(1);
        Ok(())
    }
}

impl<DOUT, SCK, D> ForceSensor for Hx711<DOUT, SCK, D>
where
    DOUT: InputPin,
    SCK: OutputPin,
    D: DelayNs,
{
    /// Wake the converter (SCK low leaves power-down).
    fn begin(&mut self) -> Result<(), SensorError> {
        self.sck.set_low().map_err(|_| SensorError::GpioFailed)?;
        self.started = true;
        Ok(())
    }

    fn tare(&mut self, times: u8) -> Result<(), SensorError> {
        self.offset = self.read_average(times)?;
        info!("HX711: tare offset {}", self.offset);
        Ok(())
    }

    fn read(&mut self, times: u8) -> Result<i32, SensorError> {
        Ok(self.read_average(times)?.saturating_sub(self.offset))
    }
}

fn sign_extend_24(raw: u32) -> i32 {
    ((raw << 8) as i32) >> 8
}
