//! Two-LED status panel.
//!
//! | LED     | Solid              | Blinking              |
//! |---------|--------------------|-----------------------|
//! | WiFi    | link up            | sampling halted       |
//! | MQTT    | broker session up  | sampling halted       |
//!
//! Pins are any embedded-hal `OutputPin`, so the same driver runs on
//! `PinDriver` on target and on a recording mock in tests.

use embedded_hal::digital::OutputPin;
use log::warn;

use crate::app::ports::IndicatorPort;

pub struct StatusLeds<W, M> {
    wifi: W,
    mqtt: M,
    link: bool,
    session: bool,
    warned: bool,
}

impl<W: OutputPin, M: OutputPin> StatusLeds<W, M> {
    pub fn new(wifi: W, mqtt: M) -> Self {
        let mut leds = Self {
            wifi,
            mqtt,
            link: false,
            session: false,
            warned: false,
        };
        leds.drive(false, false);
        leds
    }

    fn drive(&mut self, wifi_on: bool, mqtt_on: bool) {
        let a = self.wifi.set_state(wifi_on.into()).is_ok();
        let b = self.mqtt.set_state(mqtt_on.into()).is_ok();
        if !(a && b) && !self.warned {
            warn!("LED: pin write failed");
            self.warned = true;
        }
    }
}

impl<W: OutputPin, M: OutputPin> IndicatorPort for StatusLeds<W, M> {
    fn set_link(&mut self, on: bool) {
        self.link = on;
        self.drive(self.link, self.session);
    }

    fn set_session(&mut self, on: bool) {
        self.session = on;
        self.drive(self.link, self.session);
    }

    /// Both LEDs in phase; the next `set_*` call restores the plain display.
    fn show_alarm(&mut self, phase_on: bool) {
        self.drive(phase_on, phase_on);
    }
}
