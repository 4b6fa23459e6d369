//! Peripheral drivers written against `embedded-hal` 1.0 traits.

pub mod hx711;
pub mod status_led;
