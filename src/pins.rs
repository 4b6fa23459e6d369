//! GPIO / peripheral pin assignments for the Crackwatch sensor node
//! (ESP32-S3 carrier board).
//!
//! Single source of truth: `main.rs` builds every driver from these
//! numbers rather than hard-coding pins.

// ---------------------------------------------------------------------------
// Force sensors (two HX711 bridge ADCs, bit-banged)
// ---------------------------------------------------------------------------

/// Load-cell HX711 data out (input).
pub const LOADCELL_DOUT_GPIO: i32 = 4;
/// Load-cell HX711 clock (output).
pub const LOADCELL_SCK_GPIO: i32 = 5;
/// Strain-gauge HX711 data out (input).
pub const STRAIN_DOUT_GPIO: i32 = 6;
/// Strain-gauge HX711 clock (output).
pub const STRAIN_SCK_GPIO: i32 = 7;

// ---------------------------------------------------------------------------
// Status LEDs (active HIGH)
// ---------------------------------------------------------------------------

pub const WIFI_LED_GPIO: i32 = 15;
pub const MQTT_LED_GPIO: i32 = 16;

// ---------------------------------------------------------------------------
// SD card (SPI2 / FSPI default pins)
// ---------------------------------------------------------------------------

pub const SD_SCLK_GPIO: i32 = 12;
pub const SD_MOSI_GPIO: i32 = 11;
pub const SD_MISO_GPIO: i32 = 13;
pub const SD_CS_GPIO: i32 = 10;

/// Open files the FAT VFS keeps at once (log + compaction temp).
pub const SD_MAX_OPEN_FILES: usize = 4;
