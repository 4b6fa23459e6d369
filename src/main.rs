//! Crackwatch sensor node: main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  ForcePair<Hx711>   StatusLeds     LogEventSink   NvsAdapter   │
//! │  (SensorPort)       (Indicator)    (EventSink)    (Config+KV)  │
//! │  WifiAdapter        MqttAdapter    FileLogDevice  Monotonic    │
//! │  (WifiPort)         (BrokerPort)   (LogDevice)    Clock        │
//! │  console reader (WIFI lines → NodeService::apply_console)      │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            NodeService (cooperative loop)              │    │
//! │  │  link · sampler · session/drain · indicators           │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{error, info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::fs::fatfs::Fatfs;
use esp_idf_svc::hal::delay::{Ets, FreeRtos};
use esp_idf_svc::hal::gpio::{AnyIOPin, AnyInputPin, AnyOutputPin, PinDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::sd::spi::SdSpiHostDriver;
use esp_idf_svc::hal::sd::{SdCardConfiguration, SdCardDriver};
use esp_idf_svc::hal::spi::{Dma, SpiDriver, SpiDriverConfig};
use esp_idf_svc::io::vfs::MountedFatfs;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};

use crackwatch::adapters::console;
use crackwatch::adapters::device_id;
use crackwatch::adapters::log_sink::LogEventSink;
use crackwatch::adapters::mqtt::MqttAdapter;
use crackwatch::adapters::nvs::NvsAdapter;
use crackwatch::adapters::sd_log::{FileLogDevice, SD_MOUNT_POINT};
use crackwatch::adapters::time::MonotonicClock;
use crackwatch::adapters::wifi::WifiAdapter;
use crackwatch::app::ports::ConfigPort;
use crackwatch::app::service::NodeService;
use crackwatch::config::NodeConfig;
use crackwatch::credentials::{CredentialStore, build_time_profile};
use crackwatch::drivers::hx711::Hx711;
use crackwatch::drivers::status_led::StatusLeds;
use crackwatch::pins;
use crackwatch::queue::DurableQueue;
use crackwatch::sensors::ForcePair;

/// Idle time between loop iterations.
const LOOP_IDLE_MS: u32 = 20;

/// Stop here with a log line every few seconds.  Used when the sample
/// log is unusable: running without it would silently lose data.
fn halt(reason: &str) -> ! {
    loop {
        error!("HALTED: {}", reason);
        FreeRtos::delay_ms(5000);
    }
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Crackwatch node v{}              ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;

    // ── 2. NVS + config ───────────────────────────────────────
    let nvs = NvsAdapter::new().map_err(|e| anyhow::anyhow!("NVS init: {}", e))?;
    let config = match nvs.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("Config load failed ({}), using defaults", e);
            NodeConfig::default()
        }
    };
    let client_id = device_id::client_id(&device_id::read_mac());
    info!("Client ID: {}", client_id);

    // ── 3. SD card + sample log ───────────────────────────────
    // SAFETY: each pin number below is used by exactly one driver.
    let spi = SpiDriver::new(
        peripherals.spi2,
        unsafe { AnyOutputPin::new(pins::SD_SCLK_GPIO) },
        unsafe { AnyOutputPin::new(pins::SD_MOSI_GPIO) },
        Some(unsafe { AnyInputPin::new(pins::SD_MISO_GPIO) }),
        &SpiDriverConfig::default().dma(Dma::Auto(4096)),
    )?;
    let card = SdSpiHostDriver::new(
        spi,
        Some(unsafe { AnyOutputPin::new(pins::SD_CS_GPIO) }),
        AnyIOPin::none(),
        AnyIOPin::none(),
        AnyIOPin::none(),
        None,
    )
    .and_then(|host| SdCardDriver::new_spi(host, &SdCardConfiguration::new()));
    let card = match card {
        Ok(c) => c,
        Err(e) => halt(&format!("SD card init failed: {}", e)),
    };
    let _fatfs = match Fatfs::new_sdcard(0, card)
        .and_then(|fs| MountedFatfs::mount(fs, SD_MOUNT_POINT, pins::SD_MAX_OPEN_FILES))
    {
        Ok(m) => m,
        Err(e) => halt(&format!("SD mount failed: {}", e)),
    };
    let log = match FileLogDevice::open_default() {
        Ok(l) => l,
        Err(e) => halt(&format!("sample log open failed: {}", e)),
    };
    let queue = match DurableQueue::open(log, config.queue_capacity_bytes) {
        Ok(q) => q,
        Err(e) => halt(&format!("sample log recovery failed: {}", e)),
    };

    // ── 4. Sensors: begin, settle, tare ───────────────────────
    // SAFETY: see above.
    let load_cell = Hx711::new(
        PinDriver::input(unsafe { AnyInputPin::new(pins::LOADCELL_DOUT_GPIO) })?,
        PinDriver::output(unsafe { AnyOutputPin::new(pins::LOADCELL_SCK_GPIO) })?,
        Ets,
    );
    let strain_gauge = Hx711::new(
        PinDriver::input(unsafe { AnyInputPin::new(pins::STRAIN_DOUT_GPIO) })?,
        PinDriver::output(unsafe { AnyOutputPin::new(pins::STRAIN_SCK_GPIO) })?,
        Ets,
    );
    let mut sensors = ForcePair::new(load_cell, strain_gauge, config.samples_per_reading);
    let settle_ms = config.tare_settle_ms;
    if let Err(e) = sensors.calibrate(|| FreeRtos::delay_ms(settle_ms)) {
        // Keep running: reads will fail and be skipped until the wiring is fixed.
        warn!("Sensor calibration failed: {}", e);
    }

    let mut leds = StatusLeds::new(
        PinDriver::output(unsafe { AnyOutputPin::new(pins::WIFI_LED_GPIO) })?,
        PinDriver::output(unsafe { AnyOutputPin::new(pins::MQTT_LED_GPIO) })?,
    );

    // ── 5. Radio + broker ─────────────────────────────────────
    let esp_wifi = EspWifi::new(peripherals.modem, sysloop.clone(), None)?;
    let mut wifi = WifiAdapter::new(BlockingWifi::wrap(esp_wifi, sysloop)?)?;
    let mut broker = MqttAdapter::new(&config.broker_url());

    // ── 6. Node service ───────────────────────────────────────
    let credentials = CredentialStore::new(nvs);
    let mut sink = LogEventSink::new();
    let mut node = NodeService::new(config, credentials, queue, &client_id);
    if let Some(profile) = build_time_profile() {
        if let Err(e) = node.seed_network(&profile) {
            warn!("Build-time network not stored: {}", e);
        }
    }
    node.start(&mut sink);

    // Fallback provisioning over the serial console.
    let console_rx = console::spawn(std::io::stdin())?;

    info!("System ready. Entering main loop.");
    let clock = MonotonicClock::new();

    // ── 7. Cooperative loop ───────────────────────────────────
    loop {
        while let Ok(cmd) = console_rx.try_recv() {
            if let Err(e) = node.apply_console(&cmd) {
                warn!("Console command failed: {}", e);
            }
        }
        if let Err(e) = node.tick(
            clock.uptime_ms(),
            &mut wifi,
            &mut sensors,
            &mut broker,
            &mut leds,
            &mut sink,
        ) {
            error!("Fatal: {}, restarting", e);
            FreeRtos::delay_ms(1000);
            esp_idf_svc::hal::reset::restart();
        }
        FreeRtos::delay_ms(LOOP_IDLE_MS);
    }
}
