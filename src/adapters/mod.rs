//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements       | Connects to                   |
//! |-------------|------------------|-------------------------------|
//! | `console`   | (none)           | Serial console command lines  |
//! | `device_id` | (none)           | eFuse MAC → broker client id  |
//! | `log_sink`  | EventSink        | Serial log output             |
//! | `mem_log`   | LogDevice        | RAM (tests, simulation)       |
//! | `mqtt`      | BrokerPort       | ESP-IDF MQTT client over TLS  |
//! | `nvs`       | ConfigPort       | NVS / in-memory store         |
//! |             | StoragePort      |                               |
//! | `sd_log`    | LogDevice        | FAT file on the SD card       |
//! | `time`      | (none)           | ESP32 high-resolution timer   |
//! | `wifi`      | WifiPort         | ESP-IDF WiFi STA              |

pub mod console;
pub mod device_id;
pub mod log_sink;
pub mod mem_log;
pub mod mqtt;
pub mod nvs;
pub mod sd_log;
pub mod time;
pub mod wifi;
