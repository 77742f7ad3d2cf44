//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements   | Connects to                     |
//! |----------------|--------------|---------------------------------|
//! | `json_sink`    | EventSink    | JSON lines for the backend link |
//! | `log_sink`     | EventSink    | Serial log output               |
//! | `memory_store` | ConfigPort   | In-memory postcard blob         |
//! | `nvs`          | ConfigPort   | ESP-IDF NVS flash (`espidf`)    |
//! | `time`         | Clock        | ESP32 system timer / host clock |

pub mod json_sink;
pub mod log_sink;
pub mod memory_store;
#[cfg(feature = "espidf")]
pub mod nvs;
pub mod time;
