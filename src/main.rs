//! Heizbox firmware: main entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Adapters (outer ring)                    │
//! │                                                              │
//! │  PinDriver (ZVS gate, LED)   Max6675 (SPI)   Mlx90614 (I2C)  │
//! │  LogEventSink (EventSink)    NvsConfigStore  MonotonicClock  │
//! │                                                              │
//! │  ──────────────── Port Trait Boundary ─────────────────      │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │            HeaterService (pure logic)                  │  │
//! │  │  HeaterSession · ZvsDriver · TemperaturePipeline       │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │                                                              │
//! │  CommandMailbox ◀── button                                   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Pin map (ESP32 DevKit):
//!
//! | Signal              | GPIO |
//! |---------------------|------|
//! | ZVS heater gate     | 32   |
//! | Heater status LED   | 2    |
//! | MAX6675 SCK         | 18   |
//! | MAX6675 CS          | 5    |
//! | MAX6675 SO          | 19   |
//! | MLX90614 SDA        | 27   |
//! | MLX90614 SCL        | 26   |
//! | Start/stop button   | 0    |

use anyhow::Result;
use esp_idf_hal::delay::{Delay, FreeRtos};
use esp_idf_hal::gpio::{PinDriver, Pull};
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::prelude::*;
use esp_idf_hal::spi::{SpiDeviceDriver, SpiDriver, SpiDriverConfig, config::Config as SpiConfig};
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{info, warn};

use heizbox::adapters::log_sink::LogEventSink;
use heizbox::adapters::nvs::NvsConfigStore;
use heizbox::adapters::time::MonotonicClock;
use heizbox::app::commands::HeaterCommand;
use heizbox::app::mailbox::CommandMailbox;
use heizbox::app::ports::{ConfigError, ConfigPort};
use heizbox::calibration::TwoPointCalibration;
use heizbox::drivers::status_led::StatusLed;
use heizbox::drivers::zvs::{DutyCycleConfig, ZvsDriver};
use heizbox::sensors::TemperaturePipeline;
use heizbox::sensors::infrared::Mlx90614;
use heizbox::sensors::thermocouple::Max6675;
use heizbox::{HeaterConfig, HeaterService, HeaterSession, SessionState};

/// Control loop period. Well below the sensor window so the window is
/// never skipped.
const LOOP_INTERVAL_MS: u32 = 5;

/// Button must read the same level this many loops in a row.
const BUTTON_DEBOUNCE_LOOPS: u8 = 5;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("Heizbox v{}", env!("CARGO_PKG_VERSION"));

    let peripherals = Peripherals::take()?;

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let store = NvsConfigStore::new(EspDefaultNvsPartition::take()?)?;
    let config = match store.load() {
        Ok(cfg) => match cfg.validate() {
            Ok(()) => cfg,
            Err(e) => {
                warn!("Stored config invalid ({}), using defaults", e);
                HeaterConfig::default()
            }
        },
        Err(ConfigError::NotFound) => {
            info!("No stored config, using defaults");
            HeaterConfig::default()
        }
        Err(e) => {
            warn!("Config load failed ({}), using defaults", e);
            HeaterConfig::default()
        }
    };

    // ── 3. Heater output and indicator ────────────────────────
    let heater_pin = PinDriver::output(peripherals.pins.gpio32)?;
    let led = StatusLed::new(PinDriver::output(peripherals.pins.gpio2)?);
    let d = &config.duty_cycle;
    let engine = ZvsDriver::with_indicator(
        heater_pin,
        led,
        DutyCycleConfig::new(d.period_ms, d.sensor_window_ms, d.power_percent),
    );

    // ── 4. Temperature sensors ────────────────────────────────
    let spi = SpiDriver::new_without_sdo(
        peripherals.spi2,
        peripherals.pins.gpio18,
        peripherals.pins.gpio19,
        &SpiDriverConfig::new(),
    )?;
    let thermocouple = Max6675::new(SpiDeviceDriver::new(
        spi,
        Some(peripherals.pins.gpio5),
        &SpiConfig::new().baudrate(1.MHz().into()),
    )?);

    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio27,
        peripherals.pins.gpio26,
        &I2cConfig::new().baudrate(100.kHz().into()),
    )?;
    let mut infrared = Mlx90614::new(i2c);
    let emissivity = f32::from(config.sensors.emissivity_percent) / 100.0;
    if let Err(e) = infrared.set_emissivity(emissivity, &mut Delay::new_default()) {
        warn!("Emissivity not applied: {}", e);
    }

    let sensors = TemperaturePipeline::new(
        thermocouple,
        infrared,
        &config.sensors,
        TwoPointCalibration::from_points(
            config.calibration,
            config.sensors.infrared_correction_percent,
        ),
    );

    // ── 5. Construct app service ──────────────────────────────
    let session = HeaterSession::new(MonotonicClock::new(), engine, sensors, &config);
    let mut app = HeaterService::new(session, config);
    let mut log_sink = LogEventSink::new();
    app.start(&mut log_sink);

    let mut mailbox: CommandMailbox<8> = CommandMailbox::new();
    let (mut commands_tx, mut commands_rx) = mailbox.split();

    let mut button = PinDriver::input(peripherals.pins.gpio0)?;
    button.set_pull(Pull::Up)?;
    let mut button_pressed = false;
    let mut button_stable: u8 = 0;

    info!("System ready. Entering control loop.");

    // ── 6. Control loop ───────────────────────────────────────
    loop {
        // Active-low button; act on the debounced press edge.
        let level = button.is_low();
        if level == button_pressed {
            button_stable = 0;
        } else {
            button_stable += 1;
            if button_stable >= BUTTON_DEBOUNCE_LOOPS {
                button_pressed = level;
                button_stable = 0;
                if button_pressed {
                    let cmd = if app.state() == SessionState::Heating {
                        HeaterCommand::Stop
                    } else {
                        HeaterCommand::Start
                    };
                    // A full mailbox already logged the drop.
                    let _ = commands_tx.send(cmd);
                }
            }
        }

        for cmd in commands_rx.by_ref() {
            app.handle_command(cmd, &mut log_sink);
        }

        app.tick(&mut log_sink);
        app.auto_save_if_needed(&store);

        FreeRtos::delay_ms(LOOP_INTERVAL_MS);
    }
}
