//! Mock hardware for integration tests.
//!
//! The heater pin records every write and can be told to fail; the
//! temperature sensors replay whatever the test sets. Handles are shared
//! through `Rc` so a test keeps one end while the service owns the other.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};
use heizbox::adapters::time::ManualClock;
use heizbox::app::events::HeaterEvent;
use heizbox::app::ports::EventSink;
use heizbox::app::service::HeaterService;
use heizbox::calibration::TwoPointCalibration;
use heizbox::config::HeaterConfig;
use heizbox::drivers::zvs::{DutyCycleConfig, ZvsDriver};
use heizbox::error::SensorError;
use heizbox::sensors::TemperaturePipeline;
use heizbox::sensors::filter::TemperatureSensor;
use heizbox::session::{HeaterSession, SessionState};

// ── Heater pin ────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockPin {
    writes: Rc<RefCell<Vec<bool>>>,
    fail: Rc<Cell<bool>>,
}

#[allow(dead_code)]
impl MockPin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Level after the last successful write (low if never written).
    pub fn is_high(&self) -> bool {
        self.writes.borrow().last().copied().unwrap_or(false)
    }

    pub fn writes(&self) -> Vec<bool> {
        self.writes.borrow().clone()
    }

    /// Make every following write fail.
    pub fn set_failing(&self, fail: bool) {
        self.fail.set(fail);
    }

    fn write(&mut self, level: bool) -> Result<(), ErrorKind> {
        if self.fail.get() {
            return Err(ErrorKind::Other);
        }
        self.writes.borrow_mut().push(level);
        Ok(())
    }
}

impl ErrorType for MockPin {
    type Error = ErrorKind;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), ErrorKind> {
        self.write(false)
    }

    fn set_high(&mut self) -> Result<(), ErrorKind> {
        self.write(true)
    }
}

// ── Temperature sensor ────────────────────────────────────────

/// Returns the currently set reading on every read.
#[derive(Clone)]
pub struct ScriptedSensor {
    reading: Rc<Cell<Result<f32, SensorError>>>,
    reads: Rc<Cell<u32>>,
}

#[allow(dead_code)]
impl ScriptedSensor {
    pub fn new(celsius: f32) -> Self {
        Self {
            reading: Rc::new(Cell::new(Ok(celsius))),
            reads: Rc::new(Cell::new(0)),
        }
    }

    pub fn set(&self, celsius: f32) {
        self.reading.set(Ok(celsius));
    }

    pub fn fail(&self, error: SensorError) {
        self.reading.set(Err(error));
    }

    pub fn reads(&self) -> u32 {
        self.reads.get()
    }
}

impl TemperatureSensor for ScriptedSensor {
    fn read(&mut self) -> Result<f32, SensorError> {
        self.reads.set(self.reads.get() + 1);
        self.reading.get()
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<HeaterEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// `(from, to)` of every state change, in order.
    pub fn transitions(&self) -> Vec<(SessionState, SessionState)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                HeaterEvent::StateChanged { from, to, .. } => Some((*from, *to)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&HeaterEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &HeaterEvent) {
        self.events.push(event.clone());
    }
}

// ── Rig ───────────────────────────────────────────────────────

pub type TestService = HeaterService<ManualClock, MockPin, (), ScriptedSensor, ScriptedSensor>;

/// A started service plus the test's ends of every mock.
pub struct Rig {
    pub app: TestService,
    pub clock: ManualClock,
    pub heater: MockPin,
    pub contact: ScriptedSensor,
    pub infrared: ScriptedSensor,
    pub sink: RecordingSink,
}

#[allow(dead_code)]
impl Rig {
    pub fn new(config: HeaterConfig) -> Self {
        Self::starting_at(config, 0)
    }

    pub fn starting_at(config: HeaterConfig, now_ms: u32) -> Self {
        let clock = ManualClock::new(now_ms);
        let heater = MockPin::new();
        let contact = ScriptedSensor::new(25.0);
        let infrared = ScriptedSensor::new(25.0);

        let d = &config.duty_cycle;
        let engine = ZvsDriver::new(
            heater.clone(),
            DutyCycleConfig::new(d.period_ms, d.sensor_window_ms, d.power_percent),
        );
        let sensors = TemperaturePipeline::new(
            contact.clone(),
            infrared.clone(),
            &config.sensors,
            TwoPointCalibration::from_points(
                config.calibration,
                config.sensors.infrared_correction_percent,
            ),
        );
        let session = HeaterSession::new(clock.clone(), engine, sensors, &config);
        let mut app = HeaterService::new(session, config);
        let mut sink = RecordingSink::new();
        app.start(&mut sink);

        Self {
            app,
            clock,
            heater,
            contact,
            infrared,
            sink,
        }
    }

    /// Advance time in `step_ms` increments, ticking after each step.
    pub fn run_for(&mut self, total_ms: u32, step_ms: u32) {
        let mut left = total_ms;
        while left > 0 {
            let step = step_ms.min(left);
            self.clock.advance(step);
            self.app.tick(&mut self.sink);
            left -= step;
        }
    }

    pub fn tick(&mut self) {
        self.app.tick(&mut self.sink);
    }

    pub fn command(&mut self, cmd: heizbox::app::commands::HeaterCommand) {
        self.app.handle_command(cmd, &mut self.sink);
    }
}
