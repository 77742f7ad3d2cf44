//! Heating lifecycle through the service: duty cycling, pause/resume,
//! auto-stop, cycle accounting and output failure.

use heizbox::app::commands::HeaterCommand;
use heizbox::app::events::HeaterEvent;
use heizbox::config::HeaterConfig;
use heizbox::drivers::zvs::DutyCyclePhase;
use heizbox::error::SensorError;
use heizbox::safety::{CeilingPolicy, SafetyFault};
use heizbox::sensors::TemperatureSource;
use heizbox::session::{SessionState, StopReason};

use crate::mock_hw::Rig;

fn stop_reasons(rig: &Rig) -> Vec<Option<StopReason>> {
    rig.sink
        .events
        .iter()
        .filter_map(|e| match e {
            HeaterEvent::StateChanged { reason, .. } => Some(*reason),
            _ => None,
        })
        .collect()
}

fn completed_cycles(rig: &Rig) -> Vec<(u32, u8, u32)> {
    rig.sink
        .events
        .iter()
        .filter_map(|e| match e {
            HeaterEvent::CycleCompleted {
                duration_ms,
                cycle,
                total,
            } => Some((*duration_ms, *cycle, *total)),
            _ => None,
        })
        .collect()
}

// ── Duty cycling ──────────────────────────────────────────────

#[test]
fn full_power_cycle_measures_once_per_period() {
    let mut rig = Rig::new(HeaterConfig::default());
    assert!(!rig.heater.is_high(), "output must start de-energized");

    rig.command(HeaterCommand::Start);
    assert!(rig.heater.is_high());

    // 1000 ms period, 200 ms window: on for 800 ms.
    rig.run_for(790, 10);
    assert!(rig.heater.is_high());
    rig.run_for(10, 10);
    assert!(!rig.heater.is_high());

    rig.run_for(1200, 10);
    let stats = rig.app.session().stats();
    assert_eq!(stats.measurements, 2);
    assert_eq!(stats.cycles, 2);
    assert_eq!(rig.contact.reads(), 2, "contact is only read inside the window");
    assert!(rig.heater.is_high());
    assert_eq!(rig.heater.writes(), vec![false, true, false, true, false, true]);
}

#[test]
fn contact_reads_outside_the_window_when_always_measure_is_set() {
    let mut config = HeaterConfig::default();
    config.sensors.always_measure = true;
    let mut rig = Rig::new(config);
    rig.command(HeaterCommand::Start);
    rig.run_for(1000, 10);
    assert!(rig.contact.reads() > 1);
}

#[test]
fn measurements_survive_clock_wraparound() {
    let mut rig = Rig::starting_at(HeaterConfig::default(), u32::MAX - 500);
    rig.command(HeaterCommand::Start);
    rig.run_for(2000, 10);
    assert_eq!(rig.app.session().stats().measurements, 2);
    assert_eq!(rig.app.session().elapsed_ms(), 2000);
    assert_eq!(rig.app.state(), SessionState::Heating);
}

// ── Pause / resume ────────────────────────────────────────────

#[test]
fn pause_time_is_excluded_from_the_cycle() {
    let mut rig = Rig::new(HeaterConfig::default());
    rig.command(HeaterCommand::Start);
    rig.run_for(5000, 10);

    rig.command(HeaterCommand::Pause);
    assert_eq!(rig.app.state(), SessionState::Paused);
    assert!(!rig.heater.is_high());
    assert_eq!(rig.app.session().phase(), DutyCyclePhase::Idle);

    rig.run_for(3000, 10);
    assert_eq!(rig.app.session().elapsed_ms(), 5000);

    rig.command(HeaterCommand::Start);
    assert!(rig.heater.is_high());
    rig.run_for(5000, 10);
    rig.command(HeaterCommand::Stop);

    assert_eq!(rig.app.state(), SessionState::Idle);
    assert_eq!(completed_cycles(&rig), vec![(10_000, 1, 1)]);
    assert_eq!(
        rig.sink.transitions(),
        vec![
            (SessionState::Idle, SessionState::Heating),
            (SessionState::Heating, SessionState::Paused),
            (SessionState::Paused, SessionState::Heating),
            (SessionState::Heating, SessionState::Idle),
        ]
    );
    assert_eq!(stop_reasons(&rig)[3], Some(StopReason::User));
}

#[test]
fn stop_while_paused_keeps_the_pause() {
    let mut rig = Rig::new(HeaterConfig::default());
    rig.command(HeaterCommand::Start);
    rig.run_for(2000, 10);
    rig.command(HeaterCommand::Pause);
    rig.command(HeaterCommand::Stop);
    assert_eq!(rig.app.state(), SessionState::Paused);
    assert!(!rig.heater.is_high());
}

#[test]
fn pause_timeout_finalizes_the_cycle() {
    let mut rig = Rig::new(HeaterConfig::default());
    rig.command(HeaterCommand::Start);
    rig.run_for(12_000, 10);
    rig.command(HeaterCommand::Pause);

    rig.run_for(4990, 10);
    assert_eq!(rig.app.state(), SessionState::Paused);
    rig.run_for(10, 10);

    assert_eq!(rig.app.state(), SessionState::Idle);
    assert_eq!(completed_cycles(&rig), vec![(12_000, 1, 1)]);
    assert_eq!(stop_reasons(&rig).last(), Some(&Some(StopReason::PauseTimeout)));
}

// ── Auto-stop and cycle accounting ────────────────────────────

#[test]
fn auto_stop_completes_the_cycle_and_switches_heat_cycle() {
    let mut config = HeaterConfig::default();
    config.session.auto_stop_ms = 15_000;
    let mut rig = Rig::new(config);
    assert_eq!(rig.app.heat_cycle(), 1);
    assert_eq!(rig.app.session().ceiling_limit(), Some(210.0));

    rig.command(HeaterCommand::Start);
    rig.run_for(14_990, 10);
    assert_eq!(rig.app.state(), SessionState::Heating);
    rig.run_for(10, 10);

    assert_eq!(rig.app.state(), SessionState::Idle);
    assert!(!rig.heater.is_high());
    assert_eq!(completed_cycles(&rig), vec![(15_000, 1, 1)]);
    assert_eq!(stop_reasons(&rig).last(), Some(&Some(StopReason::AutoStop)));
    assert_eq!(rig.app.heat_cycle(), 2);
    assert_eq!(rig.app.session().ceiling_limit(), Some(225.0));
    assert!(!rig.app.session().is_cycle_finished(), "flag is consumed");
}

#[test]
fn short_sessions_are_not_counted() {
    let mut rig = Rig::new(HeaterConfig::default());
    rig.command(HeaterCommand::Start);
    rig.run_for(5000, 10);
    rig.command(HeaterCommand::Stop);

    assert_eq!(rig.app.session().cycle_count(), 0);
    assert!(completed_cycles(&rig).is_empty());
    assert_eq!(rig.app.heat_cycle(), 1);
}

#[test]
fn enforced_ceiling_stops_on_contact_temperature() {
    let mut config = HeaterConfig::default();
    config.ceiling.policy = CeilingPolicy::Enforced;
    config.ceiling.source = TemperatureSource::Contact;
    config.ceiling.limit_cycle_1_c = 100;
    let mut rig = Rig::new(config);

    rig.command(HeaterCommand::Start);
    rig.run_for(1000, 10);
    rig.contact.set(60.0);
    rig.run_for(1000, 10);
    assert_eq!(rig.app.state(), SessionState::Heating);

    rig.contact.set(105.0);
    rig.run_for(1000, 10);
    assert_eq!(rig.app.state(), SessionState::Idle);
    assert!(!rig.heater.is_high());
    assert_eq!(
        stop_reasons(&rig).last(),
        Some(&Some(StopReason::TemperatureLimit))
    );
}

// ── Sensors and faults ────────────────────────────────────────

#[test]
fn contact_temperature_becomes_unknown_after_five_bad_reads() {
    let mut rig = Rig::new(HeaterConfig::default());
    rig.command(HeaterCommand::Start);
    rig.run_for(1000, 10);
    assert_eq!(rig.app.session().sensors().contact_celsius(), Some(25.0));

    rig.contact.fail(SensorError::OpenCircuit);
    rig.run_for(4000, 10);
    assert_eq!(
        rig.app.session().sensors().contact_celsius(),
        Some(25.0),
        "four rejections keep the last value"
    );
    rig.run_for(1000, 10);
    assert_eq!(rig.app.session().sensors().contact_celsius(), None);
    assert_eq!(rig.app.build_telemetry().contact_c, None);
}

#[test]
fn unknown_ceiling_temperature_raises_a_fault_while_heating() {
    let mut rig = Rig::new(HeaterConfig::default());
    rig.infrared.fail(SensorError::Bus);
    rig.command(HeaterCommand::Start);
    rig.run_for(10, 10);
    assert_ne!(
        rig.app.fault_flags() & SafetyFault::SensorUnavailable.mask(),
        0
    );

    rig.command(HeaterCommand::Stop);
    rig.run_for(10, 10);
    assert_eq!(rig.app.fault_flags(), 0);
    assert_eq!(rig.sink.count(|e| *e == HeaterEvent::FaultCleared), 1);
}

#[test]
fn heater_pin_failure_enters_error_until_cleared() {
    let mut rig = Rig::new(HeaterConfig::default());
    rig.command(HeaterCommand::Start);
    rig.heater.set_failing(true);

    rig.run_for(1000, 10);
    assert_eq!(rig.app.state(), SessionState::Error);
    assert!(rig.app.session().engine().is_faulted());
    assert_eq!(
        rig.sink.transitions().last(),
        Some(&(SessionState::Heating, SessionState::Error))
    );
    assert_eq!(stop_reasons(&rig).last(), Some(&Some(StopReason::Fault)));
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, HeaterEvent::StateChanged { to: SessionState::Error, .. })),
        1,
        "the transition is reported once"
    );
    assert_ne!(rig.app.fault_flags() & SafetyFault::OutputFault.mask(), 0);

    // No automatic retry of heating.
    rig.command(HeaterCommand::Start);
    assert_eq!(rig.app.state(), SessionState::Error);

    // Once the pin works again the output is forced low.
    rig.heater.set_failing(false);
    rig.run_for(10, 10);
    assert!(!rig.heater.is_high());

    rig.command(HeaterCommand::ClearFault);
    assert_eq!(rig.app.state(), SessionState::Idle);
    rig.command(HeaterCommand::Start);
    assert_eq!(rig.app.state(), SessionState::Heating);
    assert!(rig.heater.is_high());
}

#[test]
fn reported_fault_blocks_start() {
    let mut rig = Rig::new(HeaterConfig::default());
    rig.command(HeaterCommand::Start);
    rig.app.report_fault(&mut rig.sink);
    assert_eq!(rig.app.state(), SessionState::Error);
    assert!(!rig.heater.is_high());

    rig.command(HeaterCommand::Start);
    assert_eq!(rig.app.state(), SessionState::Error);
}
