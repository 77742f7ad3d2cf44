//! Command handling, calibration, telemetry and config persistence.

use heizbox::adapters::memory_store::MemoryConfigStore;
use heizbox::app::commands::HeaterCommand;
use heizbox::app::events::HeaterEvent;
use heizbox::app::mailbox::CommandMailbox;
use heizbox::app::ports::ConfigPort;
use heizbox::calibration::CalibrationSlot;
use heizbox::config::{CalibrationPoints, HeaterConfig};
use heizbox::session::SessionState;

use crate::mock_hw::Rig;

// ── Mailbox ───────────────────────────────────────────────────

#[test]
fn mailbox_commands_are_applied_in_order() {
    let mut rig = Rig::new(HeaterConfig::default());
    let mut mailbox: CommandMailbox<4> = CommandMailbox::new();
    let (mut tx, mut rx) = mailbox.split();

    tx.send(HeaterCommand::SetPower(50)).unwrap();
    tx.send(HeaterCommand::Start).unwrap();
    tx.send(HeaterCommand::Pause).unwrap();
    assert_eq!(tx.send(HeaterCommand::Stop), Err(HeaterCommand::Stop));

    for cmd in rx.by_ref() {
        rig.command(cmd);
    }
    assert!(rx.is_empty());
    assert_eq!(rig.app.state(), SessionState::Paused);
    assert_eq!(rig.app.session().power(), 50);
    assert_eq!(rig.app.current_config().duty_cycle.power_percent, 50);
}

// ── Settings ──────────────────────────────────────────────────

#[test]
fn power_change_applies_from_the_next_cycle() {
    let mut rig = Rig::new(HeaterConfig::default());
    rig.command(HeaterCommand::Start);
    rig.run_for(100, 10);

    rig.command(HeaterCommand::SetPower(50));
    assert_eq!(rig.app.session().power(), 50);
    assert_eq!(rig.app.session().engine().active_config().power(), 100);

    // Current cycle still runs 800 ms on; the next one 500 ms.
    rig.run_for(700, 10);
    assert!(!rig.heater.is_high());
    rig.run_for(200, 10);
    assert!(rig.heater.is_high());
    assert_eq!(rig.app.session().engine().active_config().power(), 50);
    rig.run_for(500, 10);
    assert!(!rig.heater.is_high());
}

#[test]
fn power_above_100_is_clamped() {
    let mut rig = Rig::new(HeaterConfig::default());
    rig.command(HeaterCommand::SetPower(180));
    assert_eq!(rig.app.session().power(), 100);
    assert_eq!(rig.app.current_config().duty_cycle.power_percent, 100);
}

#[test]
fn invalid_config_update_is_rejected() {
    let mut rig = Rig::new(HeaterConfig::default());
    let mut bad = HeaterConfig::default();
    bad.duty_cycle.sensor_window_ms = bad.duty_cycle.period_ms;
    rig.command(HeaterCommand::UpdateConfig(Box::new(bad)));
    assert_eq!(rig.app.current_config(), HeaterConfig::default());
    assert!(!rig.app.is_config_dirty());
}

#[test]
fn invalid_auto_stop_is_rejected() {
    let mut rig = Rig::new(HeaterConfig::default());
    let default_auto_stop = HeaterConfig::default().session.auto_stop_ms;

    // Below the minimum cycle duration, and below the valid range.
    rig.command(HeaterCommand::SetAutoStop(5_000));
    rig.command(HeaterCommand::SetAutoStop(0));
    assert_eq!(rig.app.session().auto_stop_ms(), default_auto_stop);
    assert_eq!(rig.app.current_config().session.auto_stop_ms, default_auto_stop);
    assert!(!rig.app.is_config_dirty());

    // Later settings still persist.
    let store = MemoryConfigStore::new();
    rig.command(HeaterCommand::SetPower(60));
    rig.clock.advance(5_000);
    assert!(rig.app.auto_save_if_needed(&store));
    assert_eq!(store.save_count(), 1);
    assert_eq!(store.load().unwrap().duty_cycle.power_percent, 60);

    rig.command(HeaterCommand::Start);
    rig.run_for(10, 10);
    assert_eq!(rig.app.state(), SessionState::Heating);
}

#[test]
fn config_update_reaches_the_session() {
    let mut rig = Rig::new(HeaterConfig::default());
    let mut cfg = HeaterConfig::default();
    cfg.session.auto_stop_ms = 60_000;
    cfg.duty_cycle.power_percent = 40;
    cfg.ceiling.limit_cycle_1_c = 200;
    rig.command(HeaterCommand::UpdateConfig(Box::new(cfg.clone())));

    assert_eq!(rig.app.current_config(), cfg);
    assert_eq!(rig.app.session().auto_stop_ms(), 60_000);
    assert_eq!(rig.app.session().power(), 40);
    assert_eq!(rig.app.session().ceiling_limit(), Some(200.0));
    assert!(rig.app.is_config_dirty());
}

#[test]
fn select_cycle_switches_the_limit() {
    let mut rig = Rig::new(HeaterConfig::default());
    rig.command(HeaterCommand::SelectCycle(2));
    assert_eq!(rig.app.heat_cycle(), 2);
    assert_eq!(rig.app.session().ceiling_limit(), Some(225.0));

    rig.command(HeaterCommand::SelectCycle(3));
    assert_eq!(rig.app.heat_cycle(), 2);
}

// ── Calibration ───────────────────────────────────────────────

#[test]
fn two_point_calibration_via_commands() {
    let mut rig = Rig::new(HeaterConfig::default());

    rig.infrared.set(100.0);
    rig.command(HeaterCommand::MarkCalibration { actual: 150 });
    rig.infrared.set(140.0);
    rig.command(HeaterCommand::MarkCalibration { actual: 200 });

    let marks: Vec<_> = rig
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            HeaterEvent::CalibrationMarked {
                slot,
                measured,
                actual,
            } => Some((*slot, *measured, *actual)),
            _ => None,
        })
        .collect();
    assert_eq!(
        marks,
        vec![(CalibrationSlot::A, 100, 150), (CalibrationSlot::B, 140, 200)]
    );
    assert_eq!(
        rig.app.current_config().calibration,
        CalibrationPoints {
            measured_a: 100,
            actual_a: 150,
            measured_b: 140,
            actual_b: 200,
        }
    );
    assert!(rig.app.is_config_dirty());

    rig.infrared.set(144.0);
    rig.clock.advance(100);
    rig.tick();
    let calibrated = rig.app.session().sensors().infrared_celsius().unwrap();
    assert!((calibrated - 205.0).abs() < 1e-3, "got {calibrated}");
    assert_eq!(rig.app.session().sensors().infrared_raw(), Some(144.0));
}

#[test]
fn calibration_with_unreadable_sensor_is_ignored() {
    let mut rig = Rig::new(HeaterConfig::default());
    rig.infrared.fail(heizbox::error::SensorError::Bus);
    rig.command(HeaterCommand::MarkCalibration { actual: 150 });
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, HeaterEvent::CalibrationMarked { .. })),
        0
    );
    assert!(!rig.app.is_config_dirty());
}

#[test]
fn clear_calibration_restores_identity() {
    let mut rig = Rig::new(HeaterConfig::default());
    rig.infrared.set(100.0);
    rig.command(HeaterCommand::MarkCalibration { actual: 150 });
    rig.infrared.set(140.0);
    rig.command(HeaterCommand::MarkCalibration { actual: 200 });

    rig.command(HeaterCommand::ClearCalibration);
    assert_eq!(
        rig.app.current_config().calibration,
        HeaterConfig::default().calibration
    );
    rig.clock.advance(100);
    rig.tick();
    assert_eq!(rig.app.session().sensors().infrared_celsius(), Some(140.0));
}

// ── Events ────────────────────────────────────────────────────

#[test]
fn click_fires_once_per_crossing() {
    let mut rig = Rig::new(HeaterConfig::default());
    rig.command(HeaterCommand::Start);
    rig.run_for(1000, 10);
    for t in [70.0, 120.0, 170.0, 195.0, 200.0] {
        rig.contact.set(t);
        rig.run_for(1000, 10);
    }
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, HeaterEvent::ClickReached { .. })),
        1
    );
}

#[test]
fn telemetry_follows_the_configured_interval() {
    let mut rig = Rig::new(HeaterConfig::default());
    rig.sink.clear();
    rig.run_for(3000, 10);
    assert_eq!(
        rig.sink.count(|e| matches!(e, HeaterEvent::Telemetry(_))),
        3
    );
}

#[test]
fn start_event_is_emitted_once() {
    let rig = Rig::new(HeaterConfig::default());
    assert_eq!(
        rig.sink.events,
        vec![HeaterEvent::Started(SessionState::Idle)]
    );
}

#[test]
fn reset_stats_clears_engine_counters() {
    let mut rig = Rig::new(HeaterConfig::default());
    rig.command(HeaterCommand::Start);
    rig.run_for(2000, 10);
    assert!(rig.app.session().stats().cycles > 0);
    rig.command(HeaterCommand::ResetStats);
    assert_eq!(rig.app.session().stats().cycles, 0);
    assert_eq!(rig.app.session().stats().measurements, 0);
}

// ── Persistence ───────────────────────────────────────────────

#[test]
fn config_auto_saves_after_quiet_period() {
    let mut rig = Rig::new(HeaterConfig::default());
    let store = MemoryConfigStore::new();

    rig.command(HeaterCommand::SetPower(60));
    rig.clock.advance(4999);
    assert!(!rig.app.auto_save_if_needed(&store));
    rig.clock.advance(1);
    assert!(rig.app.auto_save_if_needed(&store));

    assert!(!rig.app.is_config_dirty());
    assert_eq!(store.load().unwrap().duty_cycle.power_percent, 60);
    assert!(!rig.app.auto_save_if_needed(&store));
    assert_eq!(store.save_count(), 1);
}

#[test]
fn force_save_writes_immediately() {
    let mut rig = Rig::new(HeaterConfig::default());
    let store = MemoryConfigStore::new();
    rig.command(HeaterCommand::SetAutoStop(90_000));
    rig.app.force_save_if_dirty(&store);
    assert_eq!(store.load().unwrap().session.auto_stop_ms, 90_000);
    assert_eq!(rig.app.session().auto_stop_ms(), 90_000);
}
