//! Integration tests for the edges → AppService → ValueSink pipeline.
//!
//! These run on the host (x86_64) and drive the service through its
//! ports with mock adapters and the simulated GPIO edge source.

use super::mock_hw::{
    leak_queue, pm_frame, pm_frame_bad_checksum, BrokenEdgeSource, CountingDelay, LogSink,
    MockNvs, MockSensor, NoDelay, RecordingValues, ScriptedUart,
};

use pm1003ph::adapters::console::ConsoleCommands;
use pm1003ph::adapters::gpio_edge::GpioEdgeSource;
use pm1003ph::adapters::hardware::HardwareAdapter;
use pm1003ph::app::commands::AppCommand;
use pm1003ph::app::events::AppEvent;
use pm1003ph::app::ports::{EdgeSource, SensorPort};
use pm1003ph::app::service::AppService;
use pm1003ph::config::{ChecksumPolicy, PulsePolarity, SensorConfig};
use pm1003ph::error::{Error, PwmError, SetupError, UartError};
use pm1003ph::sensors::edge::EDGE_QUEUE_CAP;
use pm1003ph::sensors::Source;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 0.01
}

/// Service started at t=0 with both paths and a simulated PWM pin.
fn make_app(config: SensorConfig) -> (AppService, GpioEdgeSource, LogSink) {
    let mut app = AppService::new(config, leak_queue()).unwrap();
    let mut pin = GpioEdgeSource::new(6);
    let mut sink = LogSink::new();
    app.start(0, Some(&mut pin), &mut sink).unwrap();
    (app, pin, sink)
}

/// Active-low pulse on the simulated pin.
fn low_pulse(pin: &GpioEdgeSource, from_ms: u64, to_ms: u64) {
    assert!(pin.sim_fire(false, from_ms));
    assert!(pin.sim_fire(true, to_ms));
}

// ── Arbitration ───────────────────────────────────────────────

#[test]
fn uart_value_wins_over_pwm() {
    let (mut app, pin, mut sink) = make_app(SensorConfig::default());
    low_pulse(&pin, 10_000, 10_510);

    let mut hw = MockSensor::new(Some(Ok(42)));
    let mut out = RecordingValues::default();
    let r = app.tick(30_000, &mut hw, &mut out, &mut sink).unwrap();

    assert_eq!(r.source, Source::Uart);
    assert_eq!(out.published, vec![42.0]);

    let telem = sink
        .events
        .iter()
        .find_map(|e| match e {
            AppEvent::Telemetry(t) => Some(t.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(telem.uart_ug_m3, Some(42.0));
    assert!(approx(telem.pwm_ug_m3.unwrap(), 17.0));
    assert_eq!(telem.history_len, 1);
}

#[test]
fn pwm_value_published_when_uart_fails() {
    let (mut app, pin, mut sink) = make_app(SensorConfig::default());
    low_pulse(&pin, 10_000, 10_510);

    let mut hw = MockSensor::new(Some(Err(UartError::Timeout { available: 3 })));
    let mut out = RecordingValues::default();
    let r = app.tick(30_000, &mut hw, &mut out, &mut sink).unwrap();

    assert_eq!(r.source, Source::Pwm);
    assert_eq!(out.published.len(), 1);
    assert!(approx(out.published[0], 17.0));
    assert!(sink.events.contains(&AppEvent::UartUnavailable(
        UartError::Timeout { available: 3 }
    )));
}

#[test]
fn nothing_published_when_both_paths_unavailable() {
    let (mut app, pin, mut sink) = make_app(SensorConfig::default());
    low_pulse(&pin, 1_000, 1_200);

    let mut hw = MockSensor::unwired();
    let mut out = RecordingValues::default();
    assert_eq!(app.tick(10_000, &mut hw, &mut out, &mut sink), None);

    assert!(out.published.is_empty());
    assert!(sink.events.contains(&AppEvent::PwmUnavailable(
        PwmError::WarmingUp {
            remaining_ms: 20_000
        }
    )));
    assert_eq!(app.last_reading(), None);
}

#[test]
fn history_survives_across_ticks() {
    let (mut app, pin, mut sink) = make_app(SensorConfig::default());
    low_pulse(&pin, 29_000, 30_500);

    let mut hw = MockSensor::unwired();
    let mut out = RecordingValues::default();
    app.tick(31_000, &mut hw, &mut out, &mut sink);
    app.tick(31_000, &mut hw, &mut out, &mut sink);

    assert_eq!(out.published.len(), 2);
    assert_eq!(out.published[0], out.published[1]);
    assert!(approx(out.published[0], 50.0));
    assert_eq!(app.pulses().len(), 1);
}

#[test]
fn uart_disabled_is_never_polled() {
    let cfg = SensorConfig {
        enable_uart: false,
        ..Default::default()
    };
    let (mut app, _pin, mut sink) = make_app(cfg);

    let mut hw = MockSensor::new(Some(Ok(42)));
    let mut out = RecordingValues::default();
    app.tick(40_000, &mut hw, &mut out, &mut sink);

    assert_eq!(hw.polls, 0);
    assert!(out.published.is_empty());
}

// ── Setup ─────────────────────────────────────────────────────

#[test]
fn pwm_enabled_without_edge_source_is_fatal() {
    let mut app = AppService::new(SensorConfig::default(), leak_queue()).unwrap();
    let mut sink = LogSink::new();

    assert_eq!(
        app.start(0, None, &mut sink),
        Err(SetupError::NoEdgeSource)
    );
    assert!(sink.events.is_empty());
}

#[test]
fn isr_install_failure_propagates() {
    let mut app = AppService::new(SensorConfig::default(), leak_queue()).unwrap();
    let mut src = BrokenEdgeSource;
    let mut sink = LogSink::new();

    assert_eq!(
        app.start(0, Some(&mut src), &mut sink),
        Err(SetupError::IsrInstall(-1))
    );
}

#[test]
fn uart_only_starts_without_edge_source() {
    let cfg = SensorConfig {
        enable_pwm: false,
        ..Default::default()
    };
    let mut app = AppService::new(cfg, leak_queue()).unwrap();
    let mut sink = LogSink::new();
    app.start(0, None, &mut sink).unwrap();
    assert_eq!(
        sink.events[0],
        AppEvent::Started {
            uart: true,
            pwm: false
        }
    );

    let mut hw = MockSensor::new(Some(Ok(100)));
    let mut out = RecordingValues::default();
    app.tick(1_000, &mut hw, &mut out, &mut sink);
    assert_eq!(out.published, vec![100.0]);
}

#[test]
fn edges_before_start_are_discarded() {
    let queue = leak_queue();
    let mut pin = GpioEdgeSource::new(6);
    pin.register(queue).unwrap();
    low_pulse(&pin, 100, 5_000);
    assert_eq!(queue.len(), 2);

    // A second registration on the same pin is refused, so wire the service
    // through a fresh source that shares nothing with `pin`.
    let mut app = AppService::new(SensorConfig::default(), queue).unwrap();
    let mut other = GpioEdgeSource::new(7);
    let mut sink = LogSink::new();
    app.start(10_000, Some(&mut other), &mut sink).unwrap();

    assert!(queue.is_empty());
    assert!(app.pulses().is_empty());
    assert_eq!(app.pulses().measurement_start_ms(), 10_000);
}

// ── Edge queue overflow ───────────────────────────────────────

#[test]
fn dropped_edges_are_reported_once() {
    let (mut app, pin, mut sink) = make_app(SensorConfig::default());
    let total = EDGE_QUEUE_CAP as u64 + 44;
    for i in 0..total {
        pin.sim_fire(i % 2 == 1, i * 10);
    }

    let handled = app.process_edges(&mut sink);
    assert_eq!(handled, EDGE_QUEUE_CAP - 1);
    assert!(sink.events.contains(&AppEvent::EdgesDropped(45)));

    app.process_edges(&mut sink);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::EdgesDropped(_))), 1);
}

// ── Commands ──────────────────────────────────────────────────

#[test]
fn enabling_pwm_at_runtime_needs_edge_source() {
    let cfg = SensorConfig {
        enable_pwm: false,
        ..Default::default()
    };
    let mut app = AppService::new(cfg.clone(), leak_queue()).unwrap();
    let mut sink = LogSink::new();
    app.start(0, None, &mut sink).unwrap();

    let mut hw = MockSensor::unwired();
    let res = app.handle_command(AppCommand::UpdateConfig(SensorConfig::default()), &mut hw);
    assert_eq!(res, Err(Error::Setup(SetupError::NoEdgeSource)));
    assert_eq!(app.config(), &cfg);
    assert!(hw.applied.is_empty());
}

#[test]
fn invalid_update_is_rejected() {
    let (mut app, _pin, _sink) = make_app(SensorConfig::default());
    let mut hw = MockSensor::unwired();
    let bad = SensorConfig {
        full_scale_ug_m3: -5.0,
        ..Default::default()
    };
    assert!(matches!(
        app.handle_command(AppCommand::UpdateConfig(bad), &mut hw),
        Err(Error::Config(_))
    ));
    assert!(!app.is_config_dirty());
}

#[test]
fn config_update_reaches_hardware_and_is_saved_once() {
    let (mut app, _pin, _sink) = make_app(SensorConfig::default());
    let mut hw = MockSensor::unwired();
    let nvs = MockNvs::default();

    let new_cfg = SensorConfig {
        uart_timeout_ms: 80,
        pulse_polarity: PulsePolarity::ActiveHigh,
        ..Default::default()
    };
    app.handle_command(AppCommand::UpdateConfig(new_cfg.clone()), &mut hw)
        .unwrap();

    assert_eq!(hw.applied, vec![new_cfg.clone()]);
    assert!(app.is_config_dirty());
    assert!(app.save_if_dirty(&nvs));
    assert!(!app.save_if_dirty(&nvs));
    assert_eq!(nvs.saves.get(), 1);
    assert_eq!(nvs.stored.borrow().as_ref(), Some(&new_cfg));
}

#[test]
fn window_and_full_scale_update_rescales_pwm_value() {
    let (mut app, pin, mut sink) = make_app(SensorConfig::default());
    let mut hw = MockSensor::unwired();
    let mut out = RecordingValues::default();

    low_pulse(&pin, 20_000, 21_000);
    let r = app.tick(30_000, &mut hw, &mut out, &mut sink).unwrap();
    assert!(approx(r.value, 33.33));

    let cfg = SensorConfig {
        measurement_window_ms: 10_000,
        full_scale_ug_m3: 500.0,
        ..Default::default()
    };
    app.handle_command(AppCommand::UpdateConfig(cfg), &mut hw).unwrap();

    let r = app.tick(30_500, &mut hw, &mut out, &mut sink).unwrap();
    assert_eq!(r.source, Source::Pwm);
    assert!(approx(r.value, 50.0));
    assert_eq!(out.published.len(), 2);
    assert!(approx(out.published[1], 50.0));
}

#[test]
fn console_update_is_applied_and_persisted() {
    let (mut app, pin, mut sink) = make_app(SensorConfig::default());
    let mut hw = MockSensor::unwired();
    let mut out = RecordingValues::default();
    let nvs = MockNvs::default();
    let (mut console, tx) = ConsoleCommands::with_channel();

    tx.send("set window 10000".into()).unwrap();
    tx.send("set full_scale 500".into()).unwrap();
    assert_eq!(console.poll(&mut app, &mut hw), 2);

    low_pulse(&pin, 20_000, 21_000);
    let r = app.tick(30_000, &mut hw, &mut out, &mut sink).unwrap();
    assert!(approx(r.value, 50.0));

    assert!(app.save_if_dirty(&nvs));
    let stored = nvs.stored.borrow().clone().unwrap();
    assert_eq!(stored.measurement_window_ms, 10_000);
    assert!(approx(stored.full_scale_ug_m3, 500.0));

    tx.send("clear".into()).unwrap();
    assert_eq!(console.poll(&mut app, &mut hw), 1);
    assert!(app.pulses().is_empty());
    assert!(!app.save_if_dirty(&nvs));
}

#[test]
fn clear_history_empties_pulses() {
    let (mut app, pin, mut sink) = make_app(SensorConfig::default());
    low_pulse(&pin, 1_000, 1_500);
    app.process_edges(&mut sink);
    assert_eq!(app.pulses().len(), 1);

    let mut hw = MockSensor::unwired();
    app.handle_command(AppCommand::ClearHistory, &mut hw).unwrap();
    assert!(app.pulses().is_empty());
}

// ── Full adapter stack ────────────────────────────────────────

#[test]
fn uart_frame_flows_through_hardware_adapter() {
    let (mut app, _pin, mut sink) = make_app(SensorConfig::default());
    let transport = ScriptedUart::new([pm_frame(100), vec![0x42, 0x4D]]);
    let mut hw = HardwareAdapter::with_transport(transport, NoDelay, app.config());
    let mut out = RecordingValues::default();

    let r = app.tick(1_000, &mut hw, &mut out, &mut sink).unwrap();
    assert_eq!(r.source, Source::Uart);
    assert_eq!(out.published, vec![100.0]);

    // Second reply is truncated: UART times out and PWM is still warming up.
    assert_eq!(app.tick(2_000, &mut hw, &mut out, &mut sink), None);
    assert_eq!(out.published.len(), 1);
    assert!(sink.events.contains(&AppEvent::UartUnavailable(
        UartError::Timeout { available: 2 }
    )));
}

#[test]
fn sum_checksum_policy_rejects_bad_frame() {
    let cfg = SensorConfig {
        checksum_policy: ChecksumPolicy::Sum,
        ..Default::default()
    };
    let transport = ScriptedUart::new([pm_frame_bad_checksum(100), pm_frame(100)]);
    let mut hw = HardwareAdapter::with_transport(transport, NoDelay, &cfg);

    assert_eq!(
        hw.poll_uart(),
        Some(Err(UartError::Checksum {
            expected: 150,
            actual: 151
        }))
    );
    assert_eq!(hw.poll_uart(), Some(Ok(100)));
}

#[test]
fn checksum_policy_follows_runtime_update() {
    let (mut app, _pin, mut sink) = make_app(SensorConfig::default());
    let transport =
        ScriptedUart::new([pm_frame_bad_checksum(100), pm_frame_bad_checksum(120)]);
    let mut hw = HardwareAdapter::with_transport(transport, NoDelay, app.config());
    let mut out = RecordingValues::default();

    // Ignore: the bad checksum is tolerated.
    let r = app.tick(1_000, &mut hw, &mut out, &mut sink).unwrap();
    assert!(approx(r.value, 100.0));

    let cfg = SensorConfig {
        checksum_policy: ChecksumPolicy::Sum,
        ..Default::default()
    };
    app.handle_command(AppCommand::UpdateConfig(cfg), &mut hw).unwrap();

    assert_eq!(app.tick(2_000, &mut hw, &mut out, &mut sink), None);
    assert_eq!(out.published, vec![100.0]);
    assert!(sink.events.contains(&AppEvent::UartUnavailable(
        UartError::Checksum {
            expected: 0xAA,
            actual: 0xAB
        }
    )));
}

#[test]
fn uart_timeout_setting_bounds_the_wait() {
    let cfg = SensorConfig {
        uart_timeout_ms: 120,
        ..Default::default()
    };
    let mut hw =
        HardwareAdapter::with_transport(ScriptedUart::new([]), CountingDelay::default(), &cfg);
    assert_eq!(hw.poll_uart(), Some(Err(UartError::Timeout { available: 0 })));

    let (_, delay) = hw.release().unwrap();
    assert_eq!(delay.total_ns, 120 * 1_000_000);
}
