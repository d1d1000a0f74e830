use std::sync::Arc;

use fes_core::config::StimulatorCfg;
use fes_core::stimulator::{StimulatorNode, StimulatorState};
use fes_core::status::StepOutcome;
use fes_hardware::{PulseCounter, SimBus};
use fes_protocol::{LoopMode, Message, MessageKind};
use fes_traits::{Bus, ManualClock};
use proptest::prelude::*;
use rstest::{fixture, rstest};

struct Harness {
    node: StimulatorNode,
    gateway: SimBus,
    clock: ManualClock,
    pulses: PulseCounter,
}

impl Harness {
    fn send(&mut self, kind: MessageKind, payload: u16) {
        self.gateway
            .send(Message::new(kind, payload).encode())
            .unwrap();
    }

    /// Advance `ms` milliseconds one tick at a time.
    fn run_ms(&mut self, ms: u64) {
        for _ in 0..ms {
            self.clock.advance_ms(1);
            self.node.step().unwrap();
        }
    }

    /// Like `run_ms` but keeps the bus alive with a requested width.
    fn run_fed_ms(&mut self, ms: u64, requested: u16) {
        for i in 0..ms {
            if i % 15 == 0 {
                self.send(MessageKind::SetRequestedPulseWidth, requested);
            }
            self.clock.advance_ms(1);
            self.node.step().unwrap();
        }
    }

    fn feedback(&mut self) -> Vec<u16> {
        let mut out = Vec::new();
        while let Some(f) = self.gateway.try_recv().unwrap() {
            let m = Message::decode(&f).unwrap();
            if m.kind == MessageKind::PulseWidthFeedback {
                out.push(m.payload);
            }
        }
        out
    }

    fn enter_closed_loop(&mut self, mese: u16, mese_max: u16) {
        self.send(MessageKind::IntensityFloor, mese);
        self.send(MessageKind::IntensityCeiling, mese_max);
        self.send(MessageKind::GainCoefficient, 50);
        self.send(MessageKind::ResidualWeightTotal, 10);
        self.send(MessageKind::WeightTotal, 10);
        self.gateway
            .send(Message::mode(LoopMode::Closed).encode())
            .unwrap();
        self.run_ms(1);
        assert_eq!(self.node.state(), Some(StimulatorState::ClosedLoop));
    }
}

fn make_harness() -> Harness {
    let (node_end, gateway) = SimBus::pair(256);
    let clock = ManualClock::new();
    let pulses = PulseCounter::new();
    let node = StimulatorNode::new(
        Box::new(node_end),
        Box::new(pulses.clone()),
        Arc::new(clock.clone()),
        StimulatorCfg::default(),
    )
    .unwrap();
    Harness {
        node,
        gateway,
        clock,
        pulses,
    }
}

#[fixture]
fn harness() -> Harness {
    make_harness()
}

#[rstest]
fn boots_in_open_loop_with_zero_width(mut harness: Harness) {
    harness.run_ms(10);
    assert_eq!(harness.node.state(), Some(StimulatorState::OpenLoop));
    assert_eq!(harness.node.resolved_width(), 0);
    assert_eq!(harness.pulses.pulses(), 0);
}

#[rstest]
fn open_loop_follows_requested_width_and_reports_it(mut harness: Harness) {
    harness.run_fed_ms(100, 40);
    assert_eq!(harness.node.resolved_width(), 40);
    let fb = harness.feedback();
    // one report every 5 ms
    assert!(fb.len() >= 18, "only {} feedback frames", fb.len());
    assert_eq!(fb.last(), Some(&40));
    assert!(harness.pulses.pulses() >= 3);
    assert_eq!(harness.pulses.last_width_us(), 40);
}

#[rstest]
fn bus_silence_enters_failsafe_and_decays(mut harness: Harness) {
    harness.send(MessageKind::SetRequestedPulseWidth, 40);
    // the frame is picked up on the first tick
    harness.run_ms(1);
    harness.run_ms(999);
    assert_eq!(harness.node.state(), Some(StimulatorState::OpenLoop));
    assert_eq!(harness.node.resolved_width(), 40);

    harness.run_ms(1);
    assert_eq!(harness.node.state(), Some(StimulatorState::Failsafe));

    harness.run_ms(150);
    assert_eq!(harness.node.resolved_width(), 37);
}

#[rstest]
fn failsafe_reports_the_decaying_width(mut harness: Harness) {
    harness.send(MessageKind::SetRequestedPulseWidth, 3);
    harness.run_ms(1001);
    assert_eq!(harness.node.state(), Some(StimulatorState::Failsafe));
    harness.feedback();

    harness.run_ms(260);
    let fb = harness.feedback();
    assert!(fb.len() >= 50, "only {} feedback frames", fb.len());
    assert_eq!(fb.first(), Some(&3));
    assert!(fb.windows(2).all(|w| w[1] <= w[0]), "{fb:?}");
    assert_eq!(fb.last(), Some(&0));
}

#[rstest]
fn failsafe_ignores_setpoint_commands(mut harness: Harness) {
    harness.send(MessageKind::SetRequestedPulseWidth, 20);
    harness.run_ms(1001);
    assert_eq!(harness.node.state(), Some(StimulatorState::Failsafe));

    let mut last = harness.node.resolved_width();
    for _ in 0..20 {
        harness.send(MessageKind::SetRequestedPulseWidth, 200);
        harness.gateway
            .send(Message::mode(LoopMode::Closed).encode())
            .unwrap();
        harness.run_ms(25);
        let now = harness.node.resolved_width();
        assert!(now <= last, "width rose from {last} to {now}");
        last = now;
    }
    assert_eq!(harness.node.state(), Some(StimulatorState::Failsafe));
    assert_eq!(last, 10);
}

#[rstest]
fn closed_loop_stays_within_limits_and_never_regresses(mut harness: Harness) {
    harness.enter_closed_loop(100, 120);
    harness.run_ms(5);
    assert_eq!(harness.node.resolved_width(), 100);

    harness.send(MessageKind::WeightTotal, 40);
    harness.run_ms(5);
    assert_eq!(harness.node.resolved_width(), 115);

    harness.send(MessageKind::WeightTotal, 0);
    harness.run_ms(5);
    assert_eq!(harness.node.resolved_width(), 115);

    harness.send(MessageKind::WeightTotal, 500);
    harness.run_ms(5);
    assert_eq!(harness.node.resolved_width(), 120);
}

#[rstest]
fn closed_loop_without_ceiling_outputs_nothing(mut harness: Harness) {
    harness.enter_closed_loop(100, 0);
    harness.send(MessageKind::WeightTotal, 80);
    harness.run_ms(5);
    assert_eq!(harness.node.resolved_width(), 0);
}

#[rstest]
fn open_mode_flag_leaves_closed_loop(mut harness: Harness) {
    harness.enter_closed_loop(100, 120);
    harness.send(MessageKind::SetRequestedPulseWidth, 90);
    harness
        .gateway
        .send(Message::mode(LoopMode::Open).encode())
        .unwrap();
    harness.run_ms(2);
    assert_eq!(harness.node.state(), Some(StimulatorState::OpenLoop));
    assert_eq!(harness.node.resolved_width(), 90);
}

#[rstest]
fn gateway_restart_in_closed_loop_drains_then_restarts(mut harness: Harness) {
    harness.enter_closed_loop(12, 20);
    harness.run_ms(5);
    assert_eq!(harness.node.resolved_width(), 12);

    harness.send(MessageKind::PeerRestartedNotification, 0);
    harness.run_ms(1);
    assert_eq!(harness.node.state(), Some(StimulatorState::Failsafe));

    // 12 steps of 50 ms to reach zero, then the restart
    let mut restarted = false;
    for _ in 0..700 {
        harness.clock.advance_ms(1);
        if harness.node.step().unwrap() == StepOutcome::Restarted {
            restarted = true;
            break;
        }
    }
    assert!(restarted);
    assert_eq!(harness.node.restarts(), 1);
    assert_eq!(harness.node.state(), Some(StimulatorState::OpenLoop));
    assert_eq!(harness.node.telemetry().mese, 0);
}

#[rstest]
fn reset_request_in_open_loop_restarts_immediately(mut harness: Harness) {
    harness.send(MessageKind::IntensityFloor, 33);
    harness.send(MessageKind::PeerResetNotification, 0);
    harness.send(MessageKind::IntensityFloor, 44);
    harness.clock.advance_ms(1);
    assert_eq!(harness.node.step().unwrap(), StepOutcome::Restarted);
    assert_eq!(harness.node.telemetry().mese, 0);
    // frames after the reset are still on the bus for the rebooted node
    harness.run_ms(1);
    assert_eq!(harness.node.telemetry().mese, 44);
}

#[rstest]
fn failsafe_without_reset_holds_at_zero(mut harness: Harness) {
    harness.send(MessageKind::SetRequestedPulseWidth, 3);
    harness.run_ms(1000 + 4 * 50);
    assert_eq!(harness.node.state(), Some(StimulatorState::Failsafe));
    assert_eq!(harness.node.resolved_width(), 0);
    harness.run_ms(500);
    assert_eq!(harness.node.restarts(), 0);
}

#[rstest]
fn unknown_frames_are_ignored(mut harness: Harness) {
    harness
        .gateway
        .send(fes_traits::RawFrame::new(0x7E, &[1, 2]))
        .unwrap();
    harness.send(MessageKind::SetRequestedPulseWidth, 25);
    harness.run_ms(2);
    assert_eq!(harness.node.resolved_width(), 25);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]
    #[test]
    fn failsafe_decay_is_one_per_interval(start in 0u16..120, k in 0u64..150) {
        let mut h = make_harness();
        h.send(MessageKind::SetRequestedPulseWidth, start);
        h.run_ms(1001);
        prop_assert_eq!(h.node.state(), Some(StimulatorState::Failsafe));
        h.run_ms(k * 50);
        prop_assert_eq!(h.node.resolved_width(), start.saturating_sub(k as u16));
    }
}
