//! Session parameters and the values captured during a session, as kept in
//! the parameter store.
//!
//! Missing keys and read failures fall back to the configured defaults; a
//! session must never stall because the store is empty or worn.

use fes_protocol::{ControlCode, GainCoefficient};
use fes_traits::ParamStore;
use tracing::{debug, warn};

use crate::hw_error::map_hw_error;
use crate::telemetry::SessionParams;

pub const KEY_RAMP_UP_INTERVAL: &str = "ramp_up_interval_ms";
pub const KEY_RAMP_UP_STEP: &str = "ramp_up_step";
pub const KEY_TRANSITION: &str = "transition_ms";
pub const KEY_RAMP_DOWN_INTERVAL: &str = "ramp_down_interval_ms";
pub const KEY_RAMP_DOWN_STEP: &str = "ramp_down_step";
pub const KEY_HOLD: &str = "hold_ms";
pub const KEY_GAIN: &str = "gain";
pub const KEY_BODY_WEIGHT: &str = "body_weight";
pub const KEY_MESE: &str = "mese";

/// Every key written by [`save`], in store order.
pub const PARAM_KEYS: [&str; 7] = [
    KEY_RAMP_UP_INTERVAL,
    KEY_RAMP_UP_STEP,
    KEY_TRANSITION,
    KEY_RAMP_DOWN_INTERVAL,
    KEY_RAMP_DOWN_STEP,
    KEY_HOLD,
    KEY_GAIN,
];

/// Value under `key`, or `default` when absent or unreadable.
pub fn read_or(store: &dyn ParamStore, key: &str, default: u16) -> u16 {
    match store.get(key) {
        Ok(Some(v)) => v,
        Ok(None) => {
            debug!(key, default, "no stored value; using default");
            default
        }
        Err(e) => {
            warn!(key, error = %map_hw_error(&*e), "store read failed; using default");
            default
        }
    }
}

/// Write one value; failures are logged and reported as `false`.
pub fn write(store: &mut dyn ParamStore, key: &str, value: u16) -> bool {
    match store.put(key, value) {
        Ok(()) => true,
        Err(e) => {
            warn!(key, value, error = %map_hw_error(&*e), "store write failed");
            false
        }
    }
}

fn step_u8(v: u16) -> u8 {
    u8::try_from(v).unwrap_or(u8::MAX).max(1)
}

pub fn load(store: &dyn ParamStore, defaults: &SessionParams) -> SessionParams {
    SessionParams {
        ramp_up_interval_ms: read_or(store, KEY_RAMP_UP_INTERVAL, defaults.ramp_up_interval_ms),
        ramp_up_step: step_u8(read_or(
            store,
            KEY_RAMP_UP_STEP,
            u16::from(defaults.ramp_up_step),
        )),
        transition_ms: read_or(store, KEY_TRANSITION, defaults.transition_ms),
        ramp_down_interval_ms: read_or(
            store,
            KEY_RAMP_DOWN_INTERVAL,
            defaults.ramp_down_interval_ms,
        ),
        ramp_down_step: step_u8(read_or(
            store,
            KEY_RAMP_DOWN_STEP,
            u16::from(defaults.ramp_down_step),
        )),
        hold_ms: read_or(store, KEY_HOLD, defaults.hold_ms),
        gain: GainCoefficient::from_percent(read_or(
            store,
            KEY_GAIN,
            u16::from(defaults.gain.percent()),
        )),
    }
}

/// Key/value pairs of `p` in store order.
pub fn entries(p: &SessionParams) -> [(&'static str, u16); 7] {
    [
        (KEY_RAMP_UP_INTERVAL, p.ramp_up_interval_ms),
        (KEY_RAMP_UP_STEP, u16::from(p.ramp_up_step)),
        (KEY_TRANSITION, p.transition_ms),
        (KEY_RAMP_DOWN_INTERVAL, p.ramp_down_interval_ms),
        (KEY_RAMP_DOWN_STEP, u16::from(p.ramp_down_step)),
        (KEY_HOLD, p.hold_ms),
        (KEY_GAIN, u16::from(p.gain.percent())),
    ]
}

/// Write every parameter. Returns whether all writes succeeded.
pub fn save(store: &mut dyn ParamStore, p: &SessionParams) -> bool {
    entries(p)
        .into_iter()
        .fold(true, |ok, (key, v)| write(store, key, v) && ok)
}

/// Drop the stored session parameters so the next load yields the defaults.
/// Captured body weight and MESE stay in the store.
pub fn reset(store: &mut dyn ParamStore) -> bool {
    PARAM_KEYS.into_iter().fold(true, |ok, key| match store.remove(key) {
        Ok(()) => ok,
        Err(e) => {
            warn!(key, error = %map_hw_error(&*e), "store remove failed");
            false
        }
    })
}

/// Apply one ParameterSetup edit. Returns false for codes that are not edits.
pub fn apply_edit(p: &mut SessionParams, code: ControlCode, payload: u8) -> bool {
    let v = u16::from(payload.max(1));
    match code {
        ControlCode::SetupRampUpInterval => p.ramp_up_interval_ms = v * 10,
        ControlCode::SetupRampUpStep => p.ramp_up_step = payload.max(1),
        ControlCode::SetupTransitionDuration => p.transition_ms = v * 100,
        ControlCode::SetupRampDownInterval => p.ramp_down_interval_ms = v * 10,
        ControlCode::SetupRampDownStep => p.ramp_down_step = payload.max(1),
        ControlCode::SetupHoldDuration => p.hold_ms = v * 100,
        ControlCode::SetupGain => p.gain = GainCoefficient::from_percent(u16::from(payload)),
        _ => return false,
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use fes_hardware::MemoryStore;
    use rstest::rstest;

    #[test]
    fn empty_store_yields_defaults() {
        let store = MemoryStore::new();
        assert_eq!(load(&store, &SessionParams::default()), SessionParams::default());
    }

    #[test]
    fn failing_store_yields_defaults() {
        let store = MemoryStore::with_entries([(KEY_HOLD, 700)]);
        store.set_failing(true);
        assert_eq!(load(&store, &SessionParams::default()).hold_ms, 2000);
    }

    #[test]
    fn save_then_load_restores_edits() {
        let mut store = MemoryStore::new();
        let mut p = SessionParams::default();
        p.hold_ms = 1200;
        p.gain = GainCoefficient::from_percent(75);
        assert!(save(&mut store, &p));
        assert_eq!(store.snapshot().len(), PARAM_KEYS.len());
        assert_eq!(load(&store, &SessionParams::default()), p);
    }

    #[test]
    fn reset_removes_only_session_parameters() {
        let mut store = MemoryStore::with_entries([(KEY_GAIN, 80), (KEY_BODY_WEIGHT, 64)]);
        assert!(reset(&mut store));
        let left = store.snapshot();
        assert_eq!(left.len(), 1);
        assert_eq!(left.get(KEY_BODY_WEIGHT), Some(&64));
        assert_eq!(load(&store, &SessionParams::default()), SessionParams::default());
    }

    #[test]
    fn reset_reports_store_failures() {
        let mut store = MemoryStore::with_entries([(KEY_GAIN, 80)]);
        store.set_failing(true);
        assert!(!reset(&mut store));
    }

    #[rstest]
    #[case(ControlCode::SetupRampUpInterval, 12, |p: &SessionParams| p.ramp_up_interval_ms == 120)]
    #[case(ControlCode::SetupRampUpInterval, 0, |p: &SessionParams| p.ramp_up_interval_ms == 10)]
    #[case(ControlCode::SetupRampUpStep, 0, |p: &SessionParams| p.ramp_up_step == 1)]
    #[case(ControlCode::SetupTransitionDuration, 30, |p: &SessionParams| p.transition_ms == 3000)]
    #[case(ControlCode::SetupRampDownInterval, 5, |p: &SessionParams| p.ramp_down_interval_ms == 50)]
    #[case(ControlCode::SetupRampDownStep, 3, |p: &SessionParams| p.ramp_down_step == 3)]
    #[case(ControlCode::SetupHoldDuration, 0, |p: &SessionParams| p.hold_ms == 100)]
    #[case(ControlCode::SetupGain, 50, |p: &SessionParams| p.gain.percent() == 50)]
    #[case(ControlCode::SetupGain, 250, |p: &SessionParams| p.gain.percent() == 100)]
    fn edits_scale_and_floor_payloads(
        #[case] code: ControlCode,
        #[case] payload: u8,
        #[case] check: fn(&SessionParams) -> bool,
    ) {
        let mut p = SessionParams::default();
        assert!(apply_edit(&mut p, code, payload));
        assert!(check(&p), "{code:?} {payload} -> {p:?}");
    }

    #[test]
    fn non_edit_codes_are_rejected() {
        let mut p = SessionParams::default();
        assert!(!apply_edit(&mut p, ControlCode::SetupSave, 1));
        assert_eq!(p, SessionParams::default());
    }
}
