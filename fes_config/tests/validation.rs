use fes_config::load_toml;
use rstest::rstest;

#[test]
fn empty_file_takes_firmware_defaults() {
    let cfg = load_toml("").expect("parse TOML");
    cfg.validate().expect("defaults are valid");
    assert_eq!(cfg.stimulator.bus_timeout_ms, 1000);
    assert_eq!(cfg.stimulator.pulse_rate_hz, 35);
    assert_eq!(cfg.gateway.bus_period_ms, 15);
    assert_eq!(cfg.gateway.status_period_ms, 120);
    assert_eq!(cfg.session.gain, 50);
    assert_eq!(cfg.store.path, "fes_params.toml");
}

#[test]
fn partial_sections_keep_other_defaults() {
    let toml = r#"
[stimulator]
bus_timeout_ms = 500

[session]
hold_ms = 3000
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid");
    assert_eq!(cfg.stimulator.bus_timeout_ms, 500);
    assert_eq!(cfg.stimulator.failsafe_decay_interval_ms, 50);
    assert_eq!(cfg.session.hold_ms, 3000);
    assert_eq!(cfg.session.transition_ms, 5000);
}

#[rstest]
#[case("[stimulator]\nbus_timeout_ms = 0", "bus_timeout_ms must be >= 1")]
#[case("[stimulator]\npulse_rate_hz = 0", "pulse_rate_hz must be in 1..=1000")]
#[case("[stimulator]\nfeedback_period_ms = 1000", "feedback_period_ms must be < bus_timeout_ms")]
#[case("[stimulator]\nfailsafe_decay_step = 0", "failsafe_decay_step must be >= 1")]
#[case("[gateway]\nbus_period_ms = 0", "bus_period_ms must be >= 1")]
#[case("[gateway]\nweight_class_size = 0", "weight_class_size must be >= 1")]
#[case("[gateway]\nceiling_percent = 90", "ceiling_percent must be >= 100")]
#[case("[gateway]\nstart_weight_percent = 150", "start_weight_percent must be <= 100")]
#[case("[session]\ngain = 101", "session.gain must be in 0..=100")]
#[case("[session]\nramp_down_step = 0", "ramp steps must be >= 1")]
#[case("[store]\npath = \"  \"", "store.path must not be empty")]
#[case("[logging]\nrotation = \"weekly\"", "logging.rotation must be one of")]
#[case("[pins]\npair_a = [17, 40]", "pins must be BCM numbers")]
#[case("[pins]\npair_a = [17, 27]\npair_b = [27, 22]", "pins must be distinct")]
fn rejects_invalid_values(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    assert!(
        format!("{err}").contains(needle),
        "expected '{needle}' in '{err}'"
    );
}

#[test]
fn unknown_types_fail_to_parse() {
    assert!(load_toml("[gateway]\nbus_period_ms = \"fast\"").is_err());
}
