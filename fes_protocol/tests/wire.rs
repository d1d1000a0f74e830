use fes_protocol::{
    ControlCode, ControlCommand, GainCoefficient, LoopMode, Message, MessageKind, PhaseTelemetry,
    ProtocolError, STATUS_RECORD_LEN, SessionParamsEcho, StatusFlags, StatusRecord,
};
use fes_traits::RawFrame;
use proptest::prelude::*;
use rstest::rstest;

#[rstest]
#[case(MessageKind::PeerResetNotification, 0x01)]
#[case(MessageKind::PeerRestartedNotification, 0x02)]
#[case(MessageKind::WeightTotal, 0x51)]
#[case(MessageKind::ResidualWeightTotal, 0x52)]
#[case(MessageKind::SetRequestedPulseWidth, 0x61)]
#[case(MessageKind::PulseWidthFeedback, 0x6A)]
#[case(MessageKind::IntensityFloor, 0x71)]
#[case(MessageKind::IntensityCeiling, 0x72)]
#[case(MessageKind::Setpoint, 0x81)]
#[case(MessageKind::ModeFlag, 0x82)]
#[case(MessageKind::GainCoefficient, 0xA1)]
fn message_kind_ids_are_stable(#[case] kind: MessageKind, #[case] id: u32) {
    assert_eq!(u32::from(kind.id()), id);
    assert_eq!(MessageKind::try_from(id), Ok(kind));
}

#[test]
fn unknown_kind_is_reported() {
    let frame = RawFrame::new(0x7F, &[0, 1]);
    match Message::decode(&frame) {
        Err(ProtocolError::UnknownKind(0x7F)) => {}
        other => panic!("expected UnknownKind, got {other:?}"),
    }
}

#[test]
fn short_frame_is_reported() {
    let frame = RawFrame::new(0x61, &[0x01]);
    match Message::decode(&frame) {
        Err(ProtocolError::ShortFrame {
            expected: 2,
            got: 1,
        }) => {}
        other => panic!("expected ShortFrame, got {other:?}"),
    }
}

#[test]
fn gain_control_payload_is_forwarded_unchanged() {
    let cmd = ControlCommand::decode([ControlCode::SetupGain as u8, 50]).unwrap();
    let gain = GainCoefficient::from_percent(u16::from(cmd.payload));
    assert!((gain.as_fraction() - 0.50).abs() < f32::EPSILON);

    let frame = Message::gain(gain).encode();
    let back = Message::decode(&frame).unwrap();
    assert_eq!(back.kind, MessageKind::GainCoefficient);
    assert_eq!(back.payload, 50);
}

#[test]
fn mode_flag_carries_loop_mode() {
    let msg = Message::decode(&Message::mode(LoopMode::Closed).encode()).unwrap();
    assert_eq!(LoopMode::from_payload(msg.payload), LoopMode::Closed);
}

#[rstest]
#[case([0x00, 0], ControlCode::ResetFirmware)]
#[case([0x11, 0], ControlCode::WeightRegister)]
#[case([0x21, 0], ControlCode::IntensityIncreaseOnce)]
#[case([0x38, 0], ControlCode::OperationEmergencyStop)]
#[case([0x6F, 0], ControlCode::SetupComplete)]
fn control_codes_decode(#[case] bytes: [u8; 2], #[case] code: ControlCode) {
    assert_eq!(ControlCommand::decode(bytes).unwrap().code, code);
}

#[test]
fn unknown_control_code_is_rejected() {
    match ControlCommand::decode([0x99, 1]) {
        Err(ProtocolError::UnknownControlCode(0x99)) => {}
        other => panic!("expected UnknownControlCode, got {other:?}"),
    }
}

#[test]
fn status_record_layout_matches_offsets() {
    let mut phase = PhaseTelemetry::new(6);
    phase.put_u16(1, 1500).put_u8(3, 2);
    let rec = StatusRecord {
        pulse_width_feedback: 0x0102,
        weight_left: 30,
        weight_right: 31,
        body_weight: 61,
        mese: 120,
        mese_max: 144,
        setpoint: 30,
        flags: StatusFlags::new(true, true),
        params: SessionParamsEcho {
            ramp_up_interval_ms: 100,
            ramp_up_step: 1,
            transition_ms: 5000,
            ramp_down_interval_ms: 50,
            ramp_down_step: 2,
            hold_ms: 2000,
            gain_percent: 50,
        },
        phase,
    };
    let bytes = rec.encode();
    assert_eq!(bytes.len(), STATUS_RECORD_LEN);
    assert_eq!(&bytes[0..2], &[0x02, 0x01]);
    assert_eq!(bytes[2], 30);
    assert_eq!(bytes[12], 0b11);
    assert_eq!(&bytes[16..18], &5000u16.to_le_bytes());
    assert_eq!(bytes[20], 2);
    assert_eq!(bytes[23], 50);
    assert_eq!(&bytes[24..30], &[6, 0xDC, 0x05, 2, 0, 0]);
    assert_eq!(StatusRecord::decode(&bytes).unwrap(), rec);
}

#[test]
fn short_status_record_is_rejected() {
    assert!(matches!(
        StatusRecord::decode(&[0u8; 10]),
        Err(ProtocolError::ShortRecord { got: 10, .. })
    ));
}

proptest! {
    #[test]
    fn decoding_arbitrary_frames_never_panics(id in any::<u32>(), data in proptest::collection::vec(any::<u8>(), 0..9)) {
        let frame = RawFrame::new(id, &data);
        if let Ok(msg) = Message::decode(&frame) {
            prop_assert_eq!(u32::from(msg.kind.id()), id);
            prop_assert_eq!(msg.payload, u16::from_be_bytes([data[0], data[1]]));
        }
    }

    #[test]
    fn gain_is_always_within_percent_range(p in any::<u16>()) {
        let g = GainCoefficient::from_percent(p);
        prop_assert!(g.percent() <= 100);
        prop_assert!((0.0..=1.0).contains(&g.as_fraction()));
    }
}
