use std::time::Duration;

use fes_hardware::error::HwError;
use fes_hardware::{
    MemoryStore, PortEvent, PulseCounter, RecordingPort, SimBus, SimScale, SimTrigger, SimWireless,
};
use fes_traits::{Bus, ChannelPair, ParamStore, PulsePort, RawFrame, Scale, TriggerInput, Wireless};
use rstest::rstest;

#[test]
fn bus_pair_delivers_in_order() {
    let (mut a, mut b) = SimBus::pair(8);
    a.send(RawFrame::new(0x51, &[0, 1])).unwrap();
    a.send(RawFrame::new(0x52, &[0, 2])).unwrap();
    assert_eq!(b.try_recv().unwrap().map(|f| f.id), Some(0x51));
    assert_eq!(b.try_recv().unwrap().map(|f| f.id), Some(0x52));
    assert_eq!(b.try_recv().unwrap(), None);
}

#[test]
fn full_bus_reports_queue_full() {
    let (mut a, _b) = SimBus::pair(1);
    a.send(RawFrame::new(0x51, &[0, 1])).unwrap();
    let err = a.send(RawFrame::new(0x51, &[0, 1])).unwrap_err();
    match err.downcast_ref::<HwError>() {
        Some(HwError::QueueFull) => {}
        other => panic!("expected QueueFull, got {other:?}"),
    }
}

#[test]
fn cut_bus_drops_frames_both_ways() {
    let (mut a, mut b) = SimBus::pair(8);
    let link = a.link();
    a.send(RawFrame::new(0x51, &[0, 1])).unwrap();
    link.cut();
    assert!(!b.is_available());
    assert_eq!(b.try_recv().unwrap(), None);
    a.send(RawFrame::new(0x51, &[0, 1])).unwrap();
    link.restore();
    assert_eq!(b.try_recv().unwrap(), None);
}

#[test]
fn scale_handle_drives_readings_and_failures() {
    let mut scale = SimScale::new();
    let h = scale.handle();
    h.set(31, -2);
    assert_eq!(scale.read(Duration::from_millis(5)).unwrap(), (31, -2));
    h.set_failing(true);
    assert!(scale.read(Duration::from_millis(5)).is_err());
}

#[test]
fn wireless_queues_only_while_connected() {
    let mut w = SimWireless::new();
    let phone = w.phone();
    phone.write([0x6F, 0]);
    assert_eq!(w.poll_control().unwrap(), None);

    phone.connect();
    phone.write([0x6F, 0]);
    assert!(w.is_connected());
    assert_eq!(w.poll_control().unwrap(), Some([0x6F, 0]));

    w.write_status(&[1, 2, 3]).unwrap();
    assert_eq!(phone.last_status(), Some(vec![1, 2, 3]));
    assert_eq!(phone.status_writes(), 1);

    phone.disconnect();
    assert!(w.write_status(&[1]).is_err());
}

#[test]
fn trigger_clones_share_level() {
    let t = SimTrigger::new();
    let observer = t.clone();
    t.set(true);
    assert!(observer.is_asserted());
}

#[rstest]
#[case(false)]
#[case(true)]
fn memory_store_round_trips_or_fails(#[case] failing: bool) {
    let mut store = MemoryStore::with_entries([("gain", 40)]);
    store.set_failing(failing);
    let got = store.get("gain");
    if failing {
        assert!(got.is_err());
    } else {
        assert_eq!(got.unwrap(), Some(40));
        store.put("hold_ms", 2000).unwrap();
        store.clear().unwrap();
        assert!(store.snapshot().is_empty());
    }
}

#[test]
fn recording_port_logs_calls() {
    let mut port = RecordingPort::new();
    let observer = port.clone();
    port.set_pair(ChannelPair::A, true);
    port.delay_us(12);
    port.all_low();
    assert_eq!(
        observer.events(),
        vec![
            PortEvent::Set(ChannelPair::A, true),
            PortEvent::Delay(12),
            PortEvent::AllLow
        ]
    );
}

#[test]
fn pulse_counter_counts_a_phase_pulses() {
    let mut port = PulseCounter::new();
    let observer = port.clone();
    for _ in 0..3 {
        port.set_pair(ChannelPair::A, true);
        port.delay_us(40);
        port.set_pair(ChannelPair::A, false);
        port.delay_us(4);
        port.set_pair(ChannelPair::B, true);
        port.delay_us(40);
        port.set_pair(ChannelPair::B, false);
        port.delay_us(4);
    }
    assert_eq!(observer.pulses(), 3);
    assert_eq!(observer.last_width_us(), 40);
}
