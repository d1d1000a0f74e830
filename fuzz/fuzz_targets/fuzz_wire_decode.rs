#![no_main]
use fes_protocol::{ControlCommand, Message, StatusRecord};
use fes_traits::RawFrame;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&id, rest)) = data.split_first() else {
        return;
    };

    // Bus frames that decode must survive a re-encode unchanged.
    let frame = RawFrame::new(u32::from(id), rest);
    if let Ok(msg) = Message::decode(&frame) {
        assert_eq!(Message::decode(&msg.encode()), Ok(msg));
    }

    if let [a, b, ..] = *rest {
        let _ = ControlCommand::decode([a, b]);
    }

    if let Ok(record) = StatusRecord::decode(rest) {
        assert_eq!(StatusRecord::decode(&record.encode()), Ok(record));
    }
});
