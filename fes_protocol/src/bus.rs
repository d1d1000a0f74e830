//! Node-to-node bus messages.
//!
//! A frame carries the kind byte as its identifier and a big-endian u16
//! payload in the first two data bytes.

use fes_traits::RawFrame;

use crate::error::{ProtocolError, Result};

/// Payload bytes carried by every bus frame.
pub const PAYLOAD_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    /// Asks the receiving node to restart.
    PeerResetNotification = 0x01,
    /// The gateway announces that it has just booted.
    PeerRestartedNotification = 0x02,
    WeightTotal = 0x51,
    ResidualWeightTotal = 0x52,
    SetRequestedPulseWidth = 0x61,
    PulseWidthFeedback = 0x6A,
    /// MESE
    IntensityFloor = 0x71,
    /// MESE_max
    IntensityCeiling = 0x72,
    Setpoint = 0x81,
    ModeFlag = 0x82,
    GainCoefficient = 0xA1,
}

impl MessageKind {
    pub const ALL: [MessageKind; 11] = [
        MessageKind::PeerResetNotification,
        MessageKind::PeerRestartedNotification,
        MessageKind::WeightTotal,
        MessageKind::ResidualWeightTotal,
        MessageKind::SetRequestedPulseWidth,
        MessageKind::PulseWidthFeedback,
        MessageKind::IntensityFloor,
        MessageKind::IntensityCeiling,
        MessageKind::Setpoint,
        MessageKind::ModeFlag,
        MessageKind::GainCoefficient,
    ];

    #[inline]
    pub fn id(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u32> for MessageKind {
    type Error = ProtocolError;

    fn try_from(id: u32) -> Result<Self> {
        MessageKind::ALL
            .iter()
            .copied()
            .find(|k| u32::from(k.id()) == id)
            .ok_or(ProtocolError::UnknownKind(id))
    }
}

/// Stimulator operating mode as carried by `ModeFlag`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    Open,
    Closed,
}

impl LoopMode {
    pub fn from_payload(payload: u16) -> Self {
        if payload == 0 {
            LoopMode::Open
        } else {
            LoopMode::Closed
        }
    }

    pub fn payload(self) -> u16 {
        match self {
            LoopMode::Open => 0,
            LoopMode::Closed => 1,
        }
    }
}

/// Closed-loop gain, carried on the wire as an integer percentage 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GainCoefficient(u8);

impl GainCoefficient {
    pub const MAX_PERCENT: u8 = 100;

    /// Values above 100 saturate.
    pub fn from_percent(percent: u16) -> Self {
        Self(percent.min(u16::from(Self::MAX_PERCENT)) as u8)
    }

    #[inline]
    pub fn percent(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn as_fraction(self) -> f32 {
        f32::from(self.0) / 100.0
    }
}

impl Default for GainCoefficient {
    fn default() -> Self {
        Self(50)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub payload: u16,
}

impl Message {
    #[inline]
    pub fn new(kind: MessageKind, payload: u16) -> Self {
        Self { kind, payload }
    }

    pub fn mode(mode: LoopMode) -> Self {
        Self::new(MessageKind::ModeFlag, mode.payload())
    }

    pub fn gain(gain: GainCoefficient) -> Self {
        Self::new(MessageKind::GainCoefficient, u16::from(gain.percent()))
    }

    pub fn encode(&self) -> RawFrame {
        RawFrame::new(u32::from(self.kind.id()), &self.payload.to_be_bytes())
    }

    pub fn decode(frame: &RawFrame) -> Result<Self> {
        let kind = MessageKind::try_from(frame.id)?;
        let bytes = frame.bytes();
        if bytes.len() < PAYLOAD_LEN {
            return Err(ProtocolError::ShortFrame {
                expected: PAYLOAD_LEN,
                got: bytes.len(),
            });
        }
        Ok(Self {
            kind,
            payload: u16::from_be_bytes([bytes[0], bytes[1]]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_is_big_endian() {
        let f = Message::new(MessageKind::WeightTotal, 0x1234).encode();
        assert_eq!(f.id, 0x51);
        assert_eq!(f.bytes(), &[0x12, 0x34]);
    }

    #[test]
    fn gain_saturates_at_one_hundred() {
        assert_eq!(GainCoefficient::from_percent(250).percent(), 100);
        assert_eq!(GainCoefficient::from_percent(50).as_fraction(), 0.5);
    }

    #[test]
    fn any_nonzero_mode_payload_means_closed() {
        assert_eq!(LoopMode::from_payload(0), LoopMode::Open);
        assert_eq!(LoopMode::from_payload(7), LoopMode::Closed);
    }
}
