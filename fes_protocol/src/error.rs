use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unknown message kind 0x{0:02X}")]
    UnknownKind(u32),
    #[error("frame too short: expected {expected} bytes, got {got}")]
    ShortFrame { expected: usize, got: usize },
    #[error("unknown control code 0x{0:02X}")]
    UnknownControlCode(u8),
    #[error("status record too short: expected {expected} bytes, got {got}")]
    ShortRecord { expected: usize, got: usize },
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
