//! Collaborator traits at the hardware seam of both nodes.
//!
//! The bus transceiver, the wireless transport, the load cells, the external
//! trigger input, the parameter store and the stimulation GPIO all sit behind
//! these traits so the control core stays host-testable.

pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

/// Error type crossing every collaborator boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Raw bus datagram as handed to/from the transceiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFrame {
    pub id: u32,
    pub len: u8,
    pub data: [u8; 8],
}

impl RawFrame {
    /// Build a frame from up to eight data bytes; extra bytes are dropped.
    pub fn new(id: u32, bytes: &[u8]) -> Self {
        let mut data = [0u8; 8];
        let len = bytes.len().min(8);
        data[..len].copy_from_slice(&bytes[..len]);
        Self {
            id,
            len: len as u8,
            data,
        }
    }

    /// The valid data bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data[..usize::from(self.len.min(8))]
    }
}

/// Shared low-bandwidth bus between the two nodes.
pub trait Bus {
    fn send(&mut self, frame: RawFrame) -> Result<(), BoxError>;
    /// Next pending inbound frame, if any. Never blocks.
    fn try_recv(&mut self) -> Result<Option<RawFrame>, BoxError>;
    fn is_available(&self) -> bool;
}

/// Short-range wireless link to the phone.
pub trait Wireless {
    fn is_connected(&self) -> bool;
    /// Next pending two-byte control write, if any. Never blocks.
    fn poll_control(&mut self) -> Result<Option<[u8; 2]>, BoxError>;
    /// Publish a packed status record.
    fn write_status(&mut self, bytes: &[u8]) -> Result<(), BoxError>;
}

pub trait Scale {
    /// Sample both load cells, returning (left, right) in kilograms.
    fn read(&mut self, timeout: std::time::Duration) -> Result<(i32, i32), BoxError>;
}

/// External trigger input (e.g. a footswitch or EEG box line).
pub trait TriggerInput {
    fn is_asserted(&self) -> bool;
}

/// Persisted key/value parameter store.
pub trait ParamStore {
    /// `Ok(None)` when the key is absent.
    fn get(&self, key: &str) -> Result<Option<u16>, BoxError>;
    fn put(&mut self, key: &str, value: u16) -> Result<(), BoxError>;
    /// Removing an absent key is not an error.
    fn remove(&mut self, key: &str) -> Result<(), BoxError>;
    fn clear(&mut self) -> Result<(), BoxError>;
}

/// One of the two stimulation channel pairs of the biphasic output stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelPair {
    A,
    B,
}

/// Low-level pulse output. `delay_us` is the only blocking primitive
/// in the control core and must busy-wait with microsecond precision.
pub trait PulsePort {
    fn set_pair(&mut self, pair: ChannelPair, high: bool);
    fn all_low(&mut self);
    fn delay_us(&mut self, us: u32);
}

impl<T: Bus + ?Sized> Bus for Box<T> {
    fn send(&mut self, frame: RawFrame) -> Result<(), BoxError> {
        (**self).send(frame)
    }
    fn try_recv(&mut self) -> Result<Option<RawFrame>, BoxError> {
        (**self).try_recv()
    }
    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}

impl<T: PulsePort + ?Sized> PulsePort for Box<T> {
    fn set_pair(&mut self, pair: ChannelPair, high: bool) {
        (**self).set_pair(pair, high);
    }
    fn all_low(&mut self) {
        (**self).all_low();
    }
    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us);
    }
}
