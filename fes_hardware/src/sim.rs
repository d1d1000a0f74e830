//! Simulated collaborators for host runs and tests.
//!
//! Every simulated device hands out a cheap cloneable handle so a test (or the
//! simulation driver) can poke the "physical world" while the node owns the
//! device itself.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError, bounded};
use fes_traits::{
    BoxError, Bus, ChannelPair, ParamStore, PulsePort, RawFrame, Scale, TriggerInput, Wireless,
};

use crate::error::HwError;

/// Default depth of each direction of a simulated bus.
pub const DEFAULT_BUS_DEPTH: usize = 64;

// ── Bus ──────────────────────────────────────────────────────────────────────

/// One end of a point-to-point simulated bus.
pub struct SimBus {
    tx: Sender<RawFrame>,
    rx: Receiver<RawFrame>,
    up: Arc<AtomicBool>,
}

/// Handle that can cut or restore the simulated bus wire.
#[derive(Clone)]
pub struct BusLink {
    up: Arc<AtomicBool>,
}

impl BusLink {
    pub fn cut(&self) {
        self.up.store(false, Ordering::Relaxed);
    }

    pub fn restore(&self) {
        self.up.store(true, Ordering::Relaxed);
    }

    pub fn is_up(&self) -> bool {
        self.up.load(Ordering::Relaxed)
    }
}

impl SimBus {
    /// Two connected ends sharing one wire.
    pub fn pair(depth: usize) -> (SimBus, SimBus) {
        let (a_tx, b_rx) = bounded(depth);
        let (b_tx, a_rx) = bounded(depth);
        let up = Arc::new(AtomicBool::new(true));
        (
            SimBus {
                tx: a_tx,
                rx: a_rx,
                up: up.clone(),
            },
            SimBus {
                tx: b_tx,
                rx: b_rx,
                up,
            },
        )
    }

    pub fn link(&self) -> BusLink {
        BusLink {
            up: self.up.clone(),
        }
    }
}

impl Bus for SimBus {
    fn send(&mut self, frame: RawFrame) -> Result<(), BoxError> {
        // A cut wire loses frames silently, like an unacknowledged transmit.
        if !self.up.load(Ordering::Relaxed) {
            return Ok(());
        }
        match self.tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(Box::new(HwError::QueueFull)),
            Err(TrySendError::Disconnected(_)) => Err(Box::new(HwError::Disconnected)),
        }
    }

    fn try_recv(&mut self) -> Result<Option<RawFrame>, BoxError> {
        match self.rx.try_recv() {
            Ok(frame) if self.up.load(Ordering::Relaxed) => Ok(Some(frame)),
            // Drain whatever was in flight when the wire was cut.
            Ok(_) => Ok(None),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(Box::new(HwError::Disconnected)),
        }
    }

    fn is_available(&self) -> bool {
        self.up.load(Ordering::Relaxed)
    }
}

// ── Scale ────────────────────────────────────────────────────────────────────

/// Two-cell scale whose readings are set through a [`ScaleHandle`].
#[derive(Default)]
pub struct SimScale {
    state: Arc<ScaleState>,
}

#[derive(Default)]
struct ScaleState {
    left: AtomicI32,
    right: AtomicI32,
    failing: AtomicBool,
}

#[derive(Clone)]
pub struct ScaleHandle {
    state: Arc<ScaleState>,
}

impl SimScale {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> ScaleHandle {
        ScaleHandle {
            state: self.state.clone(),
        }
    }
}

impl ScaleHandle {
    pub fn set(&self, left: i32, right: i32) {
        self.state.left.store(left, Ordering::Relaxed);
        self.state.right.store(right, Ordering::Relaxed);
    }

    /// Make subsequent reads time out.
    pub fn set_failing(&self, failing: bool) {
        self.state.failing.store(failing, Ordering::Relaxed);
    }
}

impl Scale for SimScale {
    fn read(&mut self, _timeout: std::time::Duration) -> Result<(i32, i32), BoxError> {
        if self.state.failing.load(Ordering::Relaxed) {
            return Err(Box::new(HwError::Timeout));
        }
        Ok((
            self.state.left.load(Ordering::Relaxed),
            self.state.right.load(Ordering::Relaxed),
        ))
    }
}

// ── Wireless ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct WirelessState {
    connected: bool,
    inbox: VecDeque<[u8; 2]>,
    last_status: Option<Vec<u8>>,
    status_writes: u64,
}

/// Wireless link to a simulated phone.
#[derive(Default)]
pub struct SimWireless {
    state: Arc<Mutex<WirelessState>>,
}

/// The phone side of a [`SimWireless`].
#[derive(Clone)]
pub struct PhoneHandle {
    state: Arc<Mutex<WirelessState>>,
}

impl SimWireless {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phone(&self) -> PhoneHandle {
        PhoneHandle {
            state: self.state.clone(),
        }
    }
}

impl PhoneHandle {
    pub fn connect(&self) {
        if let Ok(mut s) = self.state.lock() {
            s.connected = true;
        }
    }

    /// Drops the link and any writes that were not yet picked up.
    pub fn disconnect(&self) {
        if let Ok(mut s) = self.state.lock() {
            s.connected = false;
            s.inbox.clear();
        }
    }

    /// Queue a control write; ignored while disconnected.
    pub fn write(&self, bytes: [u8; 2]) {
        if let Ok(mut s) = self.state.lock()
            && s.connected
        {
            s.inbox.push_back(bytes);
        }
    }

    pub fn last_status(&self) -> Option<Vec<u8>> {
        self.state.lock().ok().and_then(|s| s.last_status.clone())
    }

    pub fn status_writes(&self) -> u64 {
        self.state.lock().map(|s| s.status_writes).unwrap_or(0)
    }
}

impl Wireless for SimWireless {
    fn is_connected(&self) -> bool {
        self.state.lock().map(|s| s.connected).unwrap_or(false)
    }

    fn poll_control(&mut self) -> Result<Option<[u8; 2]>, BoxError> {
        let mut s = self
            .state
            .lock()
            .map_err(|_| HwError::Store("wireless state poisoned".into()))?;
        Ok(s.inbox.pop_front())
    }

    fn write_status(&mut self, bytes: &[u8]) -> Result<(), BoxError> {
        let mut s = self
            .state
            .lock()
            .map_err(|_| HwError::Store("wireless state poisoned".into()))?;
        if !s.connected {
            return Err(Box::new(HwError::Disconnected));
        }
        s.last_status = Some(bytes.to_vec());
        s.status_writes += 1;
        Ok(())
    }
}

// ── Trigger ──────────────────────────────────────────────────────────────────

/// External trigger line; clones share the same level.
#[derive(Clone, Default)]
pub struct SimTrigger {
    level: Arc<AtomicBool>,
}

impl SimTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, asserted: bool) {
        self.level.store(asserted, Ordering::Relaxed);
    }
}

impl TriggerInput for SimTrigger {
    fn is_asserted(&self) -> bool {
        self.level.load(Ordering::Relaxed)
    }
}

// ── Parameter store ──────────────────────────────────────────────────────────

/// In-memory parameter store; clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, u16>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<'a>(entries: impl IntoIterator<Item = (&'a str, u16)>) -> Self {
        let store = Self::new();
        if let Ok(mut map) = store.entries.lock() {
            map.extend(entries.into_iter().map(|(k, v)| (k.to_string(), v)));
        }
        store
    }

    pub fn snapshot(&self) -> HashMap<String, u16> {
        self.entries.lock().map(|m| m.clone()).unwrap_or_default()
    }

    /// Make every access fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    fn check(&self) -> Result<(), HwError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(HwError::Store("simulated store failure".into()));
        }
        Ok(())
    }
}

impl ParamStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<u16>, BoxError> {
        self.check()?;
        let map = self
            .entries
            .lock()
            .map_err(|_| HwError::Store("store poisoned".into()))?;
        Ok(map.get(key).copied())
    }

    fn put(&mut self, key: &str, value: u16) -> Result<(), BoxError> {
        self.check()?;
        let mut map = self
            .entries
            .lock()
            .map_err(|_| HwError::Store("store poisoned".into()))?;
        map.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), BoxError> {
        self.check()?;
        let mut map = self
            .entries
            .lock()
            .map_err(|_| HwError::Store("store poisoned".into()))?;
        map.remove(key);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), BoxError> {
        self.check()?;
        let mut map = self
            .entries
            .lock()
            .map_err(|_| HwError::Store("store poisoned".into()))?;
        map.clear();
        Ok(())
    }
}

// ── Pulse ports ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortEvent {
    Set(ChannelPair, bool),
    AllLow,
    Delay(u32),
}

/// Records every port call; clones share the log.
#[derive(Clone, Default)]
pub struct RecordingPort {
    events: Arc<Mutex<Vec<PortEvent>>>,
}

impl RecordingPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PortEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut e) = self.events.lock() {
            e.clear();
        }
    }

    fn push(&self, ev: PortEvent) {
        if let Ok(mut e) = self.events.lock() {
            e.push(ev);
        }
    }
}

impl PulsePort for RecordingPort {
    fn set_pair(&mut self, pair: ChannelPair, high: bool) {
        self.push(PortEvent::Set(pair, high));
    }
    fn all_low(&mut self) {
        self.push(PortEvent::AllLow);
    }
    fn delay_us(&mut self, us: u32) {
        self.push(PortEvent::Delay(us));
    }
}

/// Counts biphasic pulses and remembers the last width, without storing history.
#[derive(Clone, Default)]
pub struct PulseCounter {
    pulses: Arc<AtomicU64>,
    last_width_us: Arc<AtomicU64>,
    pending_width: Option<u32>,
    high_a: bool,
}

impl PulseCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pulses(&self) -> u64 {
        self.pulses.load(Ordering::Relaxed)
    }

    pub fn last_width_us(&self) -> u64 {
        self.last_width_us.load(Ordering::Relaxed)
    }
}

impl PulsePort for PulseCounter {
    fn set_pair(&mut self, pair: ChannelPair, high: bool) {
        if pair == ChannelPair::A {
            if high {
                self.high_a = true;
            } else if self.high_a {
                self.high_a = false;
                self.pulses.fetch_add(1, Ordering::Relaxed);
                if let Some(w) = self.pending_width.take() {
                    self.last_width_us.store(u64::from(w), Ordering::Relaxed);
                }
            }
        }
    }
    fn all_low(&mut self) {
        self.high_a = false;
        self.pending_width = None;
    }
    fn delay_us(&mut self, us: u32) {
        if self.high_a {
            self.pending_width = Some(us);
        }
    }
}
