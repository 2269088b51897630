//! Hardware trait seams.
//!
//! The display, keypad, UART, wake-up line and clock are external
//! collaborators; the core only ever talks to them through these traits.
//! The simulator and the test suite provide host implementations, the
//! device build provides the real ones.

/// Half-duplex single-wire UART used for the K-line.
///
/// `read` never blocks: it returns `None` when the receive buffer is empty.
/// All waiting is done by the session layer against a [`Clock`] deadline.
pub trait SerialPort {
    /// Configure and open the port at the given baud rate (8N1).
    fn begin(&mut self, baud: u16);
    /// Tear the port down. Called on every disconnect.
    fn end(&mut self);
    fn write(&mut self, byte: u8);
    /// True when at least one received byte is pending.
    fn available(&mut self) -> bool;
    fn read(&mut self) -> Option<u8>;
    /// Drop anything still queued in either direction.
    fn flush(&mut self);
}

/// Character LCD, 16x2 assumed.
pub trait CharDisplay {
    fn begin(&mut self, cols: u8, rows: u8);
    fn clear(&mut self);
    fn set_cursor(&mut self, col: u8, row: u8);
    fn print(&mut self, text: &str);
}

/// Analog keypad ladder. One conversion, 0..1023.
pub trait Keypad {
    fn read_raw(&mut self) -> u16;
}

/// 5-baud wake-up hook.
///
/// Some ECUs require the address to be bit-banged at 5 Bd (7O1) before the
/// UART handshake. Whether a given ECU needs it is left to the integrator;
/// sessions that do not need it use [`NoWakeUp`].
pub trait WakeUp {
    fn wake(&mut self, addr: u8);
}

/// Default no-op wake-up.
#[derive(Default)]
pub struct NoWakeUp;

impl WakeUp for NoWakeUp {
    fn wake(&mut self, _addr: u8) {}
}

/// Monotonic millisecond clock plus blocking delay.
///
/// `&self` receivers keep the clock trivially shareable between the session
/// and the orchestrator; implementations use interior mutability where they
/// need state.
pub trait Clock {
    fn now_ms(&self) -> u32;
    fn delay_ms(&self, ms: u32);
}
