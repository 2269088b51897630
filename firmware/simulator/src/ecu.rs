//! Virtual instrument-cluster ECU.
//!
//! Implements the peer side of the KWP1281 byte discipline on a simulated
//! K-line: it complement-acknowledges every tester byte except the last of
//! a block, transmits its own blocks byte-by-byte waiting for the tester's
//! inverted echoes, and answers requests with generated measurement data.
//! Measurements follow slow sine waves of the virtual clock so the display
//! has something alive to show.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use kdash_common::hal::SerialPort;
use log::debug;

/// One step of an outgoing transmission.
#[derive(Clone, Copy)]
enum TxStep {
    /// Byte without acknowledgment (last of a block, handshake sync).
    Plain(u8),
    /// Byte the tester must echo inverted before the next one goes out.
    Acked(u8),
    /// Inter-block silence: the line reads empty for a couple of polls so
    /// consecutive unprompted blocks do not bleed into one receive.
    Gap,
}

struct EcuState {
    /// Bytes the tester can read.
    rx: VecDeque<u8>,
    /// Remaining bytes of the block currently being transmitted.
    pending: VecDeque<TxStep>,
    /// Echo the ECU is waiting for before transmitting on.
    expect: Option<u8>,
    /// Tester block under reception.
    block: Vec<u8>,
    block_total: usize,
    /// Polls left before the next pending byte may appear.
    gap: u8,
    /// Session ended by an end-session block.
    offline: bool,
    /// Stored trouble codes, cleared by a clear request.
    dtcs: Vec<(u16, u8)>,
}

/// Simulated ECU at address 0x17 behind a [`SerialPort`].
///
/// Clones share the same line, so the driving test bench can keep a handle
/// while the session owns another.
#[derive(Clone)]
pub struct VirtualEcu {
    state: Rc<RefCell<EcuState>>,
    /// Virtual milliseconds, shared with the clock; drives the waveforms.
    time: Rc<Cell<u32>>,
}

impl VirtualEcu {
    pub fn new(time: Rc<Cell<u32>>) -> Self {
        Self {
            state: Rc::new(RefCell::new(EcuState {
                rx: VecDeque::new(),
                pending: VecDeque::new(),
                expect: None,
                block: Vec::new(),
                block_total: 0,
                gap: 0,
                offline: false,
                dtcs: vec![(0x0123, 0x01), (0x0456, 0x80)],
            })),
            time,
        }
    }

    fn seconds(&self) -> f32 {
        self.time.get() as f32 / 1000.0
    }

    fn wave(&self, base: f32, amplitude: f32, rate: f32) -> f32 {
        base + amplitude * micromath::F32(self.seconds() * rate).sin().0
    }

    /// Queue a block: every byte acked except the trailing end marker.
    fn queue_block(&self, bytes: &[u8]) {
        let mut s = self.state.borrow_mut();
        for (i, &b) in bytes.iter().enumerate() {
            if i < bytes.len() - 1 {
                s.pending.push_back(TxStep::Acked(b));
            } else {
                s.pending.push_back(TxStep::Plain(b));
            }
        }
    }

    /// Emit pending bytes until one requires a tester echo or a gap.
    fn pump(&self) {
        let mut s = self.state.borrow_mut();
        while let Some(step) = s.pending.pop_front() {
            match step {
                TxStep::Plain(b) => s.rx.push_back(b),
                TxStep::Acked(b) => {
                    s.rx.push_back(b);
                    s.expect = Some(b ^ 0xFF);
                    break;
                }
                TxStep::Gap => {
                    s.gap = 2;
                    break;
                }
            }
        }
    }

    fn on_write(&self, byte: u8) {
        let completed = {
            let mut s = self.state.borrow_mut();
            if s.offline {
                return;
            }

            if let Some(expected) = s.expect {
                if byte == expected {
                    s.expect = None;
                }
                return;
            }

            if s.block_total == 0 {
                s.block.clear();
                s.block_total = byte as usize + 1;
            }
            s.block.push(byte);

            if s.block.len() < s.block_total {
                // Complement-ack every tester byte except the last
                s.rx.push_back(byte ^ 0xFF);
                return;
            }

            s.block_total = 0;
            std::mem::take(&mut s.block)
        };

        self.on_block(&completed);
    }

    /// Answer one complete tester block.
    fn on_block(&self, block: &[u8]) {
        let counter = block[1].wrapping_add(1);
        let title = block[2];
        debug!("ecu: block title 0x{:02X}, counter {}", title, block[1]);

        match title {
            // Keep-alive, and the stream-terminating ACK of a DTC read
            0x09 => self.queue_block(&[0x03, counter, 0x09, 0x03]),
            // Measurement group request
            0x29 => {
                let group = block[3];
                let reply = self.group_reply(counter, group);
                self.queue_block(&reply);
            }
            // Trouble code request
            0x07 => {
                let reply = self.dtc_reply(counter);
                self.queue_block(&reply);
            }
            // Clear trouble codes
            0x05 => {
                self.state.borrow_mut().dtcs.clear();
                self.queue_block(&[0x03, counter, 0x09, 0x03]);
            }
            // End of session: drop the line
            0x06 => {
                let mut s = self.state.borrow_mut();
                s.offline = true;
                s.rx.clear();
                s.pending.clear();
            }
            _ => self.queue_block(&[0x03, counter, 0x09, 0x03]),
        }
    }

    /// Build a `0xE7` measurement reply for one group.
    fn group_reply(&self, counter: u8, group: u8) -> Vec<u8> {
        let tuples: [(u8, u8, u8); 4] = match group {
            1 => {
                // Speed (k=7, 0.01*a*b), rpm (k=1, 0.2*a*b), oil pressure
                // flag and ECU minutes as raw k=8 slots
                let speed = self.wave(80.0, 40.0, 0.31).max(0.0) as u8;
                let rpm = self.wave(2600.0, 1400.0, 0.47).max(0.0);
                [
                    (7, 100, speed),
                    (1, 100, (rpm / 20.0) as u8),
                    (8, 10, 1),
                    (8, 10, 214),
                ]
            }
            2 => {
                // Odometer (k=36), fuel level (k=19), sender resistance
                // (k=8) and ambient temperature (k=5)
                let fuel = self.wave(42.0, 3.0, 0.05).max(0.0) as u8;
                [
                    (36, 98, 76),
                    (19, 100, fuel),
                    (8, 10, 87),
                    (5, 10, 121),
                ]
            }
            3 => {
                // Coolant (k=5), oil level flag (k=8), oil temperature (k=5)
                let coolant = self.wave(88.0, 6.0, 0.11);
                let oil = self.wave(95.0, 10.0, 0.07);
                [
                    (5, 10, (coolant + 100.0) as u8),
                    (8, 10, 1),
                    (5, 10, (oil + 100.0) as u8),
                    (8, 10, 0),
                ]
            }
            _ => {
                // Higher groups answer raw slots so the experimental view
                // has data for any selection
                [
                    (8, group, 1),
                    (8, group, 2),
                    (8, group, 3),
                    (8, group, 4),
                ]
            }
        };

        let mut reply = vec![0, counter, 0xE7];
        for (k, a, b) in tuples {
            reply.extend_from_slice(&[k, a, b]);
        }
        reply.push(0x03);
        reply[0] = (reply.len() - 1) as u8;
        reply
    }

    /// Build a `0xFC` trouble-code reply, or the no-codes sentinel.
    fn dtc_reply(&self, counter: u8) -> Vec<u8> {
        let dtcs = self.state.borrow().dtcs.clone();
        let mut reply = vec![0, counter, 0xFC];
        if dtcs.is_empty() {
            reply.extend_from_slice(&[0xFF, 0xFF, 0x88]);
        } else {
            for (code, status) in dtcs {
                let [hi, lo] = code.to_be_bytes();
                reply.extend_from_slice(&[hi, lo, status]);
            }
        }
        reply.push(0x03);
        reply[0] = (reply.len() - 1) as u8;
        reply
    }
}

impl SerialPort for VirtualEcu {
    fn begin(&mut self, baud: u16) {
        debug!("ecu: line opened at {} Bd", baud);
        {
            let mut s = self.state.borrow_mut();
            s.offline = false;
            s.rx.clear();
            s.pending.clear();
            s.expect = None;
            s.block.clear();
            s.block_total = 0;
        }
        // Wake-up reply: sync and key bytes, then the first ACK block
        {
            let mut s = self.state.borrow_mut();
            s.pending.push_back(TxStep::Plain(0x55));
            s.pending.push_back(TxStep::Plain(0x01));
            s.pending.push_back(TxStep::Acked(0x8A));
            s.pending.push_back(TxStep::Gap);
        }
        self.queue_block(&[0x03, 0x01, 0x09, 0x03]);
        self.pump();
    }

    fn end(&mut self) {
        let mut s = self.state.borrow_mut();
        s.rx.clear();
        s.pending.clear();
        s.expect = None;
        s.block_total = 0;
    }

    fn write(&mut self, byte: u8) {
        self.on_write(byte);
    }

    fn available(&mut self) -> bool {
        {
            let mut s = self.state.borrow_mut();
            if s.gap > 0 {
                s.gap -= 1;
                return !s.rx.is_empty();
            }
        }
        if self.state.borrow().expect.is_none() {
            self.pump();
        }
        !self.state.borrow().rx.is_empty()
    }

    fn read(&mut self) -> Option<u8> {
        self.state.borrow_mut().rx.pop_front()
    }

    fn flush(&mut self) {
        self.state.borrow_mut().rx.clear();
    }
}
