//! KWP1281 session over a half-duplex K-line UART.
//!
//! The link is symmetric: every byte one side sends (except the last byte
//! of a block) is acknowledged by the peer echoing its complement
//! (`byte ^ 0xFF`) within the timeout. Blocks carry a monotone 8-bit
//! counter both sides keep in lockstep; it resets on disconnect and
//! resynchronizes on specific init-phase patterns.
//!
//! All waits are bounded polls against the [`Clock`]; there is no async and
//! nothing here blocks longer than the configured timeout.

use log::{debug, info, warn};

use super::blocks::{BlockTitle, BLOCK_END, HANDSHAKE, NO_DTC_SENTINEL};
use super::decode;
use super::{KwpError, KwpResult};
use crate::config::{ADDR_ENGINE, KWP_TIMEOUT_MS};
use crate::dtc::DtcStore;
use crate::hal::{Clock, SerialPort, WakeUp};
use crate::signals::{FieldId, SignalModel, EXP_SLOTS};

/// Receive buffer size; no supported block comes close.
const BLOCK_BUF: usize = 64;

/// One KWP1281 session on a K-line.
///
/// Owns the UART exclusively; the block counter is only ever mutated here.
pub struct Kwp1281Session<S, C, W> {
    port: S,
    clock: C,
    wake: W,
    baud: u16,
    ecu_addr: u8,
    block_counter: u8,
    connected: bool,
    com_error: bool,
    timeout_ms: u32,
}

impl<S: SerialPort, C: Clock, W: WakeUp> Kwp1281Session<S, C, W> {
    pub fn new(port: S, clock: C, wake: W) -> Self {
        Self {
            port,
            clock,
            wake,
            baud: 0,
            ecu_addr: 0,
            block_counter: 0,
            connected: false,
            com_error: false,
            timeout_ms: KWP_TIMEOUT_MS,
        }
    }

    pub fn set_config(&mut self, baud: u16, ecu_addr: u8) {
        self.baud = baud;
        self.ecu_addr = ecu_addr;
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    #[inline]
    pub fn block_counter(&self) -> u8 {
        self.block_counter
    }

    #[inline]
    pub fn baud(&self) -> u16 {
        self.baud
    }

    /// True when a received byte is waiting in the UART. Debug screen only.
    pub fn rx_pending(&mut self) -> bool {
        self.port.available()
    }

    /// Establish the session: wake-up, handshake, controller id blocks.
    pub fn connect(&mut self) -> KwpResult<()> {
        if self.baud == 0 {
            self.baud = 9600;
        }
        info!(
            "connecting to ECU 0x{:02X} at {} Bd",
            self.ecu_addr, self.baud
        );

        self.wake.wake(self.ecu_addr);
        self.port.begin(self.baud);

        // Handshake bytes; only the last one is complement-acknowledged
        let mut buf = [0u8; BLOCK_BUF];
        self.receive_block(&mut buf, 3, Some(3), false, true)?;
        if buf[..3] != HANDSHAKE {
            warn!(
                "bad handshake: {:02X} {:02X} {:02X}",
                buf[0], buf[1], buf[2]
            );
            return Err(KwpError::BadHandshake);
        }

        self.read_connect_blocks()?;

        self.connected = true;
        info!("session established, counter {}", self.block_counter);
        Ok(())
    }

    /// Tear the link down and reset the counter.
    pub fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        self.port.end();
        self.connected = false;
        self.block_counter = 0;
        info!("disconnected");
    }

    /// Keep-alive: exchange one ACK pair.
    pub fn keep_alive(&mut self) -> KwpResult<()> {
        self.send_ack_block()?;
        self.receive_ack_block()
    }

    /// Request one measurement group and decode the reply into the model.
    pub fn read_group(&mut self, group: u8, signals: &mut SignalModel) -> KwpResult<()> {
        signals.prepare_group_read();

        let req = [
            0x04,
            self.block_counter,
            BlockTitle::ReadGroup.into(),
            group,
            BLOCK_END,
        ];
        self.send_block(&req)?;

        let mut buf = [0u8; BLOCK_BUF];
        let size = self.receive_block(&mut buf, BLOCK_BUF, None, true, false)?;

        if self.com_error {
            return Err(self.recovery_exchange());
        }

        if BlockTitle::from(buf[2]) != BlockTitle::GroupReply {
            if self.baud == 9600 && self.ecu_addr == ADDR_ENGINE {
                match buf[2] {
                    // Raw engine frame: RPM / coolant / voltage at fixed
                    // offsets instead of (k, a, b) tuples
                    0x02 => {
                        if group == 1 {
                            let rpm = 0.2 * buf[4] as f32 * buf[5] as f32;
                            signals.apply_routed(FieldId::EngineRpm, rpm);
                            let coolant = buf[7] as f32 * (buf[8] as f32 - 100.0) * 0.1;
                            signals.apply_routed(FieldId::CoolantTemp, coolant);
                            let volt = 0.001 * buf[10] as f32 * buf[11] as f32;
                            signals.apply_routed(FieldId::Voltage, volt);
                        }
                        return Ok(());
                    }
                    // Valid "no data for this group" reply
                    0xF4 => return Ok(()),
                    other => {
                        warn!("unusable group reply title 0x{:02X}", other);
                        self.clock.delay_ms(2000);
                        return Err(KwpError::UnexpectedTitle);
                    }
                }
            }
            // Other ECUs answer with vendor titles; decode the payload as-is
        }

        signals.set_experimental_group(group);

        let count = size.saturating_sub(4) / 3;
        for idx in 0..count.min(EXP_SLOTS) {
            let k = buf[3 + idx * 3];
            let a = buf[3 + idx * 3 + 1];
            let b = buf[3 + idx * 3 + 2];

            match decode::decode_measurement(k, a, b) {
                Some(d) => {
                    signals.set_experimental_slot(idx, k, d.value, d.unit);
                    if let Some(field) = decode::route(self.ecu_addr, group, idx as u8) {
                        signals.apply_routed(field, d.value);
                    }
                }
                None => {
                    // Slot keeps its reset state; raw tuple only in the trace
                    debug!("unknown formula k={} a={} b={}", k, a, b);
                    signals.set_experimental_slot(idx, k, -1.0, "ERR");
                }
            }
        }

        Ok(())
    }

    /// Read all stored trouble codes. Returns how many were stored.
    pub fn read_dtc_codes(&mut self, store: &mut DtcStore) -> KwpResult<u8> {
        let req = [
            0x03,
            self.block_counter,
            BlockTitle::GetDtc.into(),
            BLOCK_END,
        ];
        self.send_block(&req)?;

        store.reset();
        let mut count: u8 = 0;

        loop {
            let mut buf = [0u8; BLOCK_BUF];
            let size = self.receive_block(&mut buf, BLOCK_BUF, None, false, false)?;

            match BlockTitle::from(buf[2]) {
                // A plain ACK terminates the DTC stream
                BlockTitle::Ack => break,
                BlockTitle::DtcReply => {
                    let tuples = size.saturating_sub(4) / 3;
                    for i in 0..tuples {
                        let hi = buf[3 + 3 * i];
                        let lo = buf[3 + 3 * i + 1];
                        let status = buf[3 + 3 * i + 2];

                        if [hi, lo, status] == NO_DTC_SENTINEL {
                            continue;
                        }
                        store.set(count as usize, u16::from_be_bytes([hi, lo]), status);
                        count += 1;
                    }
                    self.send_ack_block()?;
                }
                _ => {
                    warn!("unexpected title 0x{:02X} in DTC stream", buf[2]);
                    return Err(KwpError::UnexpectedTitle);
                }
            }
        }

        info!("{} trouble codes read", count);
        Ok(count)
    }

    /// Ask the ECU to clear its stored trouble codes.
    pub fn clear_dtc_codes(&mut self) -> KwpResult<()> {
        let req = [
            0x03,
            self.block_counter,
            BlockTitle::ClearDtc.into(),
            BLOCK_END,
        ];
        self.send_block(&req)?;

        let mut buf = [0u8; BLOCK_BUF];
        self.receive_block(&mut buf, BLOCK_BUF, None, false, false)?;
        if BlockTitle::from(buf[2]) != BlockTitle::Ack {
            return Err(KwpError::UnexpectedTitle);
        }
        Ok(())
    }

    /// Send the end-session block. No reply is expected.
    pub fn end_session(&mut self) -> KwpResult<()> {
        let req = [
            0x03,
            self.block_counter,
            BlockTitle::Quit.into(),
            BLOCK_END,
        ];
        self.send_block(&req)
    }

    // =========================================================================
    // Block primitives
    // =========================================================================

    #[inline]
    fn bump_counter(&mut self) {
        self.block_counter = self.block_counter.wrapping_add(1);
    }

    /// TX line turnaround time. Old ECUs at low rates need more headroom.
    fn turnaround_ms(&self) -> u32 {
        match self.baud {
            1200 | 2400 | 4800 => 15,
            9600 => 10,
            _ => 5,
        }
    }

    fn write_byte(&mut self, data: u8) {
        self.clock.delay_ms(self.turnaround_ms());
        self.port.write(data);
    }

    /// Poll for one byte until the per-read timeout expires.
    fn read_byte(&mut self) -> KwpResult<u8> {
        let deadline = self.clock.now_ms().wrapping_add(self.timeout_ms);
        while !self.port.available() {
            if self.clock.now_ms() >= deadline {
                return Err(KwpError::Timeout);
            }
        }
        self.port.read().ok_or(KwpError::Timeout)
    }

    /// Transmit a block, checking the peer's complement echo after every
    /// byte except the last.
    fn send_block(&mut self, block: &[u8]) -> KwpResult<()> {
        debug!("TX {:02X?}", block);
        let n = block.len();

        for (i, &data) in block.iter().enumerate() {
            self.write_byte(data);

            if i < n - 1 {
                match self.read_byte() {
                    Ok(echo) => {
                        if echo != (data ^ 0xFF) {
                            warn!(
                                "complement mismatch: sent {:02X}, got {:02X}",
                                data, echo
                            );
                            return Err(KwpError::ComplementMismatch);
                        }
                    }
                    Err(KwpError::Timeout)
                        if n >= 4
                            && block[2] == u8::from(BlockTitle::Quit)
                            && block[3] == BLOCK_END =>
                    {
                        // End-session: the ECU may drop the line before the
                        // last ack arrives
                        return Ok(());
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        self.bump_counter();
        Ok(())
    }

    /// Receive one block.
    ///
    /// With `preset == None` the first byte announces the size and every
    /// byte except the last is complement-acknowledged; with a preset size
    /// only the final byte is. `group_reply` arms the communication-error
    /// detection, `init_phase` the low-baud startup noise tolerance.
    fn receive_block(
        &mut self,
        buf: &mut [u8; BLOCK_BUF],
        maxsize: usize,
        preset: Option<usize>,
        group_reply: bool,
        init_phase: bool,
    ) -> KwpResult<usize> {
        let mut ack_each = preset.is_none();
        let mut size = preset.unwrap_or(0);
        if size > maxsize {
            return Err(KwpError::BlockTooLarge);
        }

        let mut recv: usize = 0;
        let mut deadline = self.clock.now_ms().wrapping_add(self.timeout_ms);
        let mut sync_0f: u8 = 0;
        let low_baud = matches!(self.baud, 1200 | 2400 | 4800);

        while recv == 0 || recv != size {
            while self.port.available() {
                let data = self.port.read().ok_or(KwpError::Timeout)?;
                if recv < maxsize {
                    buf[recv] = data;
                }
                recv += 1;

                // Startup noise on old ECUs at 1200/2400/4800: a stray 0x55
                // restarts the frame, 0xFF clears the sync counter, a double
                // 0x0F wants a single inverted echo
                if low_baud && init_phase && recv > maxsize {
                    match data {
                        0x55 => {
                            sync_0f = 0;
                            buf[0] = 0x55;
                            size = 3;
                            recv = 1;
                            deadline = self.clock.now_ms().wrapping_add(self.timeout_ms);
                        }
                        0xFF => sync_0f = 0,
                        0x0F => {
                            if sync_0f >= 1 {
                                self.write_byte(data ^ 0xFF);
                                deadline = self.clock.now_ms().wrapping_add(self.timeout_ms);
                                sync_0f = 0;
                            } else {
                                sync_0f += 1;
                            }
                        }
                        _ => sync_0f = 0,
                    }
                    continue;
                }

                if size == 0 && recv == 1 {
                    if group_reply && data != 0x0F && data != BLOCK_END && self.port.available() {
                        // Garbage frame; read a fixed 6 bytes and recover
                        warn!(
                            "communication error: first byte 0x{:02X} with more pending",
                            data
                        );
                        self.com_error = true;
                        size = 6;
                    } else {
                        size = data as usize + 1;
                    }
                    if size > maxsize {
                        return Err(KwpError::BlockTooLarge);
                    }
                }

                if self.com_error {
                    // Recovery ACK schedule; no echo leaves this side until
                    // the error block exchange
                    match recv {
                        1 => ack_each = false,
                        3 => ack_each = true,
                        4 => ack_each = false,
                        6 => ack_each = true,
                        _ => {}
                    }
                    continue;
                }

                if ack_each && recv == 2 && data != self.block_counter {
                    if data == 0x00 {
                        // Peer restarted its counter during init errors
                        self.block_counter = 0;
                    } else {
                        warn!(
                            "counter desync: got {}, expected {}",
                            data, self.block_counter
                        );
                        return Err(KwpError::CounterMismatch);
                    }
                }

                if (!ack_each && recv == size) || (ack_each && recv < size) {
                    self.write_byte(data ^ 0xFF);
                }
                deadline = self.clock.now_ms().wrapping_add(self.timeout_ms);
            }

            if self.clock.now_ms() >= deadline {
                if recv == 0 {
                    warn!("no response from ECU");
                }
                return Err(KwpError::Timeout);
            }
        }

        self.bump_counter();
        debug!("RX {:02X?}", &buf[..size.min(maxsize)]);
        Ok(size)
    }

    fn send_ack_block(&mut self) -> KwpResult<()> {
        let block = [
            0x03,
            self.block_counter,
            BlockTitle::Ack.into(),
            BLOCK_END,
        ];
        self.send_block(&block)
    }

    fn receive_ack_block(&mut self) -> KwpResult<()> {
        let mut buf = [0u8; BLOCK_BUF];
        self.receive_block(&mut buf, BLOCK_BUF, None, false, false)?;
        if BlockTitle::from(buf[2]) != BlockTitle::Ack {
            return Err(KwpError::UnexpectedTitle);
        }
        if self.com_error {
            return Err(self.recovery_exchange());
        }
        Ok(())
    }

    /// After a detected communication error: send an explicit error block,
    /// restart the counter, read one block to resynchronize, and fail the
    /// operation so the caller re-establishes state.
    fn recovery_exchange(&mut self) -> KwpError {
        let block = [
            0x03,
            self.block_counter,
            BlockTitle::Error.into(),
            BLOCK_END,
        ];
        if let Err(e) = self.send_block(&block) {
            self.com_error = false;
            return e;
        }
        self.block_counter = 0;
        self.com_error = false;

        let mut buf = [0u8; BLOCK_BUF];
        if let Err(e) = self.receive_block(&mut buf, BLOCK_BUF, None, false, false) {
            return e;
        }
        KwpError::CommunicationError
    }

    /// Consume the controller-id blocks the ECU sends after the handshake,
    /// acknowledging each, until the first plain ACK.
    fn read_connect_blocks(&mut self) -> KwpResult<()> {
        loop {
            let mut buf = [0u8; BLOCK_BUF];
            self.receive_block(&mut buf, BLOCK_BUF, None, false, false)?;
            match BlockTitle::from(buf[2]) {
                BlockTitle::Ack => return Ok(()),
                BlockTitle::Ascii => {
                    self.send_ack_block()?;
                }
                _ => {
                    warn!("unexpected title 0x{:02X} during connect", buf[2]);
                    return Err(KwpError::UnexpectedTitle);
                }
            }
        }
    }
}

// =============================================================================
// Test peer
// =============================================================================
