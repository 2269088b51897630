//! Desktop stand-ins for the device hardware: a terminal-rendered 16x2
//! display, a virtual millisecond clock and a time-scheduled keypad.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use kdash_common::config::{LCD_COLS, LCD_ROWS};
use kdash_common::hal::{CharDisplay, Clock, Keypad};

/// Virtual clock. Every poll advances one millisecond so the core's
/// bounded waits terminate instantly in wall time; delays jump forward.
#[derive(Clone, Default)]
pub struct VirtualClock {
    now: Rc<Cell<u32>>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared millisecond cell (waveform phase for the virtual ECU).
    pub fn handle(&self) -> Rc<Cell<u32>> {
        self.now.clone()
    }

    /// Read the time without advancing it.
    pub fn peek(&self) -> u32 {
        self.now.get()
    }
}

impl Clock for VirtualClock {
    fn now_ms(&self) -> u32 {
        let t = self.now.get().wrapping_add(1);
        self.now.set(t);
        t
    }

    fn delay_ms(&self, ms: u32) {
        self.now.set(self.now.get().wrapping_add(ms));
    }
}

/// 16x2 character display kept in memory and dumped to the terminal.
pub struct TermDisplay {
    cells: [[u8; LCD_COLS as usize]; LCD_ROWS as usize],
    col: u8,
    row: u8,
}

impl TermDisplay {
    pub fn new() -> Self {
        Self {
            cells: [[b' '; LCD_COLS as usize]; LCD_ROWS as usize],
            col: 0,
            row: 0,
        }
    }

    /// Current frame as a bordered two-line box.
    pub fn frame(&self) -> String {
        let mut out = String::new();
        out.push_str("+----------------+\n");
        for row in &self.cells {
            out.push('|');
            out.extend(row.iter().map(|&c| c as char));
            out.push_str("|\n");
        }
        out.push_str("+----------------+");
        out
    }
}

impl Default for TermDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl CharDisplay for TermDisplay {
    fn begin(&mut self, _cols: u8, _rows: u8) {
        self.clear();
    }

    fn clear(&mut self) {
        self.cells = [[b' '; LCD_COLS as usize]; LCD_ROWS as usize];
        self.col = 0;
        self.row = 0;
    }

    fn set_cursor(&mut self, col: u8, row: u8) {
        self.col = col;
        self.row = row;
    }

    fn print(&mut self, text: &str) {
        for b in text.bytes() {
            if self.col < LCD_COLS && self.row < LCD_ROWS {
                self.cells[self.row as usize][self.col as usize] = b;
            }
            self.col = self.col.saturating_add(1);
        }
    }
}

/// Keypad fed from a `(time, raw value)` schedule. The latest entry whose
/// time has passed wins; idle (no key) otherwise.
#[derive(Clone)]
pub struct ScheduledKeypad {
    schedule: Rc<RefCell<Vec<(u32, u16)>>>,
    clock: VirtualClock,
}

/// Raw ADC level read when no key is down.
pub const KEY_IDLE: u16 = 1023;
pub const KEY_RIGHT: u16 = 30;
pub const KEY_UP: u16 = 120;
pub const KEY_DOWN: u16 = 300;
pub const KEY_LEFT: u16 = 450;
pub const KEY_SELECT: u16 = 650;

impl ScheduledKeypad {
    pub fn new(clock: VirtualClock, schedule: Vec<(u32, u16)>) -> Self {
        Self {
            schedule: Rc::new(RefCell::new(schedule)),
            clock,
        }
    }
}

impl Keypad for ScheduledKeypad {
    fn read_raw(&mut self) -> u16 {
        let now = self.clock.peek();
        let mut value = KEY_IDLE;
        for &(at, v) in self.schedule.borrow().iter() {
            if at <= now {
                value = v;
            }
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_frame_shape() {
        let mut d = TermDisplay::new();
        d.set_cursor(0, 0);
        d.print("Hello");
        let frame = d.frame();
        assert!(frame.contains("|Hello           |"));
        assert_eq!(frame.lines().count(), 4);
    }

    #[test]
    fn test_keypad_schedule_order() {
        let clock = VirtualClock::new();
        let mut pad = ScheduledKeypad::new(
            clock.clone(),
            vec![(0, KEY_IDLE), (100, KEY_LEFT), (200, KEY_IDLE)],
        );
        assert_eq!(pad.read_raw(), KEY_IDLE);
        clock.delay_ms(150);
        assert_eq!(pad.read_raw(), KEY_LEFT);
        clock.delay_ms(100);
        assert_eq!(pad.read_raw(), KEY_IDLE);
    }

    #[test]
    fn test_clock_advances_on_poll() {
        let clock = VirtualClock::new();
        let first = clock.now_ms();
        assert!(clock.now_ms() > first);
        clock.delay_ms(500);
        assert!(clock.peek() >= 500);
    }
}
