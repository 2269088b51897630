//! Incremental display renderer.
//!
//! Two passes per screen: `init_menu` draws the static labels (and blanks
//! regions stale text could survive in), `render` keeps the dynamic fields
//! current. A field is written when its dirty bit is set or the frame is
//! forced; after writing, the bit is drained. Values that do not fit their
//! slot width are dropped rather than truncated so they cannot corrupt
//! neighbouring regions. Unforced frames are paced to one per
//! [`DISPLAY_FRAME_MS`].
//!
//! [`DISPLAY_FRAME_MS`]: crate::config::DISPLAY_FRAME_MS

use core::fmt::Write as _;

use heapless::String;

use crate::config::{ADDR_ENGINE, ADDR_INSTRUMENTS, DISPLAY_FRAME_MS};
use crate::dtc::DtcStore;
use crate::hal::CharDisplay;
use crate::kwp::KwpMode;
use crate::menu::{MenuId, MenuState};
use crate::screens::{
    cockpit_layout, Label, Region, DEBUG_LABELS, DTC_CLEAR_LABELS, DTC_READ_LABELS,
    DTC_SLOT_LABELS, EXPERIMENTAL_LABELS, PROMPT_REGIONS, SETTINGS_EXIT_LABELS,
    SETTINGS_MODE_LABELS,
};
use crate::signals::{FieldId, SignalModel, Value};

/// Live link state shown by the debug menu.
#[derive(Clone, Copy, Default)]
pub struct DebugInfo {
    pub connected: bool,
    pub rx_pending: bool,
    pub block_counter: u8,
    pub mode: KwpMode,
}

/// Frame-paced screen renderer.
pub struct Renderer {
    next_frame_ms: u32,
}

impl Renderer {
    pub const fn new() -> Self {
        Self { next_frame_ms: 0 }
    }

    /// Draw the static portion of the active screen. Call after every menu
    /// or screen change, on a cleared display.
    pub fn init_menu<D: CharDisplay>(&mut self, display: &mut D, menu: &MenuState, addr: u8) {
        match menu.current_menu() {
            MenuId::Cockpit => self.init_cockpit(display, addr, menu.screen()),
            MenuId::Experimental => draw_labels(display, EXPERIMENTAL_LABELS),
            MenuId::Debug => draw_labels(display, DEBUG_LABELS),
            MenuId::Dtc => match menu.screen() {
                0 => {
                    draw_labels(display, DTC_READ_LABELS);
                    put_hex(display, 14, 0, addr);
                }
                1 => {
                    draw_labels(display, DTC_CLEAR_LABELS);
                    put_hex(display, 14, 0, addr);
                }
                _ => draw_labels(display, DTC_SLOT_LABELS),
            },
            MenuId::Settings => match menu.screen() {
                0 => draw_labels(display, SETTINGS_EXIT_LABELS),
                1 => draw_labels(display, SETTINGS_MODE_LABELS),
                screen => draw_screen_unsupported(display, screen),
            },
        }
    }

    fn init_cockpit<D: CharDisplay>(&mut self, display: &mut D, addr: u8, screen: u8) {
        // The Setup/Connect prompts used these cells; sparse cockpit
        // layouts would otherwise leave them visible
        blank_regions(display, PROMPT_REGIONS);

        if addr != ADDR_ENGINE && addr != ADDR_INSTRUMENTS {
            display.set_cursor(0, 0);
            display.print("Addr");
            put_hex(display, 6, 0, addr);
            display.set_cursor(0, 1);
            display.print("not supported!");
            return;
        }

        match cockpit_layout(addr, screen) {
            Some(layout) => {
                blank_regions(display, layout.blank);
                draw_labels(display, layout.labels);
            }
            None => draw_screen_unsupported(display, screen),
        }
    }

    /// Draw the dynamic fields of the active screen.
    ///
    /// Unforced frames are skipped until the frame interval elapsed.
    /// Returns whether anything was drawn.
    #[allow(clippy::too_many_arguments)]
    pub fn render<D: CharDisplay>(
        &mut self,
        display: &mut D,
        now_ms: u32,
        menu: &MenuState,
        signals: &mut SignalModel,
        dtcs: &DtcStore,
        addr: u8,
        debug: &DebugInfo,
        force: bool,
    ) -> bool {
        if !force && now_ms < self.next_frame_ms {
            return false;
        }
        self.next_frame_ms = now_ms.wrapping_add(DISPLAY_FRAME_MS);

        match menu.current_menu() {
            MenuId::Cockpit => self.render_cockpit(display, menu.screen(), addr, signals, force),
            MenuId::Experimental => self.render_experimental(display, signals),
            MenuId::Debug => self.render_debug(display, debug),
            MenuId::Dtc => self.render_dtc(display, menu.screen(), dtcs),
            MenuId::Settings => self.render_settings(display, menu.screen(), debug.mode),
        }
        true
    }

    fn render_cockpit<D: CharDisplay>(
        &mut self,
        display: &mut D,
        screen: u8,
        addr: u8,
        signals: &mut SignalModel,
        force: bool,
    ) {
        let Some(layout) = cockpit_layout(addr, screen) else {
            return;
        };

        for slot in layout.fields {
            if !(force || signals.is_dirty(slot.field)) {
                continue;
            }
            match signals.value(slot.field) {
                Value::Uint(v) => put_uint(display, slot.col, slot.row, slot.width, v),
                Value::Int(v) => put_int(display, slot.col, slot.row, slot.width, v),
                Value::Float(v) => put_float(display, slot.col, slot.row, slot.width, v),
                Value::Text(text) => {
                    // Text lives in the model; format via a copy so the
                    // mutable drain below stays legal
                    let mut copy: String<16> = String::new();
                    copy.push_str(text).ok();
                    put_text(display, slot.col, slot.row, slot.width, &copy);
                }
            }
            signals.drain(slot.field);
        }
    }

    /// The experimental view redraws fully; its slots change wholesale
    /// with every group response.
    fn render_experimental<D: CharDisplay>(&mut self, display: &mut D, signals: &mut SignalModel) {
        let group = signals.experimental.group_current;
        let side = signals.experimental.side;
        put_uint(display, 2, 0, 2, group.into());
        put_uint(display, 2, 1, 2, side as u32);

        let (first, second) = if side { (2, 3) } else { (0, 1) };
        put_float(display, 4, 0, 7, signals.experimental.v[first]);
        put_float(display, 4, 1, 7, signals.experimental.v[second]);

        let mut unit: String<16> = String::new();
        unit.push_str(signals.experimental.unit(first)).ok();
        put_text(display, 11, 0, 5, &unit);
        unit.clear();
        unit.push_str(signals.experimental.unit(second)).ok();
        put_text(display, 11, 1, 5, &unit);

        for field in [
            FieldId::ExpGroup,
            FieldId::ExpSide,
            FieldId::ExpValues,
            FieldId::ExpUnits,
        ] {
            signals.drain(field);
        }
    }

    fn render_debug<D: CharDisplay>(&mut self, display: &mut D, debug: &DebugInfo) {
        put_uint(display, 2, 0, 1, debug.connected as u32);
        put_uint(display, 6, 0, 3, debug.rx_pending as u32);
        put_uint(display, 13, 0, 3, debug.block_counter.into());
        put_uint(display, 5, 1, 1, debug.mode.as_int().into());
        put_uint(display, 12, 1, 3, 1000 / DISPLAY_FRAME_MS);
    }

    fn render_dtc<D: CharDisplay>(&mut self, display: &mut D, screen: u8, dtcs: &DtcStore) {
        // Screens 0/1 are fully static triggers
        if screen < 2 {
            return;
        }
        let page = (screen - 2) as usize;
        if page > 7 {
            return;
        }

        let first = page * 2;
        put_uint(display, 0, 0, 1, (page + 1) as u32);
        put_uint(display, 3, 0, 6, dtcs.code_at(first).into());
        put_uint(display, 13, 0, 3, dtcs.status_at(first).into());
        put_uint(display, 3, 1, 6, dtcs.code_at(first + 1).into());
        put_uint(display, 13, 1, 3, dtcs.status_at(first + 1).into());
    }

    fn render_settings<D: CharDisplay>(&mut self, display: &mut D, screen: u8, mode: KwpMode) {
        // Only the mode screen has a dynamic center field
        if screen != 1 {
            return;
        }
        blank_region(display, 4, 1, 7);
        display.set_cursor(4, 1);
        display.print(mode.label());
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Cell helpers
// =============================================================================

fn draw_labels<D: CharDisplay>(display: &mut D, labels: &[Label]) {
    for label in labels {
        display.set_cursor(label.col, label.row);
        display.print(label.text);
    }
}

fn blank_regions<D: CharDisplay>(display: &mut D, regions: &[Region]) {
    for region in regions {
        blank_region(display, region.col, region.row, region.width);
    }
}

fn blank_region<D: CharDisplay>(display: &mut D, col: u8, row: u8, width: u8) {
    display.set_cursor(col, row);
    for _ in 0..width {
        display.print(" ");
    }
}

/// Blank the slot, then print only if the text fits its width.
fn put_text<D: CharDisplay>(display: &mut D, col: u8, row: u8, width: u8, text: &str) {
    blank_region(display, col, row, width);
    if text.len() <= width as usize {
        display.set_cursor(col, row);
        display.print(text);
    }
}

fn put_uint<D: CharDisplay>(display: &mut D, col: u8, row: u8, width: u8, value: u32) {
    let mut s: String<24> = String::new();
    write!(s, "{}", value).ok();
    put_text(display, col, row, width, &s);
}

fn put_int<D: CharDisplay>(display: &mut D, col: u8, row: u8, width: u8, value: i32) {
    let mut s: String<24> = String::new();
    write!(s, "{}", value).ok();
    put_text(display, col, row, width, &s);
}

/// Floats always render with one decimal place.
fn put_float<D: CharDisplay>(display: &mut D, col: u8, row: u8, width: u8, value: f32) {
    let mut s: String<24> = String::new();
    write!(s, "{:.1}", value).ok();
    put_text(display, col, row, width, &s);
}

fn put_hex<D: CharDisplay>(display: &mut D, col: u8, row: u8, value: u8) {
    let mut s: String<4> = String::new();
    write!(s, "{:02X}", value).ok();
    display.set_cursor(col, row);
    display.print(&s);
}

/// Fallback for a screen index with no layout, mirroring the unsupported
/// address message drawn by `init_cockpit`.
fn draw_screen_unsupported<D: CharDisplay>(display: &mut D, screen: u8) {
    display.set_cursor(0, 0);
    display.print("Screen");
    put_uint(display, 7, 0, 3, screen.into());
    display.set_cursor(0, 1);
    display.print("not supported!");
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod test_display {
    use super::*;
    use crate::config::{LCD_COLS, LCD_ROWS};

    /// In-memory 16x2 character display for assertions.
    pub struct MockDisplay {
        pub cells: [[u8; LCD_COLS as usize]; LCD_ROWS as usize],
        col: u8,
        row: u8,
    }

    impl MockDisplay {
        pub fn new() -> Self {
            Self {
                cells: [[b' '; LCD_COLS as usize]; LCD_ROWS as usize],
                col: 0,
                row: 0,
            }
        }

        pub fn line(&self, row: usize) -> std::string::String {
            self.cells[row].iter().map(|&c| c as char).collect()
        }

        pub fn poke(&mut self, col: usize, row: usize, text: &str) {
            for (i, b) in text.bytes().enumerate() {
                self.cells[row][col + i] = b;
            }
        }
    }

    impl CharDisplay for MockDisplay {
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
}

#[cfg(test)]
mod tests {
    use super::test_display::MockDisplay;
    use super::*;
    use crate::menu::MenuState;
    use crate::screens::FieldKind;

    fn fixture() -> (Renderer, MockDisplay, MenuState, SignalModel, DtcStore) {
        (
            Renderer::new(),
            MockDisplay::new(),
            MenuState::new(),
            SignalModel::new(),
            DtcStore::new(),
        )
    }

    #[test]
    fn test_init_cockpit_draws_labels() {
        let (mut r, mut d, menu, ..) = fixture();
        r.init_menu(&mut d, &menu, ADDR_INSTRUMENTS);
        assert_eq!(&d.line(0)[4..7], "KMH");
        assert_eq!(&d.line(0)[13..16], "RPM");
        assert_eq!(&d.line(1)[13..14], "L");
    }

    #[test]
    fn test_init_cockpit_blanks_prompt() {
        let (mut r, mut d, menu, ..) = fixture();
        d.poke(0, 0, "->   ENTER   <-");
        d.poke(0, 1, "Press SELECT");
        r.init_menu(&mut d, &menu, ADDR_INSTRUMENTS);
        assert!(!d.line(0).contains("ENTER"));
        assert!(!d.line(1).contains("SELECT"));
    }

    #[test]
    fn test_init_unsupported_address() {
        let (mut r, mut d, menu, ..) = fixture();
        r.init_menu(&mut d, &menu, 0x45);
        assert!(d.line(0).starts_with("Addr"));
        assert!(d.line(0).contains("45"));
        assert!(d.line(1).contains("not supported!"));
    }

    #[test]
    fn test_force_render_writes_all_and_drains() {
        let (mut r, mut d, menu, mut signals, dtcs) = fixture();
        signals.apply_routed(FieldId::VehicleSpeed, 120.0);
        signals.apply_routed(FieldId::EngineRpm, 3500.0);

        let drawn = r.render(
            &mut d,
            0,
            &menu,
            &mut signals,
            &dtcs,
            ADDR_INSTRUMENTS,
            &DebugInfo::default(),
            true,
        );
        assert!(drawn);
        assert!(d.line(0).starts_with("120"));
        assert_eq!(&d.line(0)[8..12], "3500");

        // Every field of the active layout is clean afterwards
        let layout = cockpit_layout(ADDR_INSTRUMENTS, 0).unwrap();
        for slot in layout.fields {
            assert!(!signals.is_dirty(slot.field));
        }
    }

    #[test]
    fn test_unforced_render_writes_only_dirty() {
        let (mut r, mut d, menu, mut signals, dtcs) = fixture();
        signals.apply_routed(FieldId::VehicleSpeed, 120.0);
        signals.drain(FieldId::VehicleSpeed);
        signals.apply_routed(FieldId::EngineRpm, 3500.0);

        // Sentinel in the speed region: must survive the frame
        d.poke(0, 0, "###");
        r.render(
            &mut d,
            0,
            &menu,
            &mut signals,
            &dtcs,
            ADDR_INSTRUMENTS,
            &DebugInfo::default(),
            false,
        );
        assert_eq!(&d.line(0)[0..3], "###");
        assert_eq!(&d.line(0)[8..12], "3500");
    }

    #[test]
    fn test_oversized_value_is_dropped() {
        let (mut r, mut d, menu, mut signals, dtcs) = fixture();
        // Speed slot is 3 wide on screen 0
        signals.apply_routed(FieldId::VehicleSpeed, 12345.0);
        r.render(
            &mut d,
            0,
            &menu,
            &mut signals,
            &dtcs,
            ADDR_INSTRUMENTS,
            &DebugInfo::default(),
            true,
        );
        assert_eq!(&d.line(0)[0..3], "   ");
    }

    #[test]
    fn test_float_renders_one_decimal() {
        let (mut r, mut d, mut menu, mut signals, dtcs) = fixture();
        // Instruments screen 2 shows fuel per 100 km
        menu.next_screen();
        menu.next_screen();
        signals.instruments.fuel_level_start = 60;
        signals.instruments.fuel_level = 55;
        signals.instruments.odometer_start = 1000;
        signals.instruments.odometer = 1050;
        signals.compute(3_600_000, 0);

        r.render(
            &mut d,
            0,
            &menu,
            &mut signals,
            &dtcs,
            ADDR_INSTRUMENTS,
            &DebugInfo::default(),
            true,
        );
        assert!(d.line(1).starts_with("10.0"));
    }

    #[test]
    fn test_frame_pacing() {
        let (mut r, mut d, menu, mut signals, dtcs) = fixture();
        let dbg = DebugInfo::default();
        assert!(r.render(&mut d, 0, &menu, &mut signals, &dtcs, ADDR_INSTRUMENTS, &dbg, false));
        // Within the frame window nothing is drawn
        assert!(!r.render(&mut d, 100, &menu, &mut signals, &dtcs, ADDR_INSTRUMENTS, &dbg, false));
        // Forced frames ignore pacing
        assert!(r.render(&mut d, 100, &menu, &mut signals, &dtcs, ADDR_INSTRUMENTS, &dbg, true));
        assert!(r.render(&mut d, 400, &menu, &mut signals, &dtcs, ADDR_INSTRUMENTS, &dbg, false));
    }

    #[test]
    fn test_experimental_view_shows_selected_side() {
        let (mut r, mut d, mut menu, mut signals, dtcs) = fixture();
        menu.next_menu(); // Experimental
        r.init_menu(&mut d, &menu, ADDR_INSTRUMENTS);

        signals.set_experimental_group(5);
        signals.set_experimental_slot(0, 7, 88.0, "km/h");
        signals.set_experimental_slot(1, 5, 90.0, "C");
        signals.set_experimental_slot(2, 6, 12.5, "V");
        signals.set_experimental_slot(3, 1, 3000.0, "rpm");

        let dbg = DebugInfo::default();
        r.render(&mut d, 0, &menu, &mut signals, &dtcs, ADDR_INSTRUMENTS, &dbg, true);
        assert!(d.line(0).contains("88.0"));
        assert!(d.line(0).contains("km/h"));
        assert!(d.line(1).contains("90.0"));

        // Flip to the other pair
        signals.invert_group_side();
        r.render(&mut d, 400, &menu, &mut signals, &dtcs, ADDR_INSTRUMENTS, &dbg, true);
        assert!(d.line(0).contains("12.5"));
        assert!(d.line(0).contains("V"));
        assert!(d.line(1).contains("3000.0"));
    }

    #[test]
    fn test_debug_view_shows_link_state() {
        let (mut r, mut d, mut menu, mut signals, dtcs) = fixture();
        menu.next_menu();
        menu.next_menu(); // Debug
        r.init_menu(&mut d, &menu, ADDR_INSTRUMENTS);

        let dbg = DebugInfo {
            connected: true,
            rx_pending: false,
            block_counter: 42,
            mode: KwpMode::ReadSensors,
        };
        r.render(&mut d, 0, &menu, &mut signals, &dtcs, ADDR_INSTRUMENTS, &dbg, true);
        assert_eq!(&d.line(0)[0..3], "C:1");
        assert_eq!(&d.line(0)[13..15], "42");
        // 1000 / 177 frames per second, truncated
        assert_eq!(&d.line(1)[12..13], "5");
    }

    #[test]
    fn test_dtc_pages_show_two_slots() {
        let (mut r, mut d, mut menu, mut signals, mut dtcs) = fixture();
        dtcs.set(0, 291, 1); // 0x0123
        dtcs.set(1, 1110, 128);

        // DTC menu, screen 2 = first code page
        menu.next_menu();
        menu.next_menu();
        menu.next_menu();
        menu.next_screen();
        menu.next_screen();
        assert_eq!(menu.current_menu(), MenuId::Dtc);

        r.init_menu(&mut d, &menu, ADDR_INSTRUMENTS);
        r.render(
            &mut d,
            0,
            &menu,
            &mut signals,
            &dtcs,
            ADDR_INSTRUMENTS,
            &DebugInfo::default(),
            true,
        );
        assert!(d.line(0).starts_with("1/"));
        assert!(d.line(0).contains("291"));
        assert!(d.line(0).contains("St:1"));
        assert!(d.line(1).contains("1110"));
        assert!(d.line(1).contains("St:128"));
    }

    #[test]
    fn test_settings_mode_label() {
        let (mut r, mut d, mut menu, mut signals, dtcs) = fixture();
        menu.prev_menu(); // Settings
        menu.next_screen(); // KWP mode screen
        r.init_menu(&mut d, &menu, ADDR_INSTRUMENTS);

        let dbg = DebugInfo {
            mode: KwpMode::ReadGroup,
            ..DebugInfo::default()
        };
        r.render(&mut d, 0, &menu, &mut signals, &dtcs, ADDR_INSTRUMENTS, &dbg, true);
        assert!(d.line(0).starts_with("KWP Mode:"));
        assert!(d.line(1).contains("GROUP"));
    }

    #[test]
    fn test_layout_kinds_match_model_values() {
        let signals = SignalModel::new();
        for addr in [ADDR_ENGINE, ADDR_INSTRUMENTS] {
            for screen in 0..5 {
                let layout = cockpit_layout(addr, screen).unwrap();
                for slot in layout.fields {
                    let matches = matches!(
                        (slot.kind, signals.value(slot.field)),
                        (FieldKind::Int, Value::Uint(_))
                            | (FieldKind::Int, Value::Int(_))
                            | (FieldKind::Float1, Value::Float(_))
                            | (FieldKind::Text, Value::Text(_))
                    );
                    assert!(matches, "kind mismatch for {:?}", slot.field);
                }
            }
        }
    }
}
