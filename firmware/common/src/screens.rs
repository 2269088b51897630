//! Screen layout tables for the 16x2 display.
//!
//! A screen is static label text drawn once by the init pass plus field
//! slots the render pass keeps current. The cockpit menu is fully
//! table-driven; the experimental, debug, DTC and settings menus carry
//! their labels here and draw their dynamic parts in the renderer.

use crate::config::{ADDR_ENGINE, ADDR_INSTRUMENTS};
use crate::signals::FieldId;

/// Static text drawn by the init pass.
#[derive(Clone, Copy, Debug)]
pub struct Label {
    pub col: u8,
    pub row: u8,
    pub text: &'static str,
}

/// A region blanked by the init pass so stale text cannot leak through.
#[derive(Clone, Copy, Debug)]
pub struct Region {
    pub col: u8,
    pub row: u8,
    pub width: u8,
}

/// How a field slot is formatted.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FieldKind {
    Int,
    Float1,
    Text,
}

/// One dynamic value position.
#[derive(Clone, Copy, Debug)]
pub struct FieldSlot {
    pub col: u8,
    pub row: u8,
    pub width: u8,
    pub field: FieldId,
    pub kind: FieldKind,
}

/// Labels, blanked regions and field slots of one screen.
pub struct ScreenLayout {
    pub blank: &'static [Region],
    pub labels: &'static [Label],
    pub fields: &'static [FieldSlot],
}

const fn lbl(col: u8, row: u8, text: &'static str) -> Label {
    Label { col, row, text }
}

const fn blank(col: u8, row: u8, width: u8) -> Region {
    Region { col, row, width }
}

const fn slot(col: u8, row: u8, width: u8, field: FieldId, kind: FieldKind) -> FieldSlot {
    FieldSlot {
        col,
        row,
        width,
        field,
        kind,
    }
}

/// Connect-prompt text shown while waiting for SELECT.
pub const PROMPT_ROW0: &str = "->   ENTER   <-";
pub const PROMPT_ROW1: &str = "Press SELECT";

/// Regions the connect/setup prompts occupied; every cockpit init blanks
/// them so the prompt cannot linger under sparse layouts.
pub const PROMPT_REGIONS: &[Region] = &[blank(0, 0, 16), blank(0, 1, 12)];

// =============================================================================
// Cockpit screens
// =============================================================================

static ENGINE_SCREENS: [ScreenLayout; 5] = [
    ScreenLayout {
        blank: &[blank(0, 0, 10), blank(0, 1, 10)],
        labels: &[lbl(15, 0, "V"), lbl(13, 1, "TBa")],
        fields: &[
            slot(0, 0, 7, FieldId::Voltage, FieldKind::Float1),
            slot(0, 1, 7, FieldId::TbAngle, FieldKind::Float1),
        ],
    },
    ScreenLayout {
        blank: &[],
        labels: &[lbl(10, 0, "load"), lbl(13, 1, "STa")],
        fields: &[
            slot(0, 0, 7, FieldId::EngineLoad, FieldKind::Int),
            slot(0, 1, 7, FieldId::SteeringAngle, FieldKind::Float1),
        ],
    },
    ScreenLayout {
        blank: &[],
        labels: &[lbl(12, 0, "bits"), lbl(10, 1, "lambda")],
        fields: &[
            slot(0, 0, 8, FieldId::ErrorBits, FieldKind::Text),
            slot(0, 1, 7, FieldId::Lambda2, FieldKind::Int),
        ],
    },
    ScreenLayout {
        blank: &[],
        labels: &[lbl(6, 0, "kmh"), lbl(8, 1, "mbar")],
        fields: &[
            slot(0, 0, 5, FieldId::VehicleSpeed, FieldKind::Int),
            slot(0, 1, 7, FieldId::Pressure, FieldKind::Int),
        ],
    },
    ScreenLayout {
        blank: &[],
        labels: &[lbl(6, 0, "C temp"), lbl(6, 1, "C temp")],
        fields: &[
            slot(0, 0, 4, FieldId::TempUnknown2, FieldKind::Int),
            slot(0, 1, 4, FieldId::TempUnknown3, FieldKind::Int),
        ],
    },
];

static INSTRUMENT_SCREENS: [ScreenLayout; 5] = [
    ScreenLayout {
        blank: &[blank(0, 0, 10), blank(0, 1, 10)],
        labels: &[
            lbl(4, 0, "KMH"),
            lbl(13, 0, "RPM"),
            lbl(3, 1, "C"),
            lbl(8, 1, "C"),
            lbl(13, 1, "L"),
        ],
        fields: &[
            slot(0, 0, 3, FieldId::VehicleSpeed, FieldKind::Int),
            slot(8, 0, 4, FieldId::EngineRpm, FieldKind::Int),
            slot(0, 1, 3, FieldId::CoolantTemp, FieldKind::Int),
            slot(5, 1, 3, FieldId::OilTemp, FieldKind::Int),
            slot(10, 1, 2, FieldId::FuelLevel, FieldKind::Int),
        ],
    },
    ScreenLayout {
        blank: &[],
        labels: &[
            lbl(2, 0, "OL"),
            lbl(7, 0, "OP"),
            lbl(13, 0, "AT"),
            lbl(6, 1, "KM"),
            lbl(13, 1, "FSR"),
        ],
        fields: &[
            slot(0, 0, 1, FieldId::OilLevelOk, FieldKind::Int),
            slot(5, 0, 1, FieldId::OilPressureMin, FieldKind::Int),
            slot(10, 0, 2, FieldId::AmbientTemp, FieldKind::Int),
            slot(0, 1, 6, FieldId::Odometer, FieldKind::Int),
            slot(9, 1, 3, FieldId::FuelSensorResistance, FieldKind::Int),
        ],
    },
    ScreenLayout {
        blank: &[],
        labels: &[lbl(6, 0, "TIME"), lbl(7, 1, "L/100km")],
        fields: &[
            slot(0, 0, 5, FieldId::TimeEcu, FieldKind::Int),
            slot(0, 1, 6, FieldId::FuelPer100km, FieldKind::Float1),
        ],
    },
    ScreenLayout {
        blank: &[],
        labels: &[lbl(9, 0, "secs"), lbl(6, 1, "km")],
        fields: &[
            slot(0, 0, 8, FieldId::ElapsedSeconds, FieldKind::Int),
            slot(0, 1, 5, FieldId::ElapsedKm, FieldKind::Int),
        ],
    },
    ScreenLayout {
        blank: &[],
        labels: &[lbl(6, 0, "km burned"), lbl(7, 1, "L/h")],
        fields: &[
            slot(0, 0, 5, FieldId::FuelBurned, FieldKind::Int),
            slot(0, 1, 6, FieldId::FuelPerHour, FieldKind::Float1),
        ],
    },
];

/// Cockpit layout for an address/screen pair; `None` renders the
/// "not supported" notice instead.
pub fn cockpit_layout(addr: u8, screen: u8) -> Option<&'static ScreenLayout> {
    let table = match addr {
        ADDR_ENGINE => &ENGINE_SCREENS,
        ADDR_INSTRUMENTS => &INSTRUMENT_SCREENS,
        _ => return None,
    };
    table.get(screen as usize)
}

// =============================================================================
// Other menus
// =============================================================================

pub const EXPERIMENTAL_LABELS: &[Label] = &[lbl(0, 0, "G:"), lbl(0, 1, "S:")];

pub const DEBUG_LABELS: &[Label] = &[
    lbl(0, 0, "C:"),
    lbl(4, 0, "A:"),
    lbl(9, 0, "BC:"),
    lbl(0, 1, "KWP:"),
    lbl(7, 1, "FPS:"),
];

/// DTC screen 0: trigger a read.
pub const DTC_READ_LABELS: &[Label] = &[
    lbl(0, 0, "DTC menu addr "),
    lbl(0, 1, "<"),
    lbl(5, 1, "Read"),
    lbl(15, 1, ">"),
];

/// DTC screen 1: trigger a clear.
pub const DTC_CLEAR_LABELS: &[Label] = &[
    lbl(0, 0, "DTC menu addr "),
    lbl(0, 1, "<"),
    lbl(5, 1, "Clear"),
    lbl(15, 1, ">"),
];

/// DTC screens 2..9: two stored codes per page.
pub const DTC_SLOT_LABELS: &[Label] = &[
    lbl(1, 0, "/"),
    lbl(10, 0, "St:"),
    lbl(0, 1, "/8"),
    lbl(10, 1, "St:"),
];

/// Settings screen 0: exit the session.
pub const SETTINGS_EXIT_LABELS: &[Label] = &[
    lbl(0, 0, "Exit ECU:"),
    lbl(0, 1, "< Press select >"),
];

/// Settings screen 1: cycle the KWP mode.
pub const SETTINGS_MODE_LABELS: &[Label] = &[
    lbl(0, 0, "KWP Mode:"),
    lbl(0, 1, "<"),
    lbl(15, 1, ">"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LCD_COLS;

    fn check_layout(layout: &ScreenLayout) {
        for label in layout.labels {
            assert!(label.row < 2);
            assert!(
                label.col as usize + label.text.len() <= LCD_COLS as usize,
                "label {:?} overflows the display",
                label.text
            );
        }
        for field in layout.fields {
            assert!(field.row < 2);
            assert!(field.width > 0);
            assert!(
                field.col + field.width <= LCD_COLS,
                "field {:?} overflows the display",
                field.field
            );
        }
        for region in layout.blank {
            assert!(region.col + region.width <= LCD_COLS);
        }
    }

    #[test]
    fn test_all_cockpit_layouts_fit() {
        for screens in [&ENGINE_SCREENS, &INSTRUMENT_SCREENS] {
            for layout in screens.iter() {
                check_layout(layout);
            }
        }
    }

    #[test]
    fn test_cockpit_lookup() {
        assert!(cockpit_layout(ADDR_ENGINE, 0).is_some());
        assert!(cockpit_layout(ADDR_ENGINE, 4).is_some());
        assert!(cockpit_layout(ADDR_ENGINE, 5).is_none());
        assert!(cockpit_layout(ADDR_INSTRUMENTS, 4).is_some());
        // Unsupported address renders the notice
        assert!(cockpit_layout(0x45, 0).is_none());
    }

    #[test]
    fn test_instrument_screen0_has_core_gauges() {
        let layout = cockpit_layout(ADDR_INSTRUMENTS, 0).unwrap();
        let fields: Vec<_> = layout.fields.iter().map(|f| f.field).collect();
        assert!(fields.contains(&FieldId::VehicleSpeed));
        assert!(fields.contains(&FieldId::EngineRpm));
        assert!(fields.contains(&FieldId::CoolantTemp));
        assert!(fields.contains(&FieldId::FuelLevel));
    }

    #[test]
    fn test_static_label_sets_fit() {
        for labels in [
            EXPERIMENTAL_LABELS,
            DEBUG_LABELS,
            DTC_READ_LABELS,
            DTC_CLEAR_LABELS,
            DTC_SLOT_LABELS,
            SETTINGS_EXIT_LABELS,
            SETTINGS_MODE_LABELS,
        ] {
            for label in labels {
                assert!(label.col as usize + label.text.len() <= LCD_COLS as usize);
            }
        }
    }

    #[test]
    fn test_prompt_fits_blanked_regions() {
        assert!(PROMPT_ROW0.len() <= PROMPT_REGIONS[0].width as usize);
        assert!(PROMPT_ROW1.len() <= PROMPT_REGIONS[1].width as usize);
    }
}
