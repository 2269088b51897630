//! Analog keypad decoding and menu-aware action mapping.
//!
//! The keypad is a resistor ladder on one ADC channel; a single conversion
//! identifies the pressed button. Debouncing is time-based and handled by
//! the orchestrator, which ignores input for a fixed window after any
//! accepted press.

use crate::config;
use crate::menu::{MenuId, MenuState};

/// Decoded keypad state.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Button {
    Right,
    Up,
    Down,
    Left,
    Select,
    None,
}

impl Button {
    /// Map one ADC reading (0..1023) to a button.
    pub const fn from_raw(value: u16) -> Self {
        if value < config::KEY_RIGHT_MAX {
            Self::Right
        } else if value < config::KEY_UP_MAX {
            Self::Up
        } else if value < config::KEY_DOWN_MAX {
            Self::Down
        } else if value < config::KEY_LEFT_MAX {
            Self::Left
        } else if value < config::KEY_SELECT_MAX {
            Self::Select
        } else {
            Self::None
        }
    }
}

/// Side effects a button press requests beyond menu navigation.
/// Applied by the orchestrator at the top of the next tick.
#[derive(Default, Clone, Copy, Debug)]
pub struct InputActions {
    /// Settings screen 0: end the session and re-enter setup.
    pub request_exit: bool,
    /// DTC screen 0: read trouble codes from the ECU.
    pub read_dtc: bool,
    /// DTC screen 1: clear trouble codes.
    pub clear_dtc: bool,
    /// Experimental menu: flip which slot pair is shown.
    pub invert_group_side: bool,
    /// Settings screen 1: cycle the KWP service mode.
    pub toggle_kwp_mode: bool,
}

/// Apply one decoded button to the menu state, collecting any requested
/// actions. Returns true when the press did anything (the orchestrator arms
/// the debounce window only then).
pub fn apply_button(button: Button, menu: &mut MenuState, actions: &mut InputActions) -> bool {
    match button {
        Button::Right => {
            menu.next_menu();
            true
        }
        Button::Left => {
            menu.prev_menu();
            true
        }
        Button::Up => {
            menu.next_screen();
            true
        }
        Button::Down => {
            menu.prev_screen();
            true
        }
        Button::Select => match menu.current_menu() {
            MenuId::Experimental => {
                actions.invert_group_side = true;
                true
            }
            MenuId::Dtc if menu.screen() == 0 => {
                actions.read_dtc = true;
                true
            }
            MenuId::Dtc if menu.screen() == 1 => {
                actions.clear_dtc = true;
                true
            }
            MenuId::Settings if menu.screen() == 0 => {
                actions.request_exit = true;
                true
            }
            MenuId::Settings if menu.screen() == 1 => {
                actions.toggle_kwp_mode = true;
                true
            }
            _ => false,
        },
        Button::None => false,
    }
}
