//! Menu navigation state.
//!
//! Five top-level menus cycled with LEFT/RIGHT, each with its own screen
//! index cycled with UP/DOWN against a per-menu maximum. Change flags are
//! consumable: the renderer reads and clears them in one call so a change
//! triggers exactly one re-init.

/// Top-level menus in LEFT/RIGHT cycling order.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub enum MenuId {
    #[default]
    Cockpit,
    Experimental,
    Debug,
    Dtc,
    Settings,
}

impl MenuId {
    const COUNT: u8 = 5;

    #[inline]
    const fn from_index(idx: u8) -> Self {
        match idx {
            0 => Self::Cockpit,
            1 => Self::Experimental,
            2 => Self::Debug,
            3 => Self::Dtc,
            _ => Self::Settings,
        }
    }

    #[inline]
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Cycle to the next menu, wrapping after Settings.
    pub const fn next(self) -> Self {
        Self::from_index((self.index() + 1) % Self::COUNT)
    }

    /// Cycle to the previous menu, wrapping before Cockpit.
    pub const fn prev(self) -> Self {
        Self::from_index(if self.index() == 0 {
            Self::COUNT - 1
        } else {
            self.index() - 1
        })
    }
}

/// Highest valid screen index per menu (inclusive).
const SCREEN_MAX: [u8; MenuId::COUNT as usize] = [4, 64, 4, 9, 10];

/// Current menu, per-menu screen indices and the two change flags.
pub struct MenuState {
    current: MenuId,
    screens: [u8; MenuId::COUNT as usize],
    menu_changed: bool,
    screen_changed: bool,
}

impl MenuState {
    pub const fn new() -> Self {
        Self {
            current: MenuId::Cockpit,
            screens: [0; MenuId::COUNT as usize],
            menu_changed: false,
            screen_changed: false,
        }
    }

    #[inline]
    pub const fn current_menu(&self) -> MenuId {
        self.current
    }

    /// Screen index of the active menu.
    #[inline]
    pub const fn screen(&self) -> u8 {
        self.screens[self.current.index() as usize]
    }

    #[inline]
    pub const fn screen_of(&self, menu: MenuId) -> u8 {
        self.screens[menu.index() as usize]
    }

    pub fn next_menu(&mut self) {
        self.current = self.current.next();
        self.menu_changed = true;
    }

    pub fn prev_menu(&mut self) {
        self.current = self.current.prev();
        self.menu_changed = true;
    }

    /// Advance the active menu's screen, wrapping past its maximum.
    pub fn next_screen(&mut self) {
        let idx = self.current.index() as usize;
        let max = SCREEN_MAX[idx];
        self.screens[idx] = if self.screens[idx] >= max {
            0
        } else {
            self.screens[idx] + 1
        };
        self.screen_changed = true;
    }

    /// Step the active menu's screen back, wrapping below zero.
    pub fn prev_screen(&mut self) {
        let idx = self.current.index() as usize;
        let max = SCREEN_MAX[idx];
        self.screens[idx] = if self.screens[idx] == 0 {
            max
        } else {
            self.screens[idx] - 1
        };
        self.screen_changed = true;
    }

    /// Overwrite the experimental screen index (used to promote index 0 to
    /// group 1, the lowest real measurement group).
    pub fn set_experimental_screen(&mut self, screen: u8) {
        self.screens[MenuId::Experimental.index() as usize] =
            screen.min(SCREEN_MAX[MenuId::Experimental.index() as usize]);
    }

    /// Read and clear the menu-changed flag.
    pub fn consume_menu_changed(&mut self) -> bool {
        let tmp = self.menu_changed;
        self.menu_changed = false;
        tmp
    }

    /// Read and clear the screen-changed flag.
    pub fn consume_screen_changed(&mut self) -> bool {
        let tmp = self.screen_changed;
        self.screen_changed = false;
        tmp
    }

    pub fn mark_menu_changed(&mut self) {
        self.menu_changed = true;
    }

    pub fn mark_screen_changed(&mut self) {
        self.screen_changed = true;
    }
}

impl Default for MenuState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_default() {
        let state = MenuState::new();
        assert_eq!(state.current_menu(), MenuId::Cockpit);
        assert_eq!(state.screen(), 0);
    }

    #[test]
    fn test_menu_cycle_wraps() {
        assert_eq!(MenuId::Cockpit.next(), MenuId::Experimental);
        assert_eq!(MenuId::Settings.next(), MenuId::Cockpit);
        assert_eq!(MenuId::Cockpit.prev(), MenuId::Settings);
    }

    #[test]
    fn test_prev_next_are_inverses() {
        for idx in 0..5 {
            let menu = MenuId::from_index(idx);
            assert_eq!(menu.next().prev(), menu);
            assert_eq!(menu.prev().next(), menu);
        }
    }

    #[test]
    fn test_screen_prev_next_are_inverses() {
        let mut state = MenuState::new();
        for menu_idx in 0..5 {
            state.current = MenuId::from_index(menu_idx);
            let max = SCREEN_MAX[menu_idx as usize];
            for start in [0, 1, max] {
                state.screens[menu_idx as usize] = start;
                state.next_screen();
                state.prev_screen();
                assert_eq!(state.screen(), start);
                state.prev_screen();
                state.next_screen();
                assert_eq!(state.screen(), start);
            }
        }
    }

    #[test]
    fn test_screen_wraps_at_max() {
        let mut state = MenuState::new();
        state.screens[0] = SCREEN_MAX[0];
        state.next_screen();
        assert_eq!(state.screen(), 0);
        state.prev_screen();
        assert_eq!(state.screen(), SCREEN_MAX[0]);
    }

    #[test]
    fn test_screen_indices_are_per_menu() {
        let mut state = MenuState::new();
        state.next_screen();
        assert_eq!(state.screen_of(MenuId::Cockpit), 1);
        state.next_menu();
        assert_eq!(state.current_menu(), MenuId::Experimental);
        assert_eq!(state.screen(), 0);
        state.prev_menu();
        assert_eq!(state.screen(), 1);
    }

    #[test]
    fn test_change_flags_consume() {
        let mut state = MenuState::new();
        assert!(!state.consume_menu_changed());
        state.next_menu();
        assert!(state.consume_menu_changed());
        assert!(!state.consume_menu_changed());

        state.next_screen();
        assert!(state.consume_screen_changed());
        assert!(!state.consume_screen_changed());
    }

    #[test]
    fn test_mark_flags() {
        let mut state = MenuState::new();
        state.mark_menu_changed();
        state.mark_screen_changed();
        assert!(state.consume_menu_changed());
        assert!(state.consume_screen_changed());
    }
}
