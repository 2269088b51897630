//! Orchestrator: one cooperative loop tying session, model, input and
//! display together.
//!
//! A three-phase machine drives the device: interactive **Setup** (mode,
//! baud, address), **WaitingForConnect** showing the press-SELECT prompt,
//! and **Running**, where every tick services the KWP link, derives the
//! trip statistics, samples the keypad and renders. All hardware access
//! goes through the traits in [`crate::hal`]; nothing here owns state that
//! another component mutates.

use log::{info, warn};

use crate::config::{
    AUTO_SETUP_ADDRESS, AUTO_SETUP_BAUD_RATE, BUTTON_DEBOUNCE_MS, DEFAULT_BAUD_INDEX,
    DTC_MESSAGE_MS, ECU_TIMEOUT_MS, LCD_COLS, LCD_ROWS, SIMULATION_TICK_MS, SPLASH_MS,
    SUCCESS_MESSAGE_MS, SUPPORTED_BAUD_RATES,
};
use crate::dtc::DtcStore;
use crate::hal::{CharDisplay, Clock, Keypad, SerialPort, WakeUp};
use crate::input::{apply_button, Button, InputActions};
use crate::kwp::{Kwp1281Session, KwpMode};
use crate::menu::{MenuId, MenuState};
use crate::render::{DebugInfo, Renderer};
use crate::screens::{PROMPT_ROW0, PROMPT_ROW1};
use crate::signals::SignalModel;

/// Top-level run phase.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    /// Interactive mode/baud/address selection.
    Setup,
    /// Prompt shown, waiting for SELECT before touching the ECU.
    WaitingForConnect,
    /// Connected (or simulating); the tripcomputer loop is live.
    Running,
}

/// The device application.
pub struct App<S, D, K, C, W> {
    session: Kwp1281Session<S, C, W>,
    display: D,
    keypad: K,
    clock: C,
    signals: SignalModel,
    dtcs: DtcStore,
    menu: MenuState,
    renderer: Renderer,
    phase: Phase,
    simulation: bool,
    auto_setup: bool,
    baud: u16,
    addr: u8,
    kwp_mode: KwpMode,
    kwp_group: u8,
    connected: bool,
    connect_time_start: u32,
    button_timeout_until: u32,
    connection_attempts: u8,
}

impl<S, D, K, C, W> App<S, D, K, C, W>
where
    S: SerialPort,
    D: CharDisplay,
    K: Keypad,
    C: Clock + Clone,
    W: WakeUp,
{
    pub fn new(port: S, display: D, keypad: K, clock: C, wake: W) -> Self {
        Self {
            session: Kwp1281Session::new(port, clock.clone(), wake),
            display,
            keypad,
            clock,
            signals: SignalModel::new(),
            dtcs: DtcStore::new(),
            menu: MenuState::new(),
            renderer: Renderer::new(),
            phase: Phase::Setup,
            simulation: false,
            auto_setup: false,
            baud: 0,
            addr: 0,
            kwp_mode: KwpMode::default(),
            kwp_group: 1,
            connected: false,
            connect_time_start: 0,
            button_timeout_until: 0,
            connection_attempts: 0,
        }
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    #[inline]
    pub fn signals(&self) -> &SignalModel {
        &self.signals
    }

    #[inline]
    pub fn menu_state(&self) -> &MenuState {
        &self.menu
    }

    #[inline]
    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn set_kwp_mode(&mut self, mode: KwpMode) {
        self.kwp_mode = mode;
    }

    /// Power-on path: splash, setup flow, connect prompt.
    pub fn begin(&mut self) {
        self.display.begin(LCD_COLS, LCD_ROWS);
        self.splash();
        self.dtcs.reset();
        self.run_setup_flow();
        self.enter_wait_phase();
    }

    /// One iteration of the cooperative loop.
    pub fn tick(&mut self) {
        match self.phase {
            Phase::Setup => {
                // Re-entered after a manual exit; let the user change
                // mode/baud/address again
                self.run_setup_flow();
                self.enter_wait_phase();
                return;
            }
            Phase::WaitingForConnect => {
                // A SELECT used to exit must not immediately reconnect
                if self.clock.now_ms() < self.button_timeout_until || !self.select_pressed() {
                    return;
                }
                self.phase = Phase::Running;
                self.menu = MenuState::new();
                self.menu.mark_menu_changed();
                if self.simulation {
                    self.connected = true;
                }
            }
            Phase::Running => {}
        }

        let was_connected = self.connected;
        let now_connected = self.ensure_connected();

        // A failed connect already fell back to the prompt; only a live
        // (or simulated) link runs the tripcomputer step
        if (now_connected || was_connected || self.simulation) && self.phase == Phase::Running {
            self.service_kwp();
            self.signals
                .compute(self.clock.now_ms(), self.connect_time_start);
        }

        self.handle_input();
        self.update_display();
    }

    // =========================================================================
    // Startup & setup
    // =========================================================================

    /// Title screen; holding SELECT skips setup with the defaults.
    fn splash(&mut self) {
        self.display.clear();
        self.display.set_cursor(0, 0);
        self.display.print("K W P 1 2 8 1");
        self.display.set_cursor(1, 1);
        self.display.print("D I S P L A Y");

        let start = self.clock.now_ms();
        while self.clock.now_ms().wrapping_sub(start) < SPLASH_MS {
            if self.select_pressed() {
                self.auto_setup = true;
                break;
            }
        }

        if self.auto_setup {
            self.addr = AUTO_SETUP_ADDRESS;
            self.baud = AUTO_SETUP_BAUD_RATE;
            self.session.set_config(self.baud, self.addr);
            info!("auto setup: addr 0x{:02X}, {} Bd", self.addr, self.baud);
        }
    }

    /// Interactive selection of mode, baud rate and ECU address.
    fn run_setup_flow(&mut self) {
        // On a retry, keep the previous mode preselected
        let mut mode_choice: Option<bool> =
            (self.connection_attempts > 0).then_some(self.simulation);

        // Never carry simulated values into a real session
        self.signals.reset();
        self.dtcs.reset();

        if !self.auto_setup {
            // 1) ECU vs simulation
            self.display.clear();
            self.display.set_cursor(0, 0);
            self.display.print("Connect mode");
            self.display.set_cursor(0, 1);
            self.display.print("<- ECU");
            self.display.set_cursor(9, 1);
            self.display.print("SIM ->");

            while mode_choice.is_none() {
                match self.read_button() {
                    Button::Right => mode_choice = Some(true),
                    Button::Left => mode_choice = Some(false),
                    _ => {}
                }
                self.clock.delay_ms(10);
            }
            self.simulation = mode_choice.unwrap_or(false);

            // 2) Baud rate
            let mut baud_idx = DEFAULT_BAUD_INDEX;
            self.display.clear();
            self.display.set_cursor(0, 0);
            self.display.print("<--   Baud:  -->");
            self.print_baud_choice(SUPPORTED_BAUD_RATES[baud_idx]);

            loop {
                match self.read_button() {
                    Button::Right => {
                        baud_idx = (baud_idx + 1) % SUPPORTED_BAUD_RATES.len();
                        self.print_baud_choice(SUPPORTED_BAUD_RATES[baud_idx]);
                        self.clock.delay_ms(333);
                    }
                    Button::Left => {
                        baud_idx = baud_idx
                            .checked_sub(1)
                            .unwrap_or(SUPPORTED_BAUD_RATES.len() - 1);
                        self.print_baud_choice(SUPPORTED_BAUD_RATES[baud_idx]);
                        self.clock.delay_ms(333);
                    }
                    Button::Select => break,
                    _ => {}
                }
                self.clock.delay_ms(10);
            }
            self.baud = SUPPORTED_BAUD_RATES[baud_idx];
            self.clock.delay_ms(555);

            // 3) ECU address
            self.display.clear();
            self.display.set_cursor(0, 0);
            self.display.print("ECU address:");
            self.display.set_cursor(0, 1);
            self.display.print("<-- 01");
            self.display.set_cursor(9, 1);
            self.display.print("17 -->");

            let addr = loop {
                match self.read_button() {
                    Button::Left => break crate::config::ADDR_ENGINE,
                    Button::Right => break crate::config::ADDR_INSTRUMENTS,
                    _ => {}
                }
                self.clock.delay_ms(10);
            };
            self.addr = addr;
        }

        self.session.set_config(self.baud, self.addr);
        info!(
            "setup done: {} mode, {} Bd, addr 0x{:02X}",
            if self.simulation { "SIM" } else { "ECU" },
            self.baud,
            self.addr
        );
    }

    fn print_baud_choice(&mut self, baud: u16) {
        use core::fmt::Write as _;
        let mut text: heapless::String<10> = heapless::String::new();
        write!(text, "-> {}", baud).ok();
        while text.push(' ').is_ok() {}
        self.display.set_cursor(2, 1);
        self.display.print(&text);
    }

    fn enter_wait_phase(&mut self) {
        self.phase = Phase::WaitingForConnect;
        self.show_connect_prompt();
        self.connect_time_start = self.clock.now_ms();
        self.button_timeout_until = 0;
    }

    fn show_connect_prompt(&mut self) {
        self.display.clear();
        self.display.set_cursor(0, 0);
        self.display.print(PROMPT_ROW0);
        self.display.set_cursor(0, 1);
        self.display.print(PROMPT_ROW1);
    }

    // =========================================================================
    // Running phase
    // =========================================================================

    /// Establish the session if needed. On failure, show the error and
    /// fall back to the connect prompt.
    fn ensure_connected(&mut self) -> bool {
        if self.simulation || self.connected {
            return true;
        }
        // Without a valid configuration, keep the UI alive and do nothing
        if self.baud == 0 || self.addr == 0 {
            return false;
        }

        if let Err(e) = self.session.connect() {
            warn!("connect failed: {:?}", e);
            self.session.disconnect();
            self.connected = false;
            self.connection_attempts = self.connection_attempts.saturating_add(1);

            self.display.clear();
            self.display.set_cursor(0, 0);
            self.display.print("ECU connect ERR");
            self.display.set_cursor(0, 1);
            self.display.print("Retrying...");
            self.clock.delay_ms(ECU_TIMEOUT_MS);

            self.phase = Phase::WaitingForConnect;
            self.menu = MenuState::new();
            self.show_connect_prompt();
            return false;
        }

        self.connected = true;
        self.connection_attempts = self.connection_attempts.saturating_add(1);
        self.connect_time_start = self.clock.now_ms();
        self.menu = MenuState::new();
        self.menu.mark_menu_changed();

        // Seed one data round so the first cockpit frame is populated
        self.service_kwp();
        self.signals
            .compute(self.clock.now_ms(), self.connect_time_start);
        true
    }

    /// One KWP service round (or one simulation step).
    fn service_kwp(&mut self) {
        if self.simulation {
            self.signals.update_simulation();
            self.clock.delay_ms(SIMULATION_TICK_MS);
            return;
        }

        let result = match self.kwp_mode {
            KwpMode::Ack => self.session.keep_alive(),
            KwpMode::ReadGroup => self.session.read_group(self.kwp_group, &mut self.signals),
            KwpMode::ReadSensors => (1..=3).try_for_each(|g| {
                self.session.read_group(g, &mut self.signals)
            }),
        };

        if let Err(e) = result {
            warn!("KWP service failed: {:?}", e);
            self.session.disconnect();
            self.connected = false;
        }
    }

    // =========================================================================
    // Input
    // =========================================================================

    fn read_button(&mut self) -> Button {
        Button::from_raw(self.keypad.read_raw())
    }

    fn select_pressed(&mut self) -> bool {
        self.read_button() == Button::Select
    }

    fn handle_input(&mut self) {
        let now = self.clock.now_ms();
        if now < self.button_timeout_until {
            return;
        }

        let button = self.read_button();
        let mut actions = InputActions::default();
        if !apply_button(button, &mut self.menu, &mut actions) {
            return;
        }
        self.button_timeout_until = now.wrapping_add(BUTTON_DEBOUNCE_MS);

        if actions.request_exit {
            self.exit_session();
            return;
        }
        if actions.toggle_kwp_mode {
            self.kwp_mode = self.kwp_mode.next();
            self.menu.mark_screen_changed();
        }
        if actions.invert_group_side {
            self.signals.invert_group_side();
            self.menu.mark_screen_changed();
        }

        // The experimental screen index selects the measurement group;
        // index 0 promotes to group 1, the lowest real group
        if self.menu.current_menu() == MenuId::Experimental {
            if self.menu.screen() == 0 {
                self.menu.set_experimental_screen(1);
            }
            self.kwp_group = self.menu.screen();
            self.signals.set_experimental_group(self.kwp_group);
        }

        if actions.read_dtc {
            self.do_read_dtc();
        }
        if actions.clear_dtc {
            self.do_clear_dtc();
        }
    }

    /// Settings screen 0: end the session, return to setup.
    fn exit_session(&mut self) {
        if self.connected && !self.simulation {
            self.session.end_session().ok();
        }
        self.session.disconnect();
        self.connected = false;
        self.phase = Phase::Setup;
        // Debounce the SELECT that triggered the exit
        self.button_timeout_until = self.clock.now_ms().wrapping_add(BUTTON_DEBOUNCE_MS);
    }

    fn do_read_dtc(&mut self) {
        if self.simulation {
            self.dtcs.fill_synthetic();
            self.menu.mark_screen_changed();
            return;
        }

        match self.session.read_dtc_codes(&mut self.dtcs) {
            Ok(_) => {
                self.display.set_cursor(3, 1);
                self.display.print("<Success>");
                self.clock.delay_ms(SUCCESS_MESSAGE_MS);
                self.menu.mark_screen_changed();
            }
            Err(e) => {
                warn!("DTC read failed: {:?}", e);
                self.display.clear();
                self.display.set_cursor(0, 0);
                self.display.print("DTC read error");
                self.display.set_cursor(0, 1);
                self.display.print("Disconnecting...");
                self.clock.delay_ms(DTC_MESSAGE_MS);

                self.session.disconnect();
                self.connected = false;
                self.phase = Phase::WaitingForConnect;
                self.show_connect_prompt();
            }
        }
    }

    fn do_clear_dtc(&mut self) {
        if self.simulation {
            self.dtcs.reset();
            self.menu.mark_screen_changed();
            return;
        }

        match self.session.clear_dtc_codes() {
            Ok(()) => {
                self.dtcs.reset();
                self.display.set_cursor(3, 1);
                self.display.print("<Success>");
                self.clock.delay_ms(SUCCESS_MESSAGE_MS);
                self.menu.mark_screen_changed();
            }
            Err(e) => {
                // Not supported by this ECU, or a transient problem; the
                // session itself stays up
                warn!("DTC clear failed: {:?}", e);
                self.display.clear();
                self.display.set_cursor(0, 0);
                self.display.print("DTC delete");
                self.display.set_cursor(0, 1);
                self.display.print("Not supported");
                self.clock.delay_ms(DTC_MESSAGE_MS);
                self.menu.mark_screen_changed();
            }
        }
    }

    // =========================================================================
    // Display
    // =========================================================================

    fn update_display(&mut self) {
        let menu_changed = self.menu.consume_menu_changed();
        let screen_changed = self.menu.consume_screen_changed();
        let debug = DebugInfo {
            connected: self.connected,
            rx_pending: self.session.rx_pending(),
            block_counter: self.session.block_counter(),
            mode: self.kwp_mode,
        };

        if menu_changed || screen_changed {
            self.display.clear();
            self.renderer.init_menu(&mut self.display, &self.menu, self.addr);
            self.renderer.render(
                &mut self.display,
                self.clock.now_ms(),
                &self.menu,
                &mut self.signals,
                &self.dtcs,
                self.addr,
                &debug,
                true,
            );
            return;
        }

        self.renderer.render(
            &mut self.display,
            self.clock.now_ms(),
            &self.menu,
            &mut self.signals,
            &self.dtcs,
            self.addr,
            &debug,
            false,
        );
    }
}
