//! Desktop simulator for the KWP1281 trip display.
//!
//! Runs the exact device core against a virtual instrument cluster on a
//! simulated K-line, a terminal-rendered 16x2 LCD and a scripted keypad.
//! The tour below walks the whole surface: interactive setup, connect,
//! cockpit screens, the experimental group viewer, the debug and DTC
//! menus, and a clean session exit. Time is virtual, so the run finishes
//! instantly regardless of protocol delays.
//!
//! ```bash
//! RUST_LOG=debug cargo run -p kdash-simulator
//! ```

mod ecu;
mod term;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use kdash_common::hal::{Keypad, NoWakeUp};
use kdash_common::App;
use log::info;

use crate::ecu::VirtualEcu;
use crate::term::{
    ScheduledKeypad, TermDisplay, VirtualClock, KEY_DOWN, KEY_IDLE, KEY_LEFT, KEY_RIGHT,
    KEY_SELECT, KEY_UP,
};

/// Keypad for the tour: a time schedule covers the startup flow (the
/// splash and setup loops poll continuously), a consume-once queue covers
/// everything after (the running loop samples once per tick).
#[derive(Clone)]
struct TourKeypad {
    schedule: ScheduledKeypad,
    queue: Rc<RefCell<VecDeque<u16>>>,
}

impl TourKeypad {
    fn new(schedule: ScheduledKeypad) -> Self {
        Self {
            schedule,
            queue: Rc::new(RefCell::new(VecDeque::new())),
        }
    }

    fn press(&self, raw: u16) {
        self.queue.borrow_mut().push_back(raw);
    }
}

impl Keypad for TourKeypad {
    fn read_raw(&mut self) -> u16 {
        if let Some(raw) = self.queue.borrow_mut().pop_front() {
            return raw;
        }
        self.schedule.read_raw()
    }
}

type SimApp = App<VirtualEcu, TermDisplay, TourKeypad, VirtualClock, NoWakeUp>;

fn show(caption: &str, app: &SimApp) {
    println!("\n-- {caption}");
    println!("{}", app.display().frame());
}

/// Press one key, give the core a few ticks to process and redraw.
fn press_and_run(app: &mut SimApp, keypad: &TourKeypad, raw: u16, ticks: u32) {
    keypad.press(raw);
    for _ in 0..ticks {
        app.tick();
    }
}

fn main() {
    env_logger::init();

    let clock = VirtualClock::new();
    let ecu = VirtualEcu::new(clock.handle());

    // Startup script: no key during the splash, then ECU mode (LEFT),
    // the default 9600 Bd (SELECT) and the instrument cluster (RIGHT)
    let schedule = vec![
        (0, KEY_IDLE),
        (1000, KEY_LEFT),
        (1500, KEY_IDLE),
        (2000, KEY_SELECT),
        (2500, KEY_IDLE),
        (3500, KEY_RIGHT),
        (4000, KEY_IDLE),
    ];
    let keypad = TourKeypad::new(ScheduledKeypad::new(clock.clone(), schedule));

    let mut app = App::new(
        ecu,
        TermDisplay::new(),
        keypad.clone(),
        clock.clone(),
        NoWakeUp,
    );

    info!("starting setup flow");
    app.begin();
    show("after setup: waiting for connect", &app);

    info!("connecting");
    press_and_run(&mut app, &keypad, KEY_SELECT, 4);
    show("cockpit, screen 0", &app);

    press_and_run(&mut app, &keypad, KEY_UP, 3);
    show("cockpit, screen 1", &app);

    press_and_run(&mut app, &keypad, KEY_DOWN, 3);
    press_and_run(&mut app, &keypad, KEY_RIGHT, 3);
    show("experimental group viewer", &app);

    press_and_run(&mut app, &keypad, KEY_SELECT, 3);
    show("experimental, other slot pair", &app);

    press_and_run(&mut app, &keypad, KEY_RIGHT, 3);
    show("debug: link state", &app);

    press_and_run(&mut app, &keypad, KEY_RIGHT, 3);
    show("DTC menu", &app);

    info!("reading trouble codes");
    press_and_run(&mut app, &keypad, KEY_SELECT, 3);
    press_and_run(&mut app, &keypad, KEY_UP, 2);
    press_and_run(&mut app, &keypad, KEY_UP, 3);
    show("stored trouble codes", &app);

    info!("ending the session");
    press_and_run(&mut app, &keypad, KEY_RIGHT, 2);
    // Re-run of the setup flow after the exit: keep 9600, pick 0x17 again
    keypad.press(KEY_SELECT);
    keypad.press(KEY_SELECT);
    keypad.press(KEY_RIGHT);
    for _ in 0..3 {
        app.tick();
    }
    show("after exit: back at the connect prompt", &app);

    info!("tour complete at t = {} ms (virtual)", clock.peek());
}
