//! Core logic of the KWP1281 K-line trip display.
//!
//! This crate contains everything that does not touch hardware directly:
//! the KWP1281 session layer, the typed signal model with per-field dirty
//! bits, the menu state machine, the 16x2 screen layouts and incremental
//! renderer, and the orchestrator that ties them together. Hardware (UART,
//! LCD, keypad, wake-up line, clock) is reached only through the traits in
//! [`hal`], so the same code runs on the device and on the host.
//!
//! # Testing
//!
//! Run tests on host with:
//! ```bash
//! cargo test -p kdash-common
//! ```
//!
//! Tests run with `std` enabled (via `cfg_attr`), allowing use of the
//! standard test framework while the firmware build stays `no_std`.

// Use no_std only when NOT testing (tests need std for the test harness)
#![cfg_attr(not(test), no_std)]

pub mod app;
pub mod config;
pub mod dtc;
pub mod hal;
pub mod input;
pub mod kwp;
pub mod menu;
pub mod render;
pub mod screens;
pub mod signals;

// Re-export commonly used items
pub use app::{App, Phase};
pub use dtc::DtcStore;
pub use kwp::{KwpError, KwpMode, KwpResult};
pub use menu::{MenuId, MenuState};
pub use signals::{FieldId, SignalModel};
