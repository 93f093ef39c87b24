//! Low-power mode subsystem for the dual-core MCU
//!
//! Sequences the device between ACTIVE and its seven low-power modes,
//! keeps the voltage rails and the system clock in a safe order around
//! deep sleep, and arbitrates with the peer core before collapsing a
//! shared power domain.
//!
//! # Components
//!
//! - [`WakeRegistry`] - arm and disarm wake sources
//! - [`RailSequencer`] - rail levels and core-supply selection
//! - [`PowerModeController`] - mode entry, deep-sleep prepare/recover
//! - [`DualCoreArbiter`] - mailbox + semaphore consent handshake
//!
//! # Features
//!
//! - `std`: Enable simulated hardware from `platform` for host builds
//! - `defmt`: Log through defmt (target)
//! - `tracing`: Log through tracing (desktop emulator)
//!
//! # Example
//!
//! ```
//! use lowpower::{PowerConfig, PowerModeController};
//! use platform::mocks::{SimCpu, SimRegisters};
//! use platform::{Forever, PowerMode};
//!
//! let regs = SimRegisters::new();
//! let cpu = SimCpu::new(regs.clone());
//! let mut ctl = PowerModeController::new(regs, cpu, PowerConfig::default())?;
//! ctl.enter(PowerMode::DeepSleep, &mut Forever)?;
//! assert_eq!(ctl.mode(), PowerMode::Active);
//! # Ok::<(), lowpower::LpError>(())
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
#![allow(clippy::doc_markdown)] // register and mode names in doc comments
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

// Must come first so the logging macros are visible to every module.
#[macro_use]
mod fmt;

pub mod config;
pub mod deep_sleep;
pub mod dualcore;
pub mod error;
pub mod mode;
pub mod rail;
pub mod wake;

pub use config::PowerConfig;
pub use deep_sleep::{DeepSleepContext, RecoveryPath};
pub use dualcore::{DualCoreArbiter, HandlerOutcome, Phase, ReadinessCheck};
pub use error::{LpError, NotOurEvent, WaitSite};
pub use mode::PowerModeController;
pub use rail::{RailSequencer, RailState};
pub use wake::{ArmedSet, WakeRegistry};
