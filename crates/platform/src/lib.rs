//! Hardware Abstraction Layer (HAL) for the dual-core low-power subsystem
//!
//! This crate provides the register-level interfaces the low-power
//! subsystem drives, the domain types that flow through them, and
//! simulated implementations for host testing.
//!
//! # Architecture Layers
//!
//! ```text
//! Application Layer (firmware crate)
//!         ↓
//! Low-power subsystem (lowpower crate)
//!         ↓
//! Platform HAL (this crate - register interfaces)
//!         ↓
//! Hardware Layer (cortex-m + PAC register access)
//! ```
//!
//! # Interfaces
//!
//! - [`PowerRegisters`] - power sequencer, clock mux and wake enables
//! - [`Cpu`] - deep-sleep bit, wait-for-interrupt, reset
//! - [`InterCoreMailbox`] - mailbox words and hardware semaphores
//! - [`Deadline`] - bound on every busy-wait
//!
//! # Features
//!
//! - `std`: Enable standard library support and the [`mocks`] module
//! - `defmt`: Enable defmt logging
//!
//! # Example
//!
//! ```
//! use platform::{PowerMode, Resources};
//!
//! let deep = PowerMode::DeepSleep.retention();
//! assert!(deep.is_subset_of(PowerMode::Standby.retention()));
//! assert!(deep.contains(Resources::SRAM));
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
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
// Pedantic lints suppressed for this hardware HAL crate:
#![allow(clippy::doc_markdown)] // hex addresses and register names in doc comments
#![allow(clippy::missing_panics_doc)] // statically-valid expect() with safety comments
#![allow(clippy::must_use_candidate)] // hardware accessors; callers decide
#![allow(clippy::match_same_arms)] // intentional for readability in register tables
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

#[cfg(feature = "std")]
extern crate std;

pub mod clock_config;
pub mod config;
pub mod deadline;
pub mod mailbox;
pub mod power;
pub mod range;
pub mod registers;
pub mod voltage;

#[cfg(any(test, feature = "std"))]
pub mod mocks;

pub use clock_config::{ClockSource, DeepSleepClockGates};
pub use deadline::{poll_until, Deadline, Expired, Forever, SpinBudget, TimeDeadline};
pub use mailbox::{CoreId, InterCoreMailbox, SemaphoreId};
pub use power::{
    ComparatorChannel, Edge, GpioPort, PinMask, PowerMode, Resources, TimerInstance, WakeLine,
    WakeSource,
};
pub use range::OutOfRangeError;
pub use registers::{ControlBit, Cpu, PowerRegisters};
pub use voltage::{Millivolts, OperatingVoltage, RailId};
