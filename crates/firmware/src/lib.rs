//! Low-power firmware application layer
//!
//! Binds the `lowpower` subsystem to a processor and gives callers the
//! retry policy the subsystem itself leaves out.
//!
//! # Architecture
//!
//! ```text
//! Application Layer (this crate, dualcore_sim)
//!         ↓
//! Low-power subsystem (lowpower)
//!         ↓
//! Platform HAL (platform)
//!         ↓
//! Cortex-M core peripherals / simulated registers
//! ```
//!
//! # Features
//!
//! - `hardware` - Cortex-M [`Cpu`](platform::Cpu) built on `cortex-m`
//! - `emulator` - Desktop two-core emulator (tokio, tracing)
//! - `std` - Enable standard library (for emulator and testing)
//!
//! # Examples
//!
//! ## Emulator Target
//!
//! ```bash
//! RUST_LOG=debug cargo run -p firmware --bin dualcore_sim --features emulator
//! ```

#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
// Upgrade relevant warns to deny; keep pedantic as warn (too noisy for firmware)
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)]
// unsafe fn body is not implicitly unsafe block
// Logging discipline (allow println in tests via clippy.toml)
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
#![warn(clippy::dbg_macro)] // dbg! should not be left in committed code
// Intentional allows for this codebase:
#![allow(clippy::module_name_repetitions)] // common in Rust crates; not a real issue
#![allow(clippy::missing_errors_doc)] // most errors are self-explanatory
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

// Must come first so the logging macros are visible to every module.
#[macro_use]
mod fmt;

pub mod retry;

#[cfg(feature = "hardware")]
pub mod cpu;

#[cfg(feature = "emulator")]
pub mod emulator;

pub use retry::{request_with_retry, RetryPolicy};

#[cfg(feature = "hardware")]
pub use cpu::CortexMCpu;

#[cfg(feature = "emulator")]
pub use emulator::HostCpu;
