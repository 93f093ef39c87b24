//! Register-level interfaces consumed by the low-power subsystem.
//!
//! `PowerRegisters` covers the power sequencer, the global control block and
//! the wake-enable registers; `Cpu` covers the two processor primitives the
//! mode transitions need. Hardware implementations live in the firmware
//! crate, simulated ones in [`crate::mocks`].

use crate::clock_config::ClockSource;
use crate::power::{Edge, GpioPort, PinMask, PowerMode, WakeLine};
use crate::voltage::{Millivolts, RailId};

/// Single-bit enables in the power and clock control registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlBit {
    /// 32 kHz reference oscillator enable.
    LowFrequencyReference,
    /// Instruction-cache controller enable.
    InstructionCache,
    /// Instruction-cache memory power.
    CacheMemoryPower,
    /// Bandgap reference powered.
    Bandgap,
    /// Fast wake-up from deep sleep.
    FastWakeup,
    /// Lets the power sequencer switch the core supply on its own.
    CoreSupplySwitchEnable,
    /// System SRAM retained in the deep modes.
    SramRetention,
    /// 96 MHz oscillator enable.
    HighFrequencyOscillator,
    /// 60 MHz RC oscillator enable.
    LowPowerOscillator,
    /// Gate the 96 MHz oscillator in deep sleep.
    GateHighFrequencyInDeepSleep,
    /// Gate the baud-rate oscillator in deep sleep.
    GateBaudRateInDeepSleep,
}

impl ControlBit {
    /// All control bits.
    pub const ALL: [ControlBit; 11] = [
        ControlBit::LowFrequencyReference,
        ControlBit::InstructionCache,
        ControlBit::CacheMemoryPower,
        ControlBit::Bandgap,
        ControlBit::FastWakeup,
        ControlBit::CoreSupplySwitchEnable,
        ControlBit::SramRetention,
        ControlBit::HighFrequencyOscillator,
        ControlBit::LowPowerOscillator,
        ControlBit::GateHighFrequencyInDeepSleep,
        ControlBit::GateBaudRateInDeepSleep,
    ];
}

/// Power, clock and wake control registers.
///
/// Every method is a single register access. Sequencing and waiting belong
/// to the caller.
pub trait PowerRegisters {
    /// Read a control bit.
    fn control(&self, bit: ControlBit) -> bool;

    /// Write a control bit.
    fn set_control(&mut self, bit: ControlBit, enabled: bool);

    /// Mode the power sequencer will enter on the next wait-for-interrupt.
    fn mode_select(&self) -> PowerMode;

    /// Program the mode for the next wait-for-interrupt.
    fn set_mode_select(&mut self, mode: PowerMode);

    /// Read one wake-enable bit.
    fn wake_enable(&self, line: WakeLine) -> bool;

    /// Write one wake-enable bit.
    fn set_wake_enable(&mut self, line: WakeLine, enabled: bool);

    /// Per-pin wake mask of a port.
    fn gpio_wake_pins(&self, port: GpioPort) -> u32;

    /// Write the per-pin wake mask of a port.
    fn set_gpio_wake_pins(&mut self, port: GpioPort, mask: u32);

    /// Configure the triggering edge of the given pins.
    fn set_gpio_wake_edge(&mut self, port: GpioPort, pins: PinMask, edge: Edge);

    /// Whether any wake flag is latched.
    fn wake_status_pending(&self) -> bool;

    /// Clear every latched wake flag (write-one-to-clear).
    fn clear_wake_status(&mut self);

    /// Programmed target level of a rail.
    fn rail_target(&self, rail: RailId) -> Millivolts;

    /// Program a rail's target level.
    fn set_rail_target(&mut self, rail: RailId, level: Millivolts);

    /// Whether a rail reports it has settled at its target.
    fn rail_ready(&self, rail: RailId) -> bool;

    /// Rail currently feeding the core.
    fn core_supply(&self) -> RailId;

    /// Select the rail feeding the core.
    fn set_core_supply(&mut self, rail: RailId);

    /// Source currently driving the system clock.
    fn system_clock(&self) -> ClockSource;

    /// Select the system clock source.
    fn set_system_clock(&mut self, source: ClockSource);

    /// Whether the selected system clock is stable.
    fn system_clock_ready(&self) -> bool;
}

/// Processor primitives used by the mode transitions.
pub trait Cpu {
    /// Set or clear the deep-sleep-only bit in the system control register.
    fn set_sleep_deep(&mut self, enabled: bool);

    /// Halt until the next interrupt or wake event.
    fn wait_for_interrupt(&mut self);

    /// Wait for the reset that ends a non-returning mode.
    fn await_restart(&mut self) -> !;
}
