//! System clock sources and deep-sleep oscillator gating.
//!
//! The core runs from the 96 MHz internal oscillator. Before the core rail
//! is lowered it must drop to the low-power path (60 MHz internal RC
//! divided by 4), and it must only return to 96 MHz after the rail is back
//! at its run level.
//!
//! # Sources
//!
//! - MAX32665 User Guide, section 4 (clock tree) and section 6 (power modes)

use crate::registers::ControlBit;

/// Sources the system clock mux can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockSource {
    /// Internal 96 MHz oscillator.
    HighFrequency,
    /// Internal 60 MHz RC oscillator through the divide-by-4 prescaler.
    LowPower,
}

impl ClockSource {
    /// Resulting core clock frequency in Hz.
    #[must_use]
    pub const fn frequency_hz(self) -> u32 {
        match self {
            Self::HighFrequency => 96_000_000,
            Self::LowPower => 15_000_000,
        }
    }

    /// Oscillator-enable bit that must be set before selecting this source.
    #[must_use]
    pub const fn oscillator(self) -> ControlBit {
        match self {
            Self::HighFrequency => ControlBit::HighFrequencyOscillator,
            Self::LowPower => ControlBit::LowPowerOscillator,
        }
    }
}

impl core::fmt::Display for ClockSource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::HighFrequency => "IPO 96 MHz",
            Self::LowPower => "HIRC/4 15 MHz",
        })
    }
}

/// Oscillators that are powered down while the device sits in deep sleep.
///
/// At least one of the two must be gated; the hardware rejects a
/// configuration that keeps both running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeepSleepClockGates {
    /// Gate the 96 MHz oscillator.
    pub high_frequency: bool,
    /// Gate the 7.3728 MHz baud-rate oscillator.
    pub baud_rate: bool,
}

impl DeepSleepClockGates {
    /// Whether no oscillator is selected.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        !self.high_frequency && !self.baud_rate
    }

    /// Register bits and the state each should be written to.
    #[must_use]
    pub const fn bits(self) -> [(ControlBit, bool); 2] {
        [
            (ControlBit::GateHighFrequencyInDeepSleep, self.high_frequency),
            (ControlBit::GateBaudRateInDeepSleep, self.baud_rate),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_power_path_is_slower() {
        assert!(ClockSource::LowPower.frequency_hz() < ClockSource::HighFrequency.frequency_hz());
    }

    #[test]
    fn each_source_has_its_own_oscillator() {
        assert_ne!(
            ClockSource::LowPower.oscillator(),
            ClockSource::HighFrequency.oscillator()
        );
    }

    #[test]
    fn default_gates_are_empty() {
        assert!(DeepSleepClockGates::default().is_empty());
        assert!(!DeepSleepClockGates {
            high_frequency: true,
            baud_rate: false
        }
        .is_empty());
    }
}
