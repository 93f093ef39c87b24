//! Per-board tuning of the low-power sequences.

use platform::config::{DEEPSLEEP_VOLTAGE_MV, RUN_VOLTAGE_MV};
use platform::{ClockSource, Millivolts, RailId};

use crate::error::LpError;

/// Levels, rails and clocks used by the mode transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerConfig {
    /// Core rail level while running from the high-frequency oscillator.
    pub run_voltage: Millivolts,
    /// Core rail level held during deep sleep.
    pub deep_sleep_voltage: Millivolts,
    /// Rail that feeds the core in run mode and is lowered for deep sleep.
    pub core_rail: RailId,
    /// Rail the hardware may hold the core on across a deep-sleep wake.
    pub high_rail: RailId,
    /// Clock the core drops to before the core rail is lowered.
    pub low_power_clock: ClockSource,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            run_voltage: Millivolts::new(RUN_VOLTAGE_MV),
            deep_sleep_voltage: Millivolts::new(DEEPSLEEP_VOLTAGE_MV),
            core_rail: RailId::VcoreB,
            high_rail: RailId::VcoreA,
            low_power_clock: ClockSource::LowPower,
        }
    }
}

impl PowerConfig {
    /// Check the configuration is internally consistent.
    ///
    /// # Errors
    ///
    /// [`LpError::BadParam`] if the deep-sleep level exceeds the run level,
    /// the two rails are the same, or the low-power clock is the
    /// high-frequency oscillator.
    pub fn validate(&self) -> Result<(), LpError> {
        if self.deep_sleep_voltage > self.run_voltage
            || self.core_rail == self.high_rail
            || self.low_power_clock == ClockSource::HighFrequency
        {
            return Err(LpError::BadParam);
        }
        Ok(())
    }
}
