//! Deep-sleep preparation and recovery
//!
//! Prepare drops the core to the low-power clock and lowers the core rail
//! to its retention level. Recover brings the rail back before the clock,
//! so the core never runs at 96 MHz on a lowered rail.
//!
//! Both halves are bounded by a [`Deadline`]. Prepare undoes every step
//! it applied when a wait expires; Recover stops where it is and leaves
//! the core on whichever rail is currently selected.

use platform::{
    ClockSource, ControlBit, Cpu, Deadline, Millivolts, PowerMode, PowerRegisters, RailId,
    Resources,
};

use crate::config::PowerConfig;
use crate::error::LpError;
use crate::mode::PowerModeController;
use crate::wake::ArmedSet;

/// Control bits saved by prepare and restored by recover, in restore order.
///
/// Cache memory is powered before the cache controller is enabled.
const SAVED_BITS: [ControlBit; 8] = [
    ControlBit::CacheMemoryPower,
    ControlBit::InstructionCache,
    ControlBit::Bandgap,
    ControlBit::FastWakeup,
    ControlBit::SramRetention,
    ControlBit::CoreSupplySwitchEnable,
    ControlBit::HighFrequencyOscillator,
    ControlBit::LowPowerOscillator,
];

/// Run-mode state captured before deep sleep.
#[must_use = "the context is needed to recover from deep sleep"]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeepSleepContext {
    controls: [(ControlBit, bool); 8],
    clock: ClockSource,
    core_rail: RailId,
    run_level: Millivolts,
    core_supply: RailId,
}

impl DeepSleepContext {
    fn capture<R: PowerRegisters + ?Sized>(regs: &R, config: &PowerConfig) -> Self {
        Self {
            controls: SAVED_BITS.map(|bit| (bit, regs.control(bit))),
            clock: regs.system_clock(),
            core_rail: config.core_rail,
            run_level: config.run_voltage,
            core_supply: regs.core_supply(),
        }
    }

    /// System clock source in run mode.
    pub fn clock(&self) -> ClockSource {
        self.clock
    }

    /// Core rail level in run mode.
    pub fn run_level(&self) -> Millivolts {
        self.run_level
    }

    /// Rail feeding the core in run mode.
    pub fn core_supply(&self) -> RailId {
        self.core_supply
    }

    /// Whether `bit` was set in run mode. `None` for bits not saved.
    pub fn was_set(&self, bit: ControlBit) -> Option<bool> {
        self.controls
            .iter()
            .find(|(saved, _)| *saved == bit)
            .map(|(_, on)| *on)
    }
}

/// Branch taken by [`PowerModeController::recover_from_deep_sleep`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecoveryPath {
    /// The core ran from the lowered core rail; it was raised back to its
    /// run level before the clock was restored.
    RaisedCoreRail,
    /// The hardware held the core on the high rail, so the low-rail raise
    /// was skipped and the high rail selected directly.
    HighRailReady,
}

impl<R: PowerRegisters, C: Cpu> PowerModeController<R, C> {
    /// Bring the device into a state from which DEEPSLEEP is safe.
    ///
    /// If an earlier wake left the core on the high rail, the core rail is
    /// first raised to the run level and the core moved back onto it. Then
    /// every resource [`PowerMode::DeepSleep`] does not retain, and no armed
    /// wake line needs, is released: the caches, the bandgap, the
    /// high-frequency clock and the core rail run level. Fast wake-up is
    /// disabled, SRAM retention requested and the hardware allowed to
    /// switch the core supply.
    ///
    /// # Errors
    ///
    /// - [`LpError::Timeout`] if the clock or a rail does not settle. Every
    ///   step already applied is undone and the mode must not be entered.
    /// - [`LpError::RailNotReady`] if the core rail cannot take the core
    ///   back from the high rail.
    pub fn prepare_deep_sleep<D: Deadline + ?Sized>(
        &mut self,
        deadline: &mut D,
    ) -> Result<DeepSleepContext, LpError> {
        deadline.rearm();
        self.return_to_core_rail(deadline)?;
        let core = self.config.core_rail;
        let ctx = DeepSleepContext::capture(&self.regs, &self.config);
        let keep = PowerMode::DeepSleep
            .retention()
            .with(ArmedSet::read(&self.regs).requires());
        info!("preparing deep sleep");

        if !keep.contains(Resources::INSTRUCTION_CACHE) {
            self.regs.set_control(ControlBit::InstructionCache, false);
            self.regs.set_control(ControlBit::CacheMemoryPower, false);
        }
        if keep.contains(Resources::BACKGROUND_ANALOG) {
            debug!("bandgap kept on for comparator wake");
        } else {
            self.regs.set_control(ControlBit::Bandgap, false);
        }
        self.regs.set_control(ControlBit::FastWakeup, false);
        self.regs
            .set_control(ControlBit::SramRetention, keep.contains(Resources::SRAM));
        self.regs.set_control(ControlBit::CoreSupplySwitchEnable, true);

        let low_power_clock = self.config.low_power_clock;
        if let Err(e) = self.switch_clock(low_power_clock, deadline) {
            warn!("deep sleep prepare aborted: {}", e);
            self.undo_prepare(&ctx);
            return Err(e);
        }
        if !keep.contains(Resources::HIGH_FREQ_CLOCK) {
            self.regs.set_control(ControlBit::HighFrequencyOscillator, false);
        }

        if !keep.contains(Resources::CORE_RAIL_RUN_LEVEL) {
            let level = self.config.deep_sleep_voltage;
            if let Err(e) = self.rails().set_level(core, level, deadline) {
                warn!("deep sleep prepare aborted: {}", e);
                self.undo_prepare(&ctx);
                return Err(e);
            }
        }
        Ok(ctx)
    }

    /// Move the core off the high rail after a wake that kept it there.
    ///
    /// The core rail is brought to the run level first, so the core is
    /// never switched onto a rail below it.
    fn return_to_core_rail<D: Deadline + ?Sized>(
        &mut self,
        deadline: &mut D,
    ) -> Result<(), LpError> {
        let core = self.config.core_rail;
        if self.regs.core_supply() == core {
            return Ok(());
        }
        let run = self.config.run_voltage;
        info!("moving the core back to {} at {}", core, run);
        let mut rails = self.rails();
        rails.set_level(core, run, deadline)?;
        rails.switch_core_supply(core, deadline)
    }

    /// Restore run mode after a deep-sleep wake.
    ///
    /// If the high rail is already ready the hardware kept the core on it:
    /// the high rail is selected directly and the core rail is left at its
    /// retention level until the next prepare. Otherwise the core rail is
    /// confirmed, raised to the configured run voltage and selected. Caches
    /// are then re-enabled and the clock switched back.
    ///
    /// # Errors
    ///
    /// - [`LpError::Timeout`] if a rail or the clock does not settle. The
    ///   core stays on the rail currently selected.
    /// - [`LpError::RailNotReady`] if the rail to select is not ready.
    pub fn recover_from_deep_sleep<D: Deadline + ?Sized>(
        &mut self,
        ctx: DeepSleepContext,
        deadline: &mut D,
    ) -> Result<RecoveryPath, LpError> {
        deadline.rearm();
        let high = self.config.high_rail;
        let core = ctx.core_rail;
        let run = self.config.run_voltage;

        let path = if self.regs.rail_ready(high) {
            info!("{} already ready, selecting it directly", high);
            self.rails().switch_core_supply(high, deadline)?;
            RecoveryPath::HighRailReady
        } else {
            let mut rails = self.rails();
            rails.wait_ready(core, deadline)?;
            rails.set_level(core, run, deadline)?;
            rails.switch_core_supply(core, deadline)?;
            RecoveryPath::RaisedCoreRail
        };

        for bit in [ControlBit::CacheMemoryPower, ControlBit::InstructionCache] {
            if let Some(on) = ctx.was_set(bit) {
                self.regs.set_control(bit, on);
            }
        }
        self.switch_clock(ctx.clock, deadline)?;
        self.restore_controls(&ctx);
        info!("recovered from deep sleep at {} Hz", self.core_clock_hz());
        Ok(path)
    }

    /// Prepare, enter DEEPSLEEP, and recover once a wake source fires.
    ///
    /// # Errors
    ///
    /// Errors from [`PowerModeController::prepare_deep_sleep`] (the mode is
    /// not entered) or [`PowerModeController::recover_from_deep_sleep`].
    pub fn deep_sleep_cycle<D: Deadline + ?Sized>(
        &mut self,
        deadline: &mut D,
    ) -> Result<RecoveryPath, LpError> {
        let ctx = self.prepare_deep_sleep(deadline)?;
        self.enter_deep_sleep();
        self.recover_from_deep_sleep(ctx, deadline)
    }

    fn undo_prepare(&mut self, ctx: &DeepSleepContext) {
        self.select_clock(ctx.clock);
        self.restore_controls(ctx);
    }

    fn restore_controls(&mut self, ctx: &DeepSleepContext) {
        for (bit, on) in ctx.controls {
            self.regs.set_control(bit, on);
        }
    }
}
