//! Power-mode state machine
//!
//! Owns the register block and the processor and drives them through the
//! entry sequence of each mode. Every entry clears latched wake flags before
//! halting, so a stale flag can never cause an immediate spurious wake.
//!
//! ```text
//!            enter_sleep / enter_low_power / ... / deep_sleep_cycle
//!   ACTIVE ──────────────────────────────────────────────────────────▶ mode
//!     ▲                                                                 │
//!     └──────────────────────────── wake event ─────────────────────────┘
//!
//!   ACTIVE ── enter_backup / enter_power_down ──▶ (reset)
//! ```

use platform::{
    poll_until, ClockSource, ControlBit, Cpu, Deadline, DeepSleepClockGates, OperatingVoltage,
    PowerMode, PowerRegisters, Resources,
};

use crate::config::PowerConfig;
use crate::error::{LpError, WaitSite};
use crate::rail::RailSequencer;
use crate::wake::{ArmedSet, WakeRegistry};

/// Blocks a returning mode powers down for the stay when it does not
/// retain the resource they provide.
const GATEABLE: [(Resources, ControlBit); 2] = [
    (Resources::INSTRUCTION_CACHE, ControlBit::InstructionCache),
    (Resources::BACKGROUND_ANALOG, ControlBit::Bandgap),
];

/// Drives the device between power modes.
pub struct PowerModeController<R, C> {
    pub(crate) regs: R,
    cpu: C,
    pub(crate) config: PowerConfig,
    mode: PowerMode,
    core_clock_hz: u32,
}

impl<R: PowerRegisters, C: Cpu> PowerModeController<R, C> {
    /// Take ownership of the registers and the processor.
    ///
    /// # Errors
    ///
    /// [`LpError::BadParam`] if `config` fails [`PowerConfig::validate`].
    pub fn new(regs: R, cpu: C, config: PowerConfig) -> Result<Self, LpError> {
        config.validate()?;
        let core_clock_hz = regs.system_clock().frequency_hz();
        Ok(Self {
            regs,
            cpu,
            config,
            mode: PowerMode::Active,
            core_clock_hz,
        })
    }

    /// Mode the device is currently in, as seen from this core.
    pub fn mode(&self) -> PowerMode {
        self.mode
    }

    /// Cached core clock frequency in Hz.
    ///
    /// Updated on every system clock switch.
    pub fn core_clock_hz(&self) -> u32 {
        self.core_clock_hz
    }

    /// Active configuration.
    pub fn config(&self) -> &PowerConfig {
        &self.config
    }

    /// Register block.
    pub fn registers(&self) -> &R {
        &self.regs
    }

    /// Processor.
    pub fn cpu(&self) -> &C {
        &self.cpu
    }

    /// Mutable access to the processor.
    pub fn cpu_mut(&mut self) -> &mut C {
        &mut self.cpu
    }

    /// Give back the registers and the processor.
    pub fn into_parts(self) -> (R, C) {
        (self.regs, self.cpu)
    }

    /// Wake-source registry over this controller's registers.
    pub fn wake_sources(&mut self) -> WakeRegistry<'_, R> {
        WakeRegistry::new(&mut self.regs)
    }

    /// Rail sequencer over this controller's registers.
    pub fn rails(&mut self) -> RailSequencer<'_, R> {
        RailSequencer::new(&mut self.regs)
    }

    // ── Background analog and clock gating ──────────────────────────────────

    /// Power the bandgap reference and the analog blocks it feeds.
    pub fn set_bandgap(&mut self, on: bool) {
        self.regs.set_control(ControlBit::Bandgap, on);
    }

    /// Whether the bandgap reference is powered.
    pub fn bandgap_enabled(&self) -> bool {
        self.regs.control(ControlBit::Bandgap)
    }

    /// Choose which oscillators are powered down in deep sleep.
    ///
    /// Overwrites any earlier selection.
    ///
    /// # Errors
    ///
    /// [`LpError::BadParam`] if `gates` selects no oscillator.
    pub fn configure_deep_sleep_clocks(
        &mut self,
        gates: DeepSleepClockGates,
    ) -> Result<(), LpError> {
        if gates.is_empty() {
            return Err(LpError::BadParam);
        }
        for (bit, gated) in gates.bits() {
            self.regs.set_control(bit, gated);
        }
        Ok(())
    }

    /// Move the core rail to a run-mode operating point.
    ///
    /// The new level becomes the run voltage restored after deep sleep.
    ///
    /// # Errors
    ///
    /// - [`LpError::BadParam`] if the point is below the deep-sleep level.
    /// - [`LpError::Timeout`] if the rail does not settle; the previous
    ///   level is written back.
    pub fn set_operating_voltage<D: Deadline + ?Sized>(
        &mut self,
        point: OperatingVoltage,
        deadline: &mut D,
    ) -> Result<(), LpError> {
        let level = point.level();
        if level < self.config.deep_sleep_voltage {
            return Err(LpError::BadParam);
        }
        let core = self.config.core_rail;
        self.rails().set_level(core, level, deadline)?;
        self.config.run_voltage = level;
        info!("operating voltage {}", level);
        Ok(())
    }

    // ── Returning modes ─────────────────────────────────────────────────────

    /// Halt the CPU until the next interrupt. Clocks and peripherals keep
    /// running.
    pub fn enter_sleep(&mut self) {
        self.regs.clear_wake_status();
        self.cpu.set_sleep_deep(PowerMode::Sleep.uses_sleep_deep());
        self.halt(PowerMode::Sleep);
    }

    /// Enter LOW_POWER: CPU off, high-frequency peripherals running.
    pub fn enter_low_power(&mut self) {
        self.enter_retentive(PowerMode::LowPower);
    }

    /// Enter MICRO_POWER: high-frequency clock gated.
    pub fn enter_micro_power(&mut self) {
        self.enter_retentive(PowerMode::MicroPower);
    }

    /// Enter STANDBY: only the low-frequency domain and retained state.
    pub fn enter_standby(&mut self) {
        self.enter_retentive(PowerMode::Standby);
    }

    /// Enter DEEPSLEEP without preparation.
    ///
    /// Use [`PowerModeController::deep_sleep_cycle`] unless the caller has
    /// already run [`PowerModeController::prepare_deep_sleep`].
    pub fn enter_deep_sleep(&mut self) {
        self.regs.clear_wake_status();
        if ArmedSet::read(&self.regs)
            .requires()
            .contains(Resources::LOW_FREQ_REFERENCE)
        {
            self.regs.set_control(ControlBit::LowFrequencyReference, true);
        }
        self.cpu.set_sleep_deep(PowerMode::DeepSleep.uses_sleep_deep());
        self.regs.set_mode_select(PowerMode::DeepSleep);
        self.halt(PowerMode::DeepSleep);
        self.cpu.set_sleep_deep(false);
    }

    /// LOW_POWER, MICRO_POWER and STANDBY.
    ///
    /// What stays powered follows [`PowerMode::retention`] plus whatever
    /// the armed wake lines need. Gated blocks are powered again on wake.
    fn enter_retentive(&mut self, mode: PowerMode) {
        self.regs.clear_wake_status();
        let keep = mode
            .retention()
            .with(ArmedSet::read(&self.regs).requires());
        if keep.contains(Resources::LOW_FREQ_REFERENCE) {
            self.regs.set_control(ControlBit::LowFrequencyReference, true);
        }
        // The mode code gates the high-frequency clock in hardware.
        let mut gated = [None; GATEABLE.len()];
        for (slot, (resource, bit)) in gated.iter_mut().zip(GATEABLE) {
            if !keep.contains(resource) && self.regs.control(bit) {
                self.regs.set_control(bit, false);
                *slot = Some(bit);
            }
        }
        self.cpu.set_sleep_deep(mode.uses_sleep_deep());
        self.regs.set_mode_select(mode);
        self.halt(mode);
        self.cpu.set_sleep_deep(false);
        for bit in gated.into_iter().flatten() {
            self.regs.set_control(bit, true);
        }
    }

    fn halt(&mut self, mode: PowerMode) {
        self.mode = mode;
        info!("entering {}", mode);
        self.cpu.wait_for_interrupt();
        self.mode = PowerMode::Active;
        debug!("woke from {}", mode);
    }

    // ── Non-returning modes ─────────────────────────────────────────────────

    /// Enter BACKUP. Execution resumes only through reset.
    pub fn enter_backup(&mut self) -> ! {
        self.enter_terminal(PowerMode::Backup)
    }

    /// Enter POWERDOWN. Execution resumes only through reset.
    pub fn enter_power_down(&mut self) -> ! {
        self.enter_terminal(PowerMode::PowerDown)
    }

    fn enter_terminal(&mut self, mode: PowerMode) -> ! {
        self.regs.clear_wake_status();
        self.cpu.set_sleep_deep(mode.uses_sleep_deep());
        self.mode = mode;
        info!("entering {}, exit through reset", mode);
        self.regs.set_mode_select(mode);
        self.cpu.await_restart()
    }

    // ── Dispatch ────────────────────────────────────────────────────────────

    /// Enter `mode` through its entry sequence.
    ///
    /// DEEPSLEEP runs the full prepare, enter and recover cycle. ACTIVE is a
    /// no-op. BACKUP and POWERDOWN do not return.
    ///
    /// # Errors
    ///
    /// Only DEEPSLEEP can fail; see
    /// [`PowerModeController::deep_sleep_cycle`].
    pub fn enter<D: Deadline + ?Sized>(
        &mut self,
        mode: PowerMode,
        deadline: &mut D,
    ) -> Result<(), LpError> {
        match mode {
            PowerMode::Active => {}
            PowerMode::Sleep => self.enter_sleep(),
            PowerMode::LowPower => self.enter_low_power(),
            PowerMode::MicroPower => self.enter_micro_power(),
            PowerMode::Standby => self.enter_standby(),
            PowerMode::DeepSleep => {
                self.deep_sleep_cycle(deadline)?;
            }
            PowerMode::Backup => self.enter_backup(),
            PowerMode::PowerDown => self.enter_power_down(),
        }
        Ok(())
    }

    // ── Clock switching ─────────────────────────────────────────────────────

    /// Select `source` and wait for it to stabilise.
    ///
    /// The clock cache follows the selection immediately.
    pub(crate) fn switch_clock<D: Deadline + ?Sized>(
        &mut self,
        source: ClockSource,
        deadline: &mut D,
    ) -> Result<(), LpError> {
        self.regs.set_control(source.oscillator(), true);
        self.regs.set_system_clock(source);
        self.core_clock_hz = source.frequency_hz();
        let regs = &self.regs;
        poll_until(deadline, || regs.system_clock_ready())
            .map_err(|_| LpError::Timeout(WaitSite::ClockReady))?;
        debug!("system clock {}", source);
        Ok(())
    }

    /// Select `source` without waiting for it to stabilise.
    pub(crate) fn select_clock(&mut self, source: ClockSource) {
        self.regs.set_control(source.oscillator(), true);
        self.regs.set_system_clock(source);
        self.core_clock_hz = source.frequency_hz();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use platform::mocks::{SimCpu, SimEvent, SimRegisters};
    use platform::Forever;

    fn controller() -> (SimRegisters, PowerModeController<SimRegisters, SimCpu>) {
        let regs = SimRegisters::new();
        let cpu = SimCpu::new(regs.clone());
        let ctl = PowerModeController::new(regs.clone(), cpu, PowerConfig::default()).unwrap();
        (regs, ctl)
    }

    #[test]
    fn invalid_config_rejected() {
        let regs = SimRegisters::new();
        let cpu = SimCpu::new(regs.clone());
        let cfg = PowerConfig {
            high_rail: platform::RailId::VcoreB,
            ..PowerConfig::default()
        };
        assert!(matches!(
            PowerModeController::new(regs, cpu, cfg),
            Err(LpError::BadParam)
        ));
    }

    #[test]
    fn clock_cache_starts_from_selected_source() {
        let (_, ctl) = controller();
        assert_eq!(ctl.core_clock_hz(), 96_000_000);
    }

    #[test]
    fn sleep_clears_wake_status_then_halts_without_sleep_deep() {
        let (regs, mut ctl) = controller();
        regs.with(|f| f.set_wake_pending(true));
        ctl.enter_sleep();
        let events = regs.take_events();
        assert_eq!(
            events,
            [
                SimEvent::ClearWakeStatus,
                SimEvent::SleepDeep(false),
                SimEvent::WaitForInterrupt(PowerMode::Active),
            ]
        );
        assert_eq!(ctl.cpu().spurious_wakes(), 0);
        assert_eq!(ctl.mode(), PowerMode::Active);
    }

    #[test]
    fn retentive_modes_enable_low_frequency_reference() {
        type Ctl = PowerModeController<SimRegisters, SimCpu>;
        let cases: [(fn(&mut Ctl), PowerMode); 3] = [
            (Ctl::enter_low_power, PowerMode::LowPower),
            (Ctl::enter_micro_power, PowerMode::MicroPower),
            (Ctl::enter_standby, PowerMode::Standby),
        ];
        for (enter, mode) in cases {
            let (regs, mut ctl) = controller();
            enter(&mut ctl);
            let events = regs.take_events();
            assert_eq!(events.first(), Some(&SimEvent::ClearWakeStatus));
            assert!(events.contains(&SimEvent::Control(ControlBit::LowFrequencyReference, true)));
            assert!(events.contains(&SimEvent::WaitForInterrupt(mode)));
            assert!(events.contains(&SimEvent::SleepDeep(true)));
            assert_eq!(regs.mode_select(), PowerMode::Active);
            assert_eq!(ctl.cpu().wfi_count(), 1);
            assert!(!ctl.cpu().sleep_deep());
        }
    }

    #[test]
    fn standby_gates_instruction_cache_for_the_stay() {
        let (regs, mut ctl) = controller();
        let cached = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen = std::sync::Arc::clone(&cached);
        ctl.cpu_mut().on_sleep(move |f| {
            let on = f.snapshot().controls.contains(&ControlBit::InstructionCache);
            seen.lock().unwrap().push(on);
        });

        ctl.enter_low_power();
        ctl.enter_micro_power();
        ctl.enter_standby();

        assert_eq!(*cached.lock().unwrap(), [true, true, false]);
        assert!(regs.control(ControlBit::InstructionCache));
        assert!(regs.control(ControlBit::Bandgap));
    }

    #[test]
    fn enter_active_is_noop() {
        let (regs, mut ctl) = controller();
        ctl.enter(PowerMode::Active, &mut Forever).unwrap();
        assert!(regs.take_events().is_empty());
    }

    #[test]
    fn deep_sleep_clock_gating_requires_a_selection() {
        let (regs, mut ctl) = controller();
        assert_eq!(
            ctl.configure_deep_sleep_clocks(DeepSleepClockGates::default()),
            Err(LpError::BadParam)
        );
        ctl.configure_deep_sleep_clocks(DeepSleepClockGates {
            high_frequency: true,
            baud_rate: false,
        })
        .unwrap();
        assert!(regs.control(ControlBit::GateHighFrequencyInDeepSleep));
        ctl.configure_deep_sleep_clocks(DeepSleepClockGates {
            high_frequency: false,
            baud_rate: true,
        })
        .unwrap();
        assert!(!regs.control(ControlBit::GateHighFrequencyInDeepSleep));
        assert!(regs.control(ControlBit::GateBaudRateInDeepSleep));
    }

    #[test]
    fn bandgap_toggles() {
        let (_, mut ctl) = controller();
        assert!(ctl.bandgap_enabled());
        ctl.set_bandgap(false);
        assert!(!ctl.bandgap_enabled());
    }

    #[test]
    fn operating_voltage_moves_core_rail_and_run_level() {
        let (regs, mut ctl) = controller();
        ctl.set_operating_voltage(OperatingVoltage::V1_1, &mut Forever)
            .unwrap();
        assert_eq!(regs.rail_target(platform::RailId::VcoreB).get(), 1100);
        assert_eq!(ctl.config().run_voltage.get(), 1100);
    }
}
