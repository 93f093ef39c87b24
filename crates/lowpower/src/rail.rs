//! Voltage-rail sequencer
//!
//! Programs rail targets, waits for the ready flag under a deadline and
//! switches the core supply. The core is never switched onto a rail that
//! has not reported ready.

use platform::{poll_until, Deadline, Millivolts, PowerRegisters, RailId};

use crate::error::{LpError, WaitSite};

/// Observable state of one rail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RailState {
    /// Programmed target.
    pub target: Millivolts,
    /// Ready flag at the time of reading.
    pub ready: bool,
    /// Whether this rail currently feeds the core.
    pub feeds_core: bool,
}

/// Sequences rail changes on a register block.
pub struct RailSequencer<'a, R: ?Sized> {
    regs: &'a mut R,
}

impl<'a, R: PowerRegisters + ?Sized> RailSequencer<'a, R> {
    /// Sequencer operating on `regs`.
    pub fn new(regs: &'a mut R) -> Self {
        Self { regs }
    }

    /// Current state of `rail`.
    pub fn state(&self, rail: RailId) -> RailState {
        RailState {
            target: self.regs.rail_target(rail),
            ready: self.regs.rail_ready(rail),
            feeds_core: self.regs.core_supply() == rail,
        }
    }

    /// Wait until `rail` reports ready.
    ///
    /// # Errors
    ///
    /// [`LpError::Timeout`] if the deadline expires first.
    pub fn wait_ready<D: Deadline + ?Sized>(
        &mut self,
        rail: RailId,
        deadline: &mut D,
    ) -> Result<(), LpError> {
        let regs = &*self.regs;
        poll_until(deadline, || regs.rail_ready(rail))
            .map_err(|_| LpError::Timeout(WaitSite::RailReady(rail)))
    }

    /// Program `rail` to `level` and wait until it settles.
    ///
    /// On timeout the previous target is written back before returning, so
    /// the rail is left heading for its last known-good level.
    ///
    /// # Errors
    ///
    /// [`LpError::Timeout`] if the rail does not settle in time.
    pub fn set_level<D: Deadline + ?Sized>(
        &mut self,
        rail: RailId,
        level: Millivolts,
        deadline: &mut D,
    ) -> Result<(), LpError> {
        let previous = self.regs.rail_target(rail);
        debug!("rail {} {} -> {}", rail, previous, level);
        self.regs.set_rail_target(rail, level);
        if let Err(e) = self.wait_ready(rail, deadline) {
            warn!("rail {} did not settle at {}, restoring {}", rail, level, previous);
            self.regs.set_rail_target(rail, previous);
            return Err(e);
        }
        Ok(())
    }

    /// Move the core onto `rail`.
    ///
    /// `rail` must already report ready. After the switch the rail is
    /// polled again; if it drops out the core is moved back to the rail it
    /// came from.
    ///
    /// # Errors
    ///
    /// - [`LpError::RailNotReady`] if `rail` is not ready; nothing is switched.
    /// - [`LpError::Timeout`] if `rail` does not stay ready after the switch.
    pub fn switch_core_supply<D: Deadline + ?Sized>(
        &mut self,
        rail: RailId,
        deadline: &mut D,
    ) -> Result<(), LpError> {
        if !self.regs.rail_ready(rail) {
            warn!("refusing core supply switch to {}: not ready", rail);
            return Err(LpError::RailNotReady(rail));
        }
        let previous = self.regs.core_supply();
        self.regs.set_core_supply(rail);
        if let Err(e) = self.wait_ready(rail, deadline) {
            if previous != rail && self.regs.rail_ready(previous) {
                self.regs.set_core_supply(previous);
            }
            return Err(e);
        }
        debug!("core supply {} -> {}", previous, rail);
        Ok(())
    }
}
