//! Voltage-rail domain types.
//!
//! - `Millivolts`: regulator target level, validated against the core
//!   regulator's programmable range
//! - `RailId`: which regulator output a register access refers to
//! - `OperatingVoltage`: the three supported run-mode operating points

use crate::config::{CORE_RAIL_MAX_MV, CORE_RAIL_MIN_MV};
use crate::range::OutOfRangeError;

// ── Millivolts ───────────────────────────────────────────────────────────────

/// Regulator target level in millivolts.
///
/// Wraps a `u16` with the invariant
/// `CORE_RAIL_MIN_MV <= value <= CORE_RAIL_MAX_MV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct Millivolts(u16);

impl Millivolts {
    /// Lowest programmable level.
    pub const MIN: Self = Self(CORE_RAIL_MIN_MV);

    /// Highest programmable level.
    pub const MAX: Self = Self(CORE_RAIL_MAX_MV);

    /// Create a level, clamping into the programmable range.
    #[must_use]
    pub const fn new(mv: u16) -> Self {
        if mv < CORE_RAIL_MIN_MV {
            Self(CORE_RAIL_MIN_MV)
        } else if mv > CORE_RAIL_MAX_MV {
            Self(CORE_RAIL_MAX_MV)
        } else {
            Self(mv)
        }
    }

    /// Create a level, rejecting values the regulator cannot produce.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] if `mv` is outside the programmable range.
    pub fn try_new(mv: u16) -> Result<Self, OutOfRangeError> {
        if (CORE_RAIL_MIN_MV..=CORE_RAIL_MAX_MV).contains(&mv) {
            Ok(Self(mv))
        } else {
            Err(OutOfRangeError {
                value: u32::from(mv),
                min: u32::from(CORE_RAIL_MIN_MV),
                max: u32::from(CORE_RAIL_MAX_MV),
            })
        }
    }

    /// Return the level in millivolts.
    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }
}

impl core::fmt::Display for Millivolts {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} mV", self.0)
    }
}

// ── RailId ───────────────────────────────────────────────────────────────────

/// Regulated outputs that can feed the core logic.
///
/// The core-supply switch selects exactly one of them at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RailId {
    /// VCOREA: high rail, energised by hardware while it keeps the core on it.
    VcoreA,
    /// VCOREB: run rail, lowered to the retention level for deep sleep.
    VcoreB,
}

impl RailId {
    /// All rails, in register order.
    pub const ALL: [RailId; 2] = [RailId::VcoreA, RailId::VcoreB];

    /// Register index of this rail.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::VcoreA => 0,
            Self::VcoreB => 1,
        }
    }
}

impl core::fmt::Display for RailId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::VcoreA => "VCOREA",
            Self::VcoreB => "VCOREB",
        })
    }
}

// ── OperatingVoltage ─────────────────────────────────────────────────────────

/// Run-mode operating points of the core rail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperatingVoltage {
    /// 0.9 V
    V0_9,
    /// 1.0 V
    V1_0,
    /// 1.1 V
    V1_1,
}

impl OperatingVoltage {
    /// Regulator level for this operating point.
    #[must_use]
    pub const fn level(self) -> Millivolts {
        match self {
            Self::V0_9 => Millivolts::new(900),
            Self::V1_0 => Millivolts::new(1000),
            Self::V1_1 => Millivolts::new(1100),
        }
    }
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    #[test]
    fn new_clamps_below_min() {
        assert_eq!(Millivolts::new(0), Millivolts::MIN);
    }

    #[test]
    fn new_clamps_above_max() {
        assert_eq!(Millivolts::new(u16::MAX), Millivolts::MAX);
    }

    #[test]
    fn try_new_rejects_out_of_range() {
        assert!(Millivolts::try_new(CORE_RAIL_MIN_MV - 1).is_err());
        assert!(Millivolts::try_new(CORE_RAIL_MAX_MV + 1).is_err());
        assert!(Millivolts::try_new(850).is_ok());
    }

    #[test]
    fn operating_points_are_ordered() {
        assert!(OperatingVoltage::V0_9.level() < OperatingVoltage::V1_0.level());
        assert!(OperatingVoltage::V1_0.level() < OperatingVoltage::V1_1.level());
        assert_eq!(OperatingVoltage::V1_0.level().get(), 1000);
    }

    #[test]
    fn rail_indices_are_distinct() {
        assert_ne!(RailId::VcoreA.index(), RailId::VcoreB.index());
    }
}
