//! Error types for the low-power subsystem.

use platform::{OutOfRangeError, RailId};
use thiserror_no_std::Error;

/// Busy-wait that was bounded by a deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WaitSite {
    /// A rail reporting ready at its target.
    RailReady(RailId),
    /// The system clock reporting stable after a source switch.
    ClockReady,
    /// The peer core answering a low-power request.
    PeerResponse,
}

impl core::fmt::Display for WaitSite {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::RailReady(rail) => write!(f, "{rail} ready"),
            Self::ClockReady => f.write_str("system clock ready"),
            Self::PeerResponse => f.write_str("peer response"),
        }
    }
}

/// Errors returned by the low-power subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LpError {
    /// A mode or index outside its valid range.
    #[error("parameter out of range")]
    BadParam,
    /// The operation is not valid in the current state, or the peer declined.
    #[error("operation not valid in the current state")]
    BadState,
    /// The shared semaphore is held by another request.
    #[error("semaphore busy")]
    Busy,
    /// A bounded wait expired.
    #[error("timed out waiting for {0}")]
    Timeout(WaitSite),
    /// Refused to switch the core onto a rail that is not ready.
    #[error("{0} not ready")]
    RailNotReady(RailId),
}

impl From<OutOfRangeError> for LpError {
    fn from(_: OutOfRangeError) -> Self {
        Self::BadParam
    }
}

/// The mailbox interrupt was not raised by a low-power request.
///
/// Returned by the arbitration handler so a shared interrupt vector can
/// pass the event on to its other users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("mailbox event not addressed to the low-power handler")]
pub struct NotOurEvent;
