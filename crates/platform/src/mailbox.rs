//! Inter-core mailbox and hardware semaphores.
//!
//! Each core owns one inbound mailbox word and one mailbox interrupt. The
//! semaphore block is shared: a successful acquire is exclusive until the
//! holder releases it.

use crate::config::SEMAPHORE_INSTANCES;
use crate::range::OutOfRangeError;

/// Processor cores of the dual-core part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CoreId {
    /// Cortex-M4 application core.
    Core0,
    /// Second core.
    Core1,
}

impl CoreId {
    /// The other core.
    #[must_use]
    pub const fn peer(self) -> Self {
        match self {
            Self::Core0 => Self::Core1,
            Self::Core1 => Self::Core0,
        }
    }

    /// Register index of this core.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Core0 => 0,
            Self::Core1 => 1,
        }
    }
}

impl core::fmt::Display for CoreId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Core0 => "core0",
            Self::Core1 => "core1",
        })
    }
}

/// Index of a hardware semaphore.
///
/// Wraps a `u8` with the invariant `value < SEMAPHORE_INSTANCES`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct SemaphoreId(u8);

impl SemaphoreId {
    /// Create a semaphore index.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] if `id >= SEMAPHORE_INSTANCES`.
    pub fn try_new(id: u8) -> Result<Self, OutOfRangeError> {
        if id < SEMAPHORE_INSTANCES {
            Ok(Self(id))
        } else {
            Err(OutOfRangeError {
                value: u32::from(id),
                min: 0,
                max: u32::from(SEMAPHORE_INSTANCES).saturating_sub(1),
            })
        }
    }

    /// Semaphore index.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

/// One core's view of the mailbox and semaphore block.
///
/// All methods take `&self`: the same endpoint is used from thread context
/// and from the mailbox interrupt.
pub trait InterCoreMailbox {
    /// Core this endpoint belongs to.
    fn core(&self) -> CoreId;

    /// Try to take a semaphore. Returns `false` if it is already held.
    fn try_acquire(&self, sema: SemaphoreId) -> bool;

    /// Release a semaphore.
    fn release(&self, sema: SemaphoreId);

    /// Whether a semaphore is currently held by either core.
    fn is_held(&self, sema: SemaphoreId) -> bool;

    /// Write `word` into the peer's inbound mailbox and raise its interrupt.
    fn send(&self, word: u32);

    /// Raise the peer's mailbox interrupt without writing a word.
    fn raise_peer_interrupt(&self);

    /// Read this core's inbound word and clear its interrupt-pending flag.
    ///
    /// Returns `None` if no interrupt was pending.
    fn receive(&self) -> Option<u32>;
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    #[test]
    fn semaphore_id_rejects_out_of_range() {
        assert!(SemaphoreId::try_new(SEMAPHORE_INSTANCES).is_err());
        assert!(SemaphoreId::try_new(SEMAPHORE_INSTANCES - 1).is_ok());
        assert!(SemaphoreId::try_new(0).is_ok());
    }

    #[test]
    fn peer_of_peer_is_self() {
        assert_eq!(CoreId::Core0.peer().peer(), CoreId::Core0);
        assert_ne!(CoreId::Core0.index(), CoreId::Core1.index());
    }
}
