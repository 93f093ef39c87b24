//! Bounded waits.
//!
//! Every busy-wait in the low-power subsystem polls a [`Deadline`] between
//! register reads. `Forever` reproduces an unbounded spin, `SpinBudget`
//! counts polls and is deterministic in tests, and `TimeDeadline` uses the
//! embassy time driver.
//!
//! A deadline bounds one phase of a sequence. Callers that run several
//! phases with one deadline call [`Deadline::rearm`] between them, so time
//! spent asleep is not charged to the wake-up phase.

use embassy_time::{Duration, Instant};

/// A wait bound, polled once per loop iteration.
pub trait Deadline {
    /// Whether the wait should give up.
    fn expired(&mut self) -> bool;

    /// Start a new phase with the original allowance.
    ///
    /// Absolute deadlines keep their expiry point.
    fn rearm(&mut self) {}
}

impl<D: Deadline + ?Sized> Deadline for &mut D {
    fn expired(&mut self) -> bool {
        (**self).expired()
    }

    fn rearm(&mut self) {
        (**self).rearm();
    }
}

/// Marker returned by [`poll_until`] when the deadline passed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Expired;

/// Spin until `ready` returns `true` or `deadline` expires.
///
/// `ready` is evaluated before the deadline on every iteration, so a
/// condition that already holds never times out.
///
/// # Errors
///
/// Returns [`Expired`] if the deadline passed first.
pub fn poll_until<D, F>(deadline: &mut D, mut ready: F) -> Result<(), Expired>
where
    D: Deadline + ?Sized,
    F: FnMut() -> bool,
{
    loop {
        if ready() {
            return Ok(());
        }
        if deadline.expired() {
            return Err(Expired);
        }
        core::hint::spin_loop();
    }
}

/// Never expires.
#[derive(Debug, Clone, Copy, Default)]
pub struct Forever;

impl Deadline for Forever {
    fn expired(&mut self) -> bool {
        false
    }
}

/// Expires after a fixed number of polls.
#[derive(Debug, Clone, Copy)]
pub struct SpinBudget {
    budget: u32,
    remaining: u32,
}

impl SpinBudget {
    /// Allow `polls` failed checks before expiring.
    #[must_use]
    pub const fn new(polls: u32) -> Self {
        Self {
            budget: polls,
            remaining: polls,
        }
    }

    /// Polls left.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.remaining
    }
}

impl Deadline for SpinBudget {
    fn expired(&mut self) -> bool {
        match self.remaining.checked_sub(1) {
            Some(left) => {
                self.remaining = left;
                false
            }
            None => true,
        }
    }

    fn rearm(&mut self) {
        self.remaining = self.budget;
    }
}

/// Expires at a point in time.
#[derive(Debug, Clone, Copy)]
pub struct TimeDeadline {
    at: Instant,
    timeout: Option<Duration>,
}

impl TimeDeadline {
    /// Expire at `at`. Rearming keeps the same expiry point.
    #[must_use]
    pub const fn at(at: Instant) -> Self {
        Self { at, timeout: None }
    }

    /// Expire `timeout` from now. Rearming restarts the timeout.
    #[must_use]
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: from_now(timeout),
            timeout: Some(timeout),
        }
    }
}

fn from_now(timeout: Duration) -> Instant {
    Instant::now().checked_add(timeout).unwrap_or(Instant::MAX)
}

impl Deadline for TimeDeadline {
    fn expired(&mut self) -> bool {
        Instant::now() >= self.at
    }

    fn rearm(&mut self) {
        if let Some(timeout) = self.timeout {
            self.at = from_now(timeout);
        }
    }
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    #[test]
    fn forever_never_expires() {
        let mut d = Forever;
        for _ in 0..1000 {
            assert!(!d.expired());
        }
    }

    #[test]
    fn spin_budget_expires_after_n_polls() {
        let mut d = SpinBudget::new(3);
        assert!(!d.expired());
        assert!(!d.expired());
        assert!(!d.expired());
        assert!(d.expired());
        assert!(d.expired());
    }

    #[test]
    fn rearm_restores_spin_budget() {
        let mut d = SpinBudget::new(1);
        assert!(!d.expired());
        assert!(d.expired());
        d.rearm();
        assert_eq!(d.remaining(), 1);
        assert!(!d.expired());
    }

    #[test]
    fn absolute_deadline_ignores_rearm() {
        let mut d = TimeDeadline::at(Instant::from_ticks(0));
        d.rearm();
        assert!(d.expired());
    }

    #[test]
    fn poll_until_checks_condition_before_deadline() {
        let mut d = SpinBudget::new(0);
        assert_eq!(poll_until(&mut d, || true), Ok(()));
        assert_eq!(poll_until(&mut d, || false), Err(Expired));
    }

    #[test]
    fn poll_until_succeeds_within_budget() {
        let mut d = SpinBudget::new(10);
        let mut polls = 0u32;
        let result = poll_until(&mut d, || {
            polls += 1;
            polls == 5
        });
        assert_eq!(result, Ok(()));
        assert_eq!(d.remaining(), 6);
    }

    #[test]
    fn elapsed_time_deadline_expires() {
        let mut d = TimeDeadline::at(Instant::from_ticks(0));
        assert!(d.expired());
    }

    #[test]
    fn future_time_deadline_does_not_expire() {
        let mut d = TimeDeadline::after(Duration::from_secs(3600));
        assert!(!d.expired());
    }
}
