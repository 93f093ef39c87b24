//! Caller-side retry for contended low-power requests.
//!
//! The arbiter reports `Busy` when the peer holds the semaphore and leaves
//! the retry decision to the caller. [`request_with_retry`] retries only
//! `Busy`, with a doubling backoff bounded by [`RetryPolicy`]. Configuration
//! errors, declines and timeouts are returned on the first occurrence.
//!
//! # Usage Pattern
//!
//! ```rust,ignore
//! request_with_retry(
//!     &arbiter,
//!     PowerMode::Standby,
//!     &mut controller,
//!     &mut TimeDeadline::after(Duration::from_millis(50)),
//!     RetryPolicy::default(),
//!     embassy_time::block_for,
//! )?;
//! ```

use embassy_time::Duration;
use lowpower::{DualCoreArbiter, LpError, PowerModeController};
use platform::{Cpu, Deadline, InterCoreMailbox, PowerMode, PowerRegisters};

/// Bounded exponential backoff for `Busy` requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Zero behaves as one.
    pub max_attempts: u8,
    /// Pause after the first `Busy`.
    pub initial_backoff: Duration,
    /// Upper bound on any single pause.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(16),
        }
    }
}

impl RetryPolicy {
    /// Pause after the `retry`-th `Busy` (0-based). Doubles each time and
    /// saturates at `max_backoff`.
    pub fn backoff(&self, retry: u8) -> Duration {
        let ticks = (0..retry).fold(self.initial_backoff.as_ticks(), |t, _| {
            t.saturating_mul(2)
        });
        Duration::from_ticks(ticks.min(self.max_backoff.as_ticks()))
    }
}

/// [`DualCoreArbiter::request_mode`], retrying `Busy` per `policy`.
///
/// `pause` blocks for the given backoff; pass `embassy_time::block_for` on
/// target.
///
/// # Errors
///
/// The last error from `request_mode`. `Busy` is returned only after every
/// attempt was refused.
pub fn request_with_retry<M, R, C, D, P>(
    arbiter: &DualCoreArbiter<M>,
    mode: PowerMode,
    controller: &mut PowerModeController<R, C>,
    deadline: &mut D,
    policy: RetryPolicy,
    mut pause: P,
) -> Result<(), LpError>
where
    M: InterCoreMailbox,
    R: PowerRegisters,
    C: Cpu,
    D: Deadline + ?Sized,
    P: FnMut(Duration),
{
    let mut retry: u8 = 0;
    loop {
        match arbiter.request_mode(mode, controller, deadline) {
            Err(LpError::Busy) if retry.saturating_add(1) < policy.max_attempts => {
                let wait = policy.backoff(retry);
                debug!("semaphore busy, retry {} in {} us", retry, wait.as_micros());
                pause(wait);
                retry = retry.saturating_add(1);
            }
            result => return result,
        }
    }
}
