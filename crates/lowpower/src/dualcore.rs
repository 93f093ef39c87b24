//! Dual-core arbitration
//!
//! Before either core collapses a shared power domain it asks the other
//! one. Each core owns one [`DualCoreArbiter`]; the request path runs in
//! thread mode and [`DualCoreArbiter::handler`] runs from the mailbox
//! interrupt, so all shared state is atomic.
//!
//! ```text
//!  requester                                  responder
//!  ─────────                                  ─────────
//!  acquire semaphore (else Busy)
//!  response = PENDING, phase = Awaiting
//!  send(LP_REQUEST_TAG) ───────────────────▶  handler: semaphore held, tag
//!                                             readiness check
//!  handler: store response ◀───────────────   send(APPROVED | DECLINED)
//!  wait until response != PENDING             approved: idle requested
//!  approved: enter mode, wake
//!  phase = Idle, release, nudge ───────────▶  handler: semaphore free,
//!                                             NotOurEvent
//! ```

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use platform::config::{LP_REQUEST_TAG, RESPONSE_APPROVED, RESPONSE_DECLINED, RESPONSE_PENDING};
use platform::{poll_until, Cpu, Deadline, InterCoreMailbox, PowerMode, PowerRegisters, SemaphoreId};

use crate::error::{LpError, NotOurEvent, WaitSite};
use crate::mode::PowerModeController;

/// Decides whether this core can tolerate the peer's requested mode.
///
/// `Ok` approves; any error declines.
pub type ReadinessCheck = fn() -> Result<(), LpError>;

/// Handshake phase of the local core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Phase {
    /// No request of ours is outstanding.
    Idle = 0,
    /// We sent a request and wait for the peer's answer.
    AwaitingResponse = 1,
}

impl Phase {
    fn from_bits(bits: u8) -> Self {
        if bits == Self::AwaitingResponse as u8 {
            Self::AwaitingResponse
        } else {
            Self::Idle
        }
    }
}

/// What the mailbox handler did with an event addressed to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HandlerOutcome {
    /// Stored the peer's answer to our outstanding request.
    ResponseRecorded,
    /// Approved the peer's request; this core should idle.
    Approved,
    /// Declined the peer's request.
    Declined,
    /// The word was neither a response nor a request.
    Ignored,
}

/// One core's side of the low-power handshake.
pub struct DualCoreArbiter<M> {
    mailbox: M,
    configured: AtomicBool,
    semaphore: AtomicU8,
    phase: AtomicU8,
    response: AtomicU32,
    idle_requested: AtomicBool,
    readiness: Mutex<CriticalSectionRawMutex, Cell<Option<ReadinessCheck>>>,
}

impl<M: InterCoreMailbox> DualCoreArbiter<M> {
    /// Unconfigured arbiter on `mailbox`.
    pub const fn new(mailbox: M) -> Self {
        Self {
            mailbox,
            configured: AtomicBool::new(false),
            semaphore: AtomicU8::new(0),
            phase: AtomicU8::new(Phase::Idle as u8),
            response: AtomicU32::new(RESPONSE_PENDING),
            idle_requested: AtomicBool::new(false),
            readiness: Mutex::new(Cell::new(None)),
        }
    }

    /// Mailbox endpoint.
    pub fn mailbox(&self) -> &M {
        &self.mailbox
    }

    /// Install the readiness check and choose the shared semaphore.
    ///
    /// # Errors
    ///
    /// - [`LpError::BadState`] if already configured.
    /// - [`LpError::BadParam`] if `semaphore` is not a valid index.
    pub fn configure(&self, check: ReadinessCheck, semaphore: u8) -> Result<(), LpError> {
        self.readiness.lock(|slot| {
            if self.configured.load(Ordering::Acquire) {
                return Err(LpError::BadState);
            }
            let sema = SemaphoreId::try_new(semaphore)?;
            self.semaphore.store(sema.get(), Ordering::Relaxed);
            slot.set(Some(check));
            self.configured.store(true, Ordering::Release);
            Ok(())
        })?;
        info!("dual-core arbitration on semaphore {}", semaphore);
        Ok(())
    }

    /// Drop the configuration so [`DualCoreArbiter::configure`] can run again.
    ///
    /// # Errors
    ///
    /// [`LpError::BadState`] while a request is outstanding.
    pub fn reset(&self) -> Result<(), LpError> {
        if self.phase() == Phase::AwaitingResponse {
            return Err(LpError::BadState);
        }
        self.readiness.lock(|slot| {
            slot.set(None);
            self.configured.store(false, Ordering::Release);
        });
        Ok(())
    }

    /// Whether [`DualCoreArbiter::configure`] has succeeded.
    pub fn is_configured(&self) -> bool {
        self.configured.load(Ordering::Acquire)
    }

    /// Current handshake phase.
    pub fn phase(&self) -> Phase {
        Phase::from_bits(self.phase.load(Ordering::SeqCst))
    }

    fn semaphore(&self) -> Option<SemaphoreId> {
        if !self.is_configured() {
            return None;
        }
        SemaphoreId::try_new(self.semaphore.load(Ordering::Relaxed)).ok()
    }

    /// Ask the peer for consent, then enter `mode` on approval.
    ///
    /// Returns once the mode has been entered and woken from. BACKUP and
    /// POWERDOWN do not return when approved. The semaphore is released on
    /// every returning path.
    ///
    /// # Errors
    ///
    /// - [`LpError::BadParam`] if `mode` is shallower than LOW_POWER.
    /// - [`LpError::BadState`] if not configured, or the peer declined.
    /// - [`LpError::Busy`] if another request holds the semaphore.
    /// - [`LpError::Timeout`] if the peer does not answer in time.
    /// - Any error from entering `mode`.
    pub fn request_mode<R, C, D>(
        &self,
        mode: PowerMode,
        controller: &mut PowerModeController<R, C>,
        deadline: &mut D,
    ) -> Result<(), LpError>
    where
        R: PowerRegisters,
        C: Cpu,
        D: Deadline + ?Sized,
    {
        if !mode.is_arbitrated() {
            return Err(LpError::BadParam);
        }
        let sema = self.semaphore().ok_or(LpError::BadState)?;
        if !self.mailbox.try_acquire(sema) {
            debug!("semaphore {} busy", sema.get());
            return Err(LpError::Busy);
        }

        self.response.store(RESPONSE_PENDING, Ordering::SeqCst);
        self.phase
            .store(Phase::AwaitingResponse as u8, Ordering::SeqCst);
        info!("requesting {} from {}", mode, self.mailbox.core().peer());
        self.mailbox.send(LP_REQUEST_TAG);

        deadline.rearm();
        let response = &self.response;
        let answered = poll_until(deadline, || {
            response.load(Ordering::SeqCst) != RESPONSE_PENDING
        });

        let result = match answered {
            Err(_) => {
                warn!("no answer from {} for {}", self.mailbox.core().peer(), mode);
                Err(LpError::Timeout(WaitSite::PeerResponse))
            }
            Ok(()) if self.response.load(Ordering::SeqCst) == RESPONSE_APPROVED => {
                controller.enter(mode, deadline)
            }
            Ok(()) => {
                info!("{} declined {}", self.mailbox.core().peer(), mode);
                Err(LpError::BadState)
            }
        };

        self.phase.store(Phase::Idle as u8, Ordering::SeqCst);
        self.mailbox.release(sema);
        self.mailbox.raise_peer_interrupt();
        result
    }

    /// Mailbox interrupt handler.
    ///
    /// # Errors
    ///
    /// [`NotOurEvent`] if the event was not raised by a low-power request:
    /// the arbiter is unconfigured, the semaphore is free, or no mailbox
    /// word is pending.
    pub fn handler(&self) -> Result<HandlerOutcome, NotOurEvent> {
        let sema = self.semaphore().ok_or(NotOurEvent)?;
        if !self.mailbox.is_held(sema) {
            return Err(NotOurEvent);
        }
        let word = self.mailbox.receive().ok_or(NotOurEvent)?;

        if self.phase() == Phase::AwaitingResponse {
            self.response.store(word, Ordering::SeqCst);
            return Ok(HandlerOutcome::ResponseRecorded);
        }
        if word != LP_REQUEST_TAG {
            return Ok(HandlerOutcome::Ignored);
        }

        let check = self.readiness.lock(Cell::get);
        if check.is_some_and(|ready| ready().is_ok()) {
            self.mailbox.send(RESPONSE_APPROVED);
            self.idle_requested.store(true, Ordering::SeqCst);
            debug!("approved request from {}", self.mailbox.core().peer());
            Ok(HandlerOutcome::Approved)
        } else {
            self.mailbox.send(RESPONSE_DECLINED);
            debug!("declined request from {}", self.mailbox.core().peer());
            Ok(HandlerOutcome::Declined)
        }
    }

    /// Whether an approved request is waiting for this core to idle.
    pub fn idle_requested(&self) -> bool {
        self.idle_requested.load(Ordering::SeqCst)
    }

    /// Wait for an interrupt if the handler approved a request since the
    /// last call. Call from the main loop.
    pub fn idle_if_requested<C: Cpu>(&self, cpu: &mut C) -> bool {
        if self.idle_requested.swap(false, Ordering::SeqCst) {
            cpu.wait_for_interrupt();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::PowerConfig;
    use platform::config::SEMAPHORE_INSTANCES;
    use platform::mocks::{SimCpu, SimInterconnect, SimMailbox, SimRegisters};
    use platform::{CoreId, Forever};

    fn ready() -> Result<(), LpError> {
        Ok(())
    }

    fn arbiter() -> DualCoreArbiter<SimMailbox> {
        DualCoreArbiter::new(SimInterconnect::new().endpoint(CoreId::Core0))
    }

    fn controller() -> PowerModeController<SimRegisters, SimCpu> {
        let regs = SimRegisters::new();
        let cpu = SimCpu::new(regs.clone());
        PowerModeController::new(regs, cpu, PowerConfig::default()).unwrap()
    }

    #[test]
    fn configure_twice_is_bad_state() {
        let arb = arbiter();
        arb.configure(ready, 0).unwrap();
        assert_eq!(arb.configure(ready, 1), Err(LpError::BadState));
    }

    #[test]
    fn configure_out_of_range_semaphore_is_bad_param() {
        let arb = arbiter();
        assert_eq!(
            arb.configure(ready, SEMAPHORE_INSTANCES),
            Err(LpError::BadParam)
        );
        assert!(!arb.is_configured());
    }

    #[test]
    fn reset_allows_reconfiguration() {
        let arb = arbiter();
        arb.configure(ready, 0).unwrap();
        arb.reset().unwrap();
        arb.configure(ready, 2).unwrap();
        assert!(arb.is_configured());
    }

    #[test]
    fn request_before_configure_is_bad_state() {
        let arb = arbiter();
        let mut ctl = controller();
        assert_eq!(
            arb.request_mode(PowerMode::Standby, &mut ctl, &mut Forever),
            Err(LpError::BadState)
        );
    }

    #[test]
    fn shallow_modes_cannot_be_requested() {
        let arb = arbiter();
        arb.configure(ready, 0).unwrap();
        let mut ctl = controller();
        for mode in [PowerMode::Active, PowerMode::Sleep] {
            assert_eq!(
                arb.request_mode(mode, &mut ctl, &mut Forever),
                Err(LpError::BadParam)
            );
        }
    }

    #[test]
    fn held_semaphore_is_busy() {
        let arb = arbiter();
        arb.configure(ready, 4).unwrap();
        assert!(arb.mailbox().try_acquire(SemaphoreId::try_new(4).unwrap()));
        let mut ctl = controller();
        assert_eq!(
            arb.request_mode(PowerMode::LowPower, &mut ctl, &mut Forever),
            Err(LpError::Busy)
        );
        assert_eq!(arb.phase(), Phase::Idle);
    }

    #[test]
    fn handler_ignores_events_without_semaphore() {
        let arb = arbiter();
        assert_eq!(arb.handler(), Err(NotOurEvent));
        arb.configure(ready, 0).unwrap();
        assert_eq!(arb.handler(), Err(NotOurEvent));
    }

    #[test]
    fn idle_flag_is_consumed_once() {
        let arb = arbiter();
        arb.idle_requested.store(true, Ordering::SeqCst);
        let mut cpu = SimCpu::new(SimRegisters::new());
        assert!(arb.idle_if_requested(&mut cpu));
        assert!(!arb.idle_if_requested(&mut cpu));
        assert_eq!(cpu.wfi_count(), 1);
    }
}
