//! Dual-core handshake tests.
//!
//! Both cores share one `SimInterconnect`. Handlers are wired to the
//! simulated mailbox interrupts, so a request, its answer and the closing
//! nudge all dispatch the way they would on hardware.

#![allow(clippy::unwrap_used)]

use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use embassy_time::Duration;
use lowpower::{
    DualCoreArbiter, HandlerOutcome, LpError, NotOurEvent, Phase, PowerConfig,
    PowerModeController, ReadinessCheck, WaitSite,
};
use platform::config::{LP_REQUEST_TAG, RESPONSE_APPROVED};
use platform::mocks::{SimCpu, SimEvent, SimInterconnect, SimMailbox, SimRegisters};
use platform::{
    ClockSource, CoreId, Forever, InterCoreMailbox, Millivolts, PowerMode, RailId, SemaphoreId,
    SpinBudget, TimeDeadline,
};

const SEMA: u8 = 3;

type Arbiter = Arc<DualCoreArbiter<SimMailbox>>;
type Outcomes = Arc<Mutex<Vec<Result<HandlerOutcome, NotOurEvent>>>>;

fn ready() -> Result<(), LpError> {
    Ok(())
}

fn busy_elsewhere() -> Result<(), LpError> {
    Err(LpError::Busy)
}

fn sema() -> SemaphoreId {
    SemaphoreId::try_new(SEMA).unwrap()
}

fn controller() -> PowerModeController<SimRegisters, SimCpu> {
    let regs = SimRegisters::new();
    let cpu = SimCpu::new(regs.clone());
    PowerModeController::new(regs, cpu, PowerConfig::default()).unwrap()
}

/// Arbiter for `core`, configured on the shared semaphore.
fn arbiter(net: &SimInterconnect, core: CoreId, check: ReadinessCheck) -> Arbiter {
    let arb = Arc::new(DualCoreArbiter::new(net.endpoint(core)));
    arb.configure(check, SEMA).unwrap();
    arb
}

/// Route `core`'s mailbox interrupt to `arb`'s handler, recording outcomes.
fn wire(net: &SimInterconnect, core: CoreId, arb: &Arbiter) -> Outcomes {
    let outcomes: Outcomes = Arc::default();
    let (arb, log) = (Arc::clone(arb), Arc::clone(&outcomes));
    net.connect(core, move || {
        // The handler may send, which re-enters other handlers.
        let outcome = arb.handler();
        log.lock().unwrap().push(outcome);
    });
    outcomes
}

fn taken(outcomes: &Outcomes) -> Vec<Result<HandlerOutcome, NotOurEvent>> {
    std::mem::take(&mut *outcomes.lock().unwrap())
}

#[test]
fn approved_request_enters_mode_and_idles_peer() {
    let net = SimInterconnect::new();
    let a = arbiter(&net, CoreId::Core0, ready);
    let b = arbiter(&net, CoreId::Core1, ready);
    let at_a = wire(&net, CoreId::Core0, &a);
    let at_b = wire(&net, CoreId::Core1, &b);

    let mut ctl = controller();
    a.request_mode(PowerMode::Standby, &mut ctl, &mut Forever).unwrap();

    assert_eq!(ctl.mode(), PowerMode::Active);
    assert!(ctl
        .registers()
        .take_events()
        .contains(&SimEvent::WaitForInterrupt(PowerMode::Standby)));
    assert_eq!(taken(&at_a), vec![Ok(HandlerOutcome::ResponseRecorded)]);
    // The request, then the closing nudge after the semaphore was freed.
    assert_eq!(
        taken(&at_b),
        vec![Ok(HandlerOutcome::Approved), Err(NotOurEvent)]
    );

    let mut peer_cpu = SimCpu::new(SimRegisters::new());
    assert!(b.idle_if_requested(&mut peer_cpu));
    assert_eq!(peer_cpu.wfi_count(), 1);
    assert!(!net.semaphore_held(sema()));
    assert_eq!(a.phase(), Phase::Idle);
}

#[test]
fn approved_deep_sleep_runs_prepare_enter_recover() {
    let net = SimInterconnect::new();
    let a = arbiter(&net, CoreId::Core0, ready);
    let b = arbiter(&net, CoreId::Core1, ready);
    let at_a = wire(&net, CoreId::Core0, &a);
    let at_b = wire(&net, CoreId::Core1, &b);

    let mut ctl = controller();
    a.request_mode(PowerMode::DeepSleep, &mut ctl, &mut Forever).unwrap();

    let events = ctl.registers().take_events();
    let at = |wanted: SimEvent| events.iter().position(|e| *e == wanted).unwrap();
    let lowered = at(SimEvent::RailTarget(RailId::VcoreB, Millivolts::new(850)));
    let slept = at(SimEvent::WaitForInterrupt(PowerMode::DeepSleep));
    let raised = at(SimEvent::RailTarget(RailId::VcoreB, Millivolts::new(1000)));
    let clocked = events
        .iter()
        .rposition(|e| *e == SimEvent::SystemClock(ClockSource::HighFrequency))
        .unwrap();
    assert!(lowered < slept && slept < raised && raised < clocked);
    assert_eq!(ctl.mode(), PowerMode::Active);
    assert_eq!(ctl.core_clock_hz(), ClockSource::HighFrequency.frequency_hz());

    assert!(!net.semaphore_held(sema()));
    assert_eq!(a.phase(), Phase::Idle);
    assert_eq!(taken(&at_a), vec![Ok(HandlerOutcome::ResponseRecorded)]);
    assert_eq!(net.interrupts_raised(CoreId::Core1), 2);
    assert_eq!(
        taken(&at_b),
        vec![Ok(HandlerOutcome::Approved), Err(NotOurEvent)]
    );
    assert!(b.idle_requested());
}

#[test]
fn declined_request_releases_semaphore_and_nudges_peer() {
    let net = SimInterconnect::new();
    let a = arbiter(&net, CoreId::Core0, ready);
    let b = arbiter(&net, CoreId::Core1, busy_elsewhere);
    wire(&net, CoreId::Core0, &a);
    let at_b = wire(&net, CoreId::Core1, &b);

    let mut ctl = controller();
    let err = a
        .request_mode(PowerMode::DeepSleep, &mut ctl, &mut Forever)
        .unwrap_err();

    assert_eq!(err, LpError::BadState);
    assert!(!net.semaphore_held(sema()));
    assert_eq!(net.interrupts_raised(CoreId::Core1), 2);
    assert_eq!(
        taken(&at_b),
        vec![Ok(HandlerOutcome::Declined), Err(NotOurEvent)]
    );
    assert!(!b.idle_requested());
    assert_eq!(ctl.cpu().wfi_count(), 0);
    assert_eq!(ctl.mode(), PowerMode::Active);
}

#[test]
fn held_semaphore_is_busy_without_touching_peer() {
    let net = SimInterconnect::new();
    let a = arbiter(&net, CoreId::Core0, ready);
    let b = arbiter(&net, CoreId::Core1, ready);
    assert!(b.mailbox().try_acquire(sema()));

    let mut ctl = controller();
    assert_eq!(
        a.request_mode(PowerMode::LowPower, &mut ctl, &mut Forever),
        Err(LpError::Busy)
    );
    assert_eq!(net.interrupts_raised(CoreId::Core1), 0);
    assert!(net.semaphore_held(sema()));
}

#[test]
fn silent_peer_times_out_and_late_answer_is_ignored() {
    let net = SimInterconnect::new();
    let a = arbiter(&net, CoreId::Core0, ready);
    let _b = arbiter(&net, CoreId::Core1, ready);
    let at_a = wire(&net, CoreId::Core0, &a);

    let mut ctl = controller();
    let err = a
        .request_mode(PowerMode::MicroPower, &mut ctl, &mut SpinBudget::new(32))
        .unwrap_err();

    assert_eq!(err, LpError::Timeout(WaitSite::PeerResponse));
    assert_eq!(a.phase(), Phase::Idle);
    assert!(!net.semaphore_held(sema()));
    assert_eq!(net.inbox(CoreId::Core1), LP_REQUEST_TAG);

    // The peer finally answers.
    net.endpoint(CoreId::Core1).send(RESPONSE_APPROVED);
    assert_eq!(taken(&at_a), vec![Err(NotOurEvent)]);
    assert_eq!(ctl.cpu().wfi_count(), 0);
}

#[test]
fn crossed_request_is_taken_as_answer_not_evaluated() {
    let net = SimInterconnect::new();
    let a = arbiter(&net, CoreId::Core0, ready);
    let at_a = wire(&net, CoreId::Core0, &a);
    // The peer's handler sends its own request instead of answering.
    let peer = net.endpoint(CoreId::Core1);
    net.connect(CoreId::Core1, move || {
        if peer.receive() == Some(LP_REQUEST_TAG) {
            peer.send(LP_REQUEST_TAG);
        }
    });

    let mut ctl = controller();
    let err = a
        .request_mode(PowerMode::Standby, &mut ctl, &mut SpinBudget::new(32))
        .unwrap_err();

    assert_eq!(err, LpError::BadState);
    // The peer echoes the closing nudge too; by then the semaphore is free.
    assert_eq!(
        taken(&at_a),
        vec![Ok(HandlerOutcome::ResponseRecorded), Err(NotOurEvent)]
    );
    assert!(!a.idle_requested());
}

#[test]
fn stray_interrupt_during_request_is_not_ours() {
    let net = SimInterconnect::new();
    let a = arbiter(&net, CoreId::Core0, ready);
    let b = arbiter(&net, CoreId::Core1, ready);
    wire(&net, CoreId::Core0, &a);

    // Before answering, the peer pokes the requester without a word and
    // tries to reset it.
    let seen: Outcomes = Arc::default();
    let reset: Arc<Mutex<Option<Result<(), LpError>>>> = Arc::default();
    let (a2, b2, log, reset2) = (
        Arc::clone(&a),
        Arc::clone(&b),
        Arc::clone(&seen),
        Arc::clone(&reset),
    );
    net.connect(CoreId::Core1, move || {
        if a2.phase() == Phase::AwaitingResponse {
            let outcome = a2.handler();
            log.lock().unwrap().push(outcome);
            *reset2.lock().unwrap() = Some(a2.reset());
        }
        let _ = b2.handler();
    });

    let mut ctl = controller();
    a.request_mode(PowerMode::LowPower, &mut ctl, &mut Forever).unwrap();

    assert_eq!(taken(&seen), vec![Err(NotOurEvent)]);
    assert_eq!(*reset.lock().unwrap(), Some(Err(LpError::BadState)));
    assert!(a.is_configured());
}

#[test]
fn either_core_can_request() {
    let net = SimInterconnect::new();
    let a = arbiter(&net, CoreId::Core0, ready);
    let b = arbiter(&net, CoreId::Core1, ready);
    wire(&net, CoreId::Core0, &a);
    wire(&net, CoreId::Core1, &b);

    let mut ctl_a = controller();
    let mut ctl_b = controller();
    a.request_mode(PowerMode::LowPower, &mut ctl_a, &mut Forever).unwrap();
    b.request_mode(PowerMode::DeepSleep, &mut ctl_b, &mut Forever).unwrap();
    a.request_mode(PowerMode::Standby, &mut ctl_a, &mut Forever).unwrap();

    assert_eq!(ctl_a.cpu().wfi_count(), 2);
    assert_eq!(ctl_b.cpu().wfi_count(), 1);
    assert!(!net.semaphore_held(sema()));
}

#[test]
fn peer_on_its_own_thread_approves() {
    let net = SimInterconnect::new();
    let a = arbiter(&net, CoreId::Core0, ready);
    let b = arbiter(&net, CoreId::Core1, ready);
    wire(&net, CoreId::Core0, &a);

    // Core 1's interrupt only signals its thread, like a real NVIC line.
    let (irq, pending) = mpsc::channel::<()>();
    net.connect(CoreId::Core1, move || {
        let _ = irq.send(());
    });
    let peer = {
        let b = Arc::clone(&b);
        thread::spawn(move || {
            let mut cpu = SimCpu::new(SimRegisters::new());
            let mut outcomes = Vec::new();
            while pending.recv().is_ok() {
                outcomes.push(b.handler());
                b.idle_if_requested(&mut cpu);
            }
            (outcomes, cpu.wfi_count())
        })
    };

    let mut ctl = controller();
    let mut deadline = TimeDeadline::after(Duration::from_secs(5));
    a.request_mode(PowerMode::Standby, &mut ctl, &mut deadline).unwrap();

    // Dropping the handler closes the channel and ends the peer loop.
    net.disconnect(CoreId::Core1);
    let (outcomes, idles) = peer.join().unwrap();
    assert!(outcomes.contains(&Ok(HandlerOutcome::Approved)));
    assert_eq!(idles, 1);
    assert_eq!(ctl.cpu().wfi_count(), 1);
    assert!(!net.semaphore_held(sema()));
}
