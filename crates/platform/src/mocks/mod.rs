//! Simulated hardware for host tests and the emulator.
//!
//! - [`SimRegisters`]: register file with configurable rail and clock
//!   settling, a write log and brown-out detection
//! - [`SimCpu`]: counts wait-for-interrupt calls, reverts the mode selector
//!   on wake and unwinds with [`SimulatedRestart`] for non-returning modes
//! - [`SimInterconnect`]: shared semaphore bank and two mailbox endpoints
//!   whose interrupts are dispatched to registered handlers

#![cfg(any(test, feature = "std"))]

use std::boxed::Box;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::vec::Vec;

use crate::clock_config::ClockSource;
use crate::config::{RUN_VOLTAGE_MV, SEMAPHORE_INSTANCES};
use crate::mailbox::{CoreId, InterCoreMailbox, SemaphoreId};
use crate::power::{Edge, GpioPort, PinMask, PowerMode, WakeLine};
use crate::registers::{ControlBit, Cpu, PowerRegisters};
use crate::voltage::{Millivolts, RailId};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Settling model ───────────────────────────────────────────────────────────

/// How long a simulated rail or clock takes to report ready after a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settle {
    /// Ready as soon as it is written.
    Immediate,
    /// Ready on the n-th status read after the write.
    AfterPolls(u32),
    /// Never becomes ready.
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Settling {
    settle: Settle,
    ready: bool,
    polls_left: u32,
}

impl Settling {
    const fn new(settle: Settle, ready: bool) -> Self {
        Self {
            settle,
            ready,
            polls_left: 0,
        }
    }

    fn restart(&mut self) {
        match self.settle {
            Settle::Immediate | Settle::AfterPolls(0) => self.ready = true,
            Settle::AfterPolls(n) => {
                self.ready = false;
                self.polls_left = n;
            }
            Settle::Never => self.ready = false,
        }
    }

    fn poll(&mut self) -> bool {
        if !self.ready && matches!(self.settle, Settle::AfterPolls(_)) {
            if self.polls_left <= 1 {
                self.ready = true;
            } else {
                self.polls_left = self.polls_left.saturating_sub(1);
            }
        }
        self.ready
    }
}

// ── Register file ────────────────────────────────────────────────────────────

/// Register write or processor event, in the order it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    /// Control bit written.
    Control(ControlBit, bool),
    /// Mode selector written.
    ModeSelect(PowerMode),
    /// Wake-enable bit written.
    WakeEnable(WakeLine, bool),
    /// Per-port GPIO wake mask written.
    GpioPins(GpioPort, u32),
    /// GPIO edge configured.
    GpioEdge(GpioPort, u32, Edge),
    /// Wake status cleared.
    ClearWakeStatus,
    /// Rail target written.
    RailTarget(RailId, Millivolts),
    /// Core supply switched.
    CoreSupply(RailId),
    /// System clock source selected.
    SystemClock(ClockSource),
    /// Deep-sleep-only processor bit written.
    SleepDeep(bool),
    /// Wait-for-interrupt executed with the given mode selected.
    WaitForInterrupt(PowerMode),
    /// Non-returning mode reached; the device resets.
    Restart(PowerMode),
}

/// Comparable view of the register file, without the event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterSnapshot {
    /// Control bits that are set.
    pub controls: BTreeSet<ControlBit>,
    /// Mode selector.
    pub mode: PowerMode,
    /// Enabled wake lines.
    pub wake_lines: BTreeSet<WakeLine>,
    /// Per-port GPIO wake masks.
    pub gpio_pins: [u32; 2],
    /// Rail targets and ready flags, in [`RailId::ALL`] order.
    pub rails: [(Millivolts, bool); 2],
    /// Rail feeding the core.
    pub core_supply: RailId,
    /// System clock source.
    pub clock: ClockSource,
}

/// Simulated power, clock and wake registers.
#[derive(Debug, Clone)]
pub struct RegisterFile {
    controls: BTreeSet<ControlBit>,
    mode: PowerMode,
    wake_lines: BTreeSet<WakeLine>,
    gpio_pins: [u32; 2],
    wake_pending: bool,
    rail_targets: [Millivolts; 2],
    rail_settling: [Settling; 2],
    core_supply: RailId,
    clock: ClockSource,
    clock_settling: Settling,
    brownouts: u32,
    events: Vec<SimEvent>,
}

impl Default for RegisterFile {
    /// Post-reset state: running from VCOREB at the run level on the
    /// 96 MHz oscillator, VCOREA not energised.
    fn default() -> Self {
        let run = Millivolts::new(RUN_VOLTAGE_MV);
        Self {
            controls: [
                ControlBit::HighFrequencyOscillator,
                ControlBit::InstructionCache,
                ControlBit::CacheMemoryPower,
                ControlBit::Bandgap,
                ControlBit::FastWakeup,
            ]
            .into_iter()
            .collect(),
            mode: PowerMode::Active,
            wake_lines: BTreeSet::new(),
            gpio_pins: [0; 2],
            wake_pending: false,
            rail_targets: [run; 2],
            rail_settling: [
                Settling::new(Settle::Immediate, false),
                Settling::new(Settle::Immediate, true),
            ],
            core_supply: RailId::VcoreB,
            clock: ClockSource::HighFrequency,
            clock_settling: Settling::new(Settle::Immediate, true),
            brownouts: 0,
            events: Vec::new(),
        }
    }
}

fn per_rail<T>(slots: &mut [T; 2], rail: RailId) -> &mut T {
    let [a, b] = slots;
    match rail {
        RailId::VcoreA => a,
        RailId::VcoreB => b,
    }
}

fn per_port<T>(slots: &mut [T; 2], port: GpioPort) -> &mut T {
    let [p0, p1] = slots;
    match port {
        GpioPort::P0 => p0,
        GpioPort::P1 => p1,
    }
}

impl RegisterFile {
    /// Comparable view of the current state.
    pub fn snapshot(&self) -> RegisterSnapshot {
        let [ta, tb] = self.rail_targets;
        let [sa, sb] = self.rail_settling;
        RegisterSnapshot {
            controls: self.controls.clone(),
            mode: self.mode,
            wake_lines: self.wake_lines.clone(),
            gpio_pins: self.gpio_pins,
            rails: [(ta, sa.ready), (tb, sb.ready)],
            core_supply: self.core_supply,
            clock: self.clock,
        }
    }

    /// Events recorded since the last [`RegisterFile::take_events`].
    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    /// Drain the event log.
    pub fn take_events(&mut self) -> Vec<SimEvent> {
        core::mem::take(&mut self.events)
    }

    /// Number of times the core supply was switched onto a rail that was
    /// not ready.
    pub fn brownouts(&self) -> u32 {
        self.brownouts
    }

    /// Latch or clear the wake status flag.
    pub fn set_wake_pending(&mut self, pending: bool) {
        self.wake_pending = pending;
    }

    /// Current mode selector.
    pub fn mode(&self) -> PowerMode {
        self.mode
    }

    /// Change how a rail settles after its next target write.
    pub fn set_rail_settle(&mut self, rail: RailId, settle: Settle) {
        per_rail(&mut self.rail_settling, rail).settle = settle;
    }

    /// Force a rail's ready flag, as the hardware does when it powers a
    /// rail up or down on its own.
    pub fn force_rail_ready(&mut self, rail: RailId, ready: bool) {
        per_rail(&mut self.rail_settling, rail).ready = ready;
    }

    /// Change how the system clock settles after its next switch.
    pub fn set_clock_settle(&mut self, settle: Settle) {
        self.clock_settling.settle = settle;
    }

    fn record(&mut self, event: SimEvent) {
        self.events.push(event);
    }
}

// ── SimRegisters ─────────────────────────────────────────────────────────────

/// Shared handle to a simulated register file.
///
/// Clones refer to the same registers, so a test can keep one handle while
/// the code under test owns another.
#[derive(Debug, Clone, Default)]
pub struct SimRegisters {
    file: Arc<Mutex<RegisterFile>>,
}

impl SimRegisters {
    /// Registers in their post-reset state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with exclusive access to the register file.
    pub fn with<T>(&self, f: impl FnOnce(&mut RegisterFile) -> T) -> T {
        f(&mut lock(&self.file))
    }

    /// Comparable view of the current state.
    pub fn snapshot(&self) -> RegisterSnapshot {
        self.with(|f| f.snapshot())
    }

    /// Drain the event log.
    pub fn take_events(&self) -> Vec<SimEvent> {
        self.with(RegisterFile::take_events)
    }

    /// Number of supply switches onto a rail that was not ready.
    pub fn brownouts(&self) -> u32 {
        self.with(|f| f.brownouts())
    }
}

impl PowerRegisters for SimRegisters {
    fn control(&self, bit: ControlBit) -> bool {
        self.with(|f| f.controls.contains(&bit))
    }

    fn set_control(&mut self, bit: ControlBit, enabled: bool) {
        self.with(|f| {
            if enabled {
                f.controls.insert(bit);
            } else {
                f.controls.remove(&bit);
            }
            f.record(SimEvent::Control(bit, enabled));
        });
    }

    fn mode_select(&self) -> PowerMode {
        self.with(|f| f.mode)
    }

    fn set_mode_select(&mut self, mode: PowerMode) {
        self.with(|f| {
            f.mode = mode;
            f.record(SimEvent::ModeSelect(mode));
        });
    }

    fn wake_enable(&self, line: WakeLine) -> bool {
        self.with(|f| f.wake_lines.contains(&line))
    }

    fn set_wake_enable(&mut self, line: WakeLine, enabled: bool) {
        self.with(|f| {
            if enabled {
                f.wake_lines.insert(line);
            } else {
                f.wake_lines.remove(&line);
            }
            f.record(SimEvent::WakeEnable(line, enabled));
        });
    }

    fn gpio_wake_pins(&self, port: GpioPort) -> u32 {
        self.with(|f| *per_port(&mut f.gpio_pins, port))
    }

    fn set_gpio_wake_pins(&mut self, port: GpioPort, mask: u32) {
        self.with(|f| {
            *per_port(&mut f.gpio_pins, port) = mask;
            f.record(SimEvent::GpioPins(port, mask));
        });
    }

    fn set_gpio_wake_edge(&mut self, port: GpioPort, pins: PinMask, edge: Edge) {
        self.with(|f| f.record(SimEvent::GpioEdge(port, pins.bits(), edge)));
    }

    fn wake_status_pending(&self) -> bool {
        self.with(|f| f.wake_pending)
    }

    fn clear_wake_status(&mut self) {
        self.with(|f| {
            f.wake_pending = false;
            f.record(SimEvent::ClearWakeStatus);
        });
    }

    fn rail_target(&self, rail: RailId) -> Millivolts {
        self.with(|f| *per_rail(&mut f.rail_targets, rail))
    }

    fn set_rail_target(&mut self, rail: RailId, level: Millivolts) {
        self.with(|f| {
            *per_rail(&mut f.rail_targets, rail) = level;
            per_rail(&mut f.rail_settling, rail).restart();
            f.record(SimEvent::RailTarget(rail, level));
        });
    }

    fn rail_ready(&self, rail: RailId) -> bool {
        self.with(|f| per_rail(&mut f.rail_settling, rail).poll())
    }

    fn core_supply(&self) -> RailId {
        self.with(|f| f.core_supply)
    }

    fn set_core_supply(&mut self, rail: RailId) {
        self.with(|f| {
            if !per_rail(&mut f.rail_settling, rail).ready {
                f.brownouts = f.brownouts.saturating_add(1);
            }
            f.core_supply = rail;
            f.record(SimEvent::CoreSupply(rail));
        });
    }

    fn system_clock(&self) -> ClockSource {
        self.with(|f| f.clock)
    }

    fn set_system_clock(&mut self, source: ClockSource) {
        self.with(|f| {
            f.clock = source;
            if f.controls.contains(&source.oscillator()) {
                f.clock_settling.restart();
            } else {
                f.clock_settling.ready = false;
            }
            f.record(SimEvent::SystemClock(source));
        });
    }

    fn system_clock_ready(&self) -> bool {
        self.with(|f| {
            let running = f.controls.contains(&f.clock.oscillator());
            running && f.clock_settling.poll()
        })
    }
}

// ── SimCpu ───────────────────────────────────────────────────────────────────

/// Payload of the unwind started by [`SimCpu::await_restart`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedRestart {
    /// Mode that was selected when the device went down.
    pub mode: PowerMode,
}

type SleepHook = Box<dyn FnMut(&mut RegisterFile) + Send>;

/// Simulated processor bound to a register file.
pub struct SimCpu {
    regs: SimRegisters,
    sleep_deep: bool,
    wfi_count: u32,
    spurious_wakes: u32,
    on_sleep: Option<SleepHook>,
}

impl SimCpu {
    /// Processor whose wake events are latched into `regs`.
    pub fn new(regs: SimRegisters) -> Self {
        Self {
            regs,
            sleep_deep: false,
            wfi_count: 0,
            spurious_wakes: 0,
            on_sleep: None,
        }
    }

    /// Run `hook` while the processor is halted, before the wake event is
    /// latched. Models whatever the hardware does during the sleep period.
    pub fn on_sleep(&mut self, hook: impl FnMut(&mut RegisterFile) + Send + 'static) {
        self.on_sleep = Some(Box::new(hook));
    }

    /// State of the deep-sleep-only bit.
    pub fn sleep_deep(&self) -> bool {
        self.sleep_deep
    }

    /// Number of wait-for-interrupt calls.
    pub fn wfi_count(&self) -> u32 {
        self.wfi_count
    }

    /// Number of wait-for-interrupt calls made while a wake flag was
    /// already latched.
    pub fn spurious_wakes(&self) -> u32 {
        self.spurious_wakes
    }
}

impl core::fmt::Debug for SimCpu {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimCpu")
            .field("sleep_deep", &self.sleep_deep)
            .field("wfi_count", &self.wfi_count)
            .field("spurious_wakes", &self.spurious_wakes)
            .finish_non_exhaustive()
    }
}

impl Cpu for SimCpu {
    fn set_sleep_deep(&mut self, enabled: bool) {
        self.sleep_deep = enabled;
        self.regs.with(|f| f.record(SimEvent::SleepDeep(enabled)));
    }

    fn wait_for_interrupt(&mut self) {
        self.wfi_count = self.wfi_count.saturating_add(1);
        let hook = &mut self.on_sleep;
        let spurious = &mut self.spurious_wakes;
        self.regs.with(|f| {
            if f.wake_pending {
                *spurious = spurious.saturating_add(1);
            }
            let mode = f.mode;
            f.record(SimEvent::WaitForInterrupt(mode));
            if let Some(hook) = hook.as_mut() {
                hook(f);
            }
            f.wake_pending = true;
            if mode.resumes_execution() {
                f.mode = PowerMode::Active;
            }
        });
    }

    fn await_restart(&mut self) -> ! {
        let mode = self.regs.with(|f| {
            let mode = f.mode;
            f.record(SimEvent::Restart(mode));
            mode
        });
        std::panic::panic_any(SimulatedRestart { mode })
    }
}

// ── SimInterconnect ──────────────────────────────────────────────────────────

type IrqHandler = Arc<dyn Fn() + Send + Sync>;

#[allow(clippy::cast_lossless)]
const SEMAPHORES: usize = SEMAPHORE_INSTANCES as usize;

#[derive(Default)]
struct Shared {
    semaphores: [AtomicBool; SEMAPHORES],
    inbox: [AtomicU32; 2],
    pending: [AtomicBool; 2],
    raised: [AtomicUsize; 2],
    handlers: [Mutex<Option<IrqHandler>>; 2],
}

fn per_core<T>(slots: &[T; 2], core: CoreId) -> &T {
    let [c0, c1] = slots;
    match core {
        CoreId::Core0 => c0,
        CoreId::Core1 => c1,
    }
}

impl Shared {
    fn semaphore(&self, sema: SemaphoreId) -> Option<&AtomicBool> {
        self.semaphores.get(usize::from(sema.get()))
    }

    fn interrupt(&self, core: CoreId) {
        per_core(&self.pending, core).store(true, Ordering::SeqCst);
        per_core(&self.raised, core).fetch_add(1, Ordering::SeqCst);
        // Clone out so the handler runs without the slot locked; it may
        // send straight back to this core.
        let handler = lock(per_core(&self.handlers, core)).clone();
        if let Some(handler) = handler {
            handler();
        }
    }
}

/// Semaphore bank and mailbox registers shared by both cores.
#[derive(Clone, Default)]
pub struct SimInterconnect {
    shared: Arc<Shared>,
}

impl SimInterconnect {
    /// Fresh interconnect: semaphores free, no interrupts pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mailbox endpoint for `core`.
    pub fn endpoint(&self, core: CoreId) -> SimMailbox {
        SimMailbox {
            core,
            shared: Arc::clone(&self.shared),
        }
    }

    /// Run `handler` whenever `core`'s mailbox interrupt is raised.
    ///
    /// The handler runs synchronously on the raising thread; forward to a
    /// channel to model a separate core.
    pub fn connect(&self, core: CoreId, handler: impl Fn() + Send + Sync + 'static) {
        *lock(per_core(&self.shared.handlers, core)) = Some(Arc::new(handler));
    }

    /// Stop dispatching `core`'s interrupt.
    pub fn disconnect(&self, core: CoreId) {
        *lock(per_core(&self.shared.handlers, core)) = None;
    }

    /// Times `core`'s mailbox interrupt has been raised.
    pub fn interrupts_raised(&self, core: CoreId) -> usize {
        per_core(&self.shared.raised, core).load(Ordering::SeqCst)
    }

    /// Whether `core` has an unserviced mailbox interrupt.
    pub fn interrupt_pending(&self, core: CoreId) -> bool {
        per_core(&self.shared.pending, core).load(Ordering::SeqCst)
    }

    /// Last word written to `core`'s inbound mailbox.
    pub fn inbox(&self, core: CoreId) -> u32 {
        per_core(&self.shared.inbox, core).load(Ordering::SeqCst)
    }

    /// Whether a semaphore is held.
    pub fn semaphore_held(&self, sema: SemaphoreId) -> bool {
        self.shared
            .semaphore(sema)
            .is_some_and(|s| s.load(Ordering::SeqCst))
    }
}

impl core::fmt::Debug for SimInterconnect {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimInterconnect").finish_non_exhaustive()
    }
}

/// One core's endpoint on a [`SimInterconnect`].
#[derive(Clone)]
pub struct SimMailbox {
    core: CoreId,
    shared: Arc<Shared>,
}

impl core::fmt::Debug for SimMailbox {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimMailbox")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl InterCoreMailbox for SimMailbox {
    fn core(&self) -> CoreId {
        self.core
    }

    fn try_acquire(&self, sema: SemaphoreId) -> bool {
        self.shared.semaphore(sema).is_some_and(|s| {
            s.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        })
    }

    fn release(&self, sema: SemaphoreId) {
        if let Some(s) = self.shared.semaphore(sema) {
            s.store(false, Ordering::Release);
        }
    }

    fn is_held(&self, sema: SemaphoreId) -> bool {
        self.shared
            .semaphore(sema)
            .is_some_and(|s| s.load(Ordering::Acquire))
    }

    fn send(&self, word: u32) {
        per_core(&self.shared.inbox, self.core.peer()).store(word, Ordering::SeqCst);
        self.raise_peer_interrupt();
    }

    fn raise_peer_interrupt(&self) {
        self.shared.interrupt(self.core.peer());
    }

    fn receive(&self) -> Option<u32> {
        per_core(&self.shared.pending, self.core)
            .swap(false, Ordering::SeqCst)
            .then(|| per_core(&self.shared.inbox, self.core).load(Ordering::SeqCst))
    }
}
