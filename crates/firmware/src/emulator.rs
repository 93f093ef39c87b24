//! Desktop two-core emulator support.
//!
//! Each simulated core runs as its own tokio task over a shared
//! [`SimInterconnect`]. A core's mailbox interrupt is forwarded over a
//! channel so its handler runs on that core's task, not on the sender's.

use std::sync::Arc;

use lowpower::{DualCoreArbiter, HandlerOutcome};
use platform::mocks::{SimCpu, SimInterconnect, SimMailbox, SimRegisters};
use platform::{CoreId, Cpu, InterCoreMailbox, PowerRegisters};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

/// Simulated processor whose reset ends the emulator process.
///
/// Wraps [`SimCpu`] so sleep and wake behave like the host tests, but
/// BACKUP and POWERDOWN exit cleanly instead of unwinding.
pub struct HostCpu {
    core: CoreId,
    regs: SimRegisters,
    sim: SimCpu,
}

impl HostCpu {
    /// Processor for `core` bound to `regs`.
    pub fn new(core: CoreId, regs: SimRegisters) -> Self {
        let sim = SimCpu::new(regs.clone());
        Self { core, regs, sim }
    }

    /// The wrapped simulation.
    pub fn sim(&self) -> &SimCpu {
        &self.sim
    }

    /// The wrapped simulation, to install sleep hooks.
    pub fn sim_mut(&mut self) -> &mut SimCpu {
        &mut self.sim
    }
}

impl Cpu for HostCpu {
    fn set_sleep_deep(&mut self, enabled: bool) {
        self.sim.set_sleep_deep(enabled);
    }

    fn wait_for_interrupt(&mut self) {
        tracing::trace!(core = %self.core, mode = %self.regs.mode_select(), "wfi");
        self.sim.wait_for_interrupt();
    }

    fn await_restart(&mut self) -> ! {
        tracing::info!(core = %self.core, mode = %self.regs.mode_select(), "halted until reset");
        std::process::exit(0)
    }
}

/// Forward `core`'s mailbox interrupt to a channel, one message per raise.
pub fn interrupt_line(net: &SimInterconnect, core: CoreId) -> UnboundedReceiver<()> {
    let (tx, rx) = unbounded_channel();
    net.connect(core, move || {
        let _ = tx.send(());
    });
    rx
}

/// Service `arbiter`'s mailbox interrupts until the line is disconnected,
/// idling `cpu` whenever a peer request was approved.
///
/// Returns how many times the core idled for its peer.
pub async fn run_core(
    arbiter: Arc<DualCoreArbiter<SimMailbox>>,
    mut irq: UnboundedReceiver<()>,
    mut cpu: HostCpu,
) -> u32 {
    let core = arbiter.mailbox().core();
    let mut idles = 0u32;
    while irq.recv().await.is_some() {
        match arbiter.handler() {
            Ok(HandlerOutcome::Approved) => tracing::info!(%core, "approved peer request"),
            Ok(HandlerOutcome::Declined) => tracing::info!(%core, "declined peer request"),
            Ok(HandlerOutcome::ResponseRecorded) => tracing::debug!(%core, "answer recorded"),
            Ok(HandlerOutcome::Ignored) => tracing::debug!(%core, "unknown mailbox word"),
            Err(_) => tracing::trace!(%core, "mailbox event for another handler"),
        }
        if arbiter.idle_if_requested(&mut cpu) {
            idles = idles.saturating_add(1);
        }
    }
    idles
}
