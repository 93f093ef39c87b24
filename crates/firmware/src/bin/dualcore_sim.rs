//! Dual-core low-power emulator
//!
//! Core 0 walks through a scripted set of low-power requests while core 1
//! services its mailbox on a separate task. The run ends with an approved
//! POWERDOWN, which exits the process.
//!
//! Run with: RUST_LOG=debug cargo run -p firmware --bin dualcore_sim --features emulator

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use embassy_time::{block_for, Duration};
use firmware::emulator::{interrupt_line, run_core};
use firmware::{request_with_retry, HostCpu, RetryPolicy};
use lowpower::{DualCoreArbiter, LpError, PowerConfig, PowerModeController};
use platform::config;
use platform::mocks::{Settle, SimInterconnect, SimMailbox, SimRegisters};
use platform::{
    CoreId, Edge, GpioPort, InterCoreMailbox, OperatingVoltage, PinMask, PowerMode, RailId,
    SemaphoreId, TimeDeadline, WakeSource,
};
use tracing_subscriber::EnvFilter;

const SEMAPHORE: u8 = 0;
const STEP_TIMEOUT: Duration = Duration::from_millis(50);

/// Set while core 1 pretends to be in a critical section.
static CORE1_BUSY: AtomicBool = AtomicBool::new(false);

fn core0_ready() -> Result<(), LpError> {
    Ok(())
}

fn core1_ready() -> Result<(), LpError> {
    if CORE1_BUSY.load(Ordering::SeqCst) {
        Err(LpError::Busy)
    } else {
        Ok(())
    }
}

type Controller = PowerModeController<SimRegisters, HostCpu>;

fn request(
    arbiter: &DualCoreArbiter<SimMailbox>,
    ctl: &mut Controller,
    mode: PowerMode,
) -> Result<(), LpError> {
    arbiter.request_mode(mode, ctl, &mut TimeDeadline::after(STEP_TIMEOUT))
}

/// Core 0's script.
fn run_core0(net: &SimInterconnect, arbiter: &DualCoreArbiter<SimMailbox>) -> Result<(), LpError> {
    let regs = SimRegisters::new();
    let cpu = HostCpu::new(CoreId::Core0, regs.clone());
    let mut ctl = PowerModeController::new(regs.clone(), cpu, PowerConfig::default())?;

    let mut wake = ctl.wake_sources();
    wake.arm(WakeSource::RtcAlarm);
    wake.arm(WakeSource::Gpio {
        port: GpioPort::P0,
        pins: PinMask::pin(3)?,
        edge: Edge::Falling,
    });

    tracing::info!("step 1: LOW_POWER with an idle peer");
    request(arbiter, &mut ctl, PowerMode::LowPower)?;

    tracing::info!("step 2: STANDBY while the peer is busy");
    CORE1_BUSY.store(true, Ordering::SeqCst);
    match request(arbiter, &mut ctl, PowerMode::Standby) {
        Err(LpError::BadState) => tracing::info!("declined by peer"),
        Ok(()) => tracing::warn!("expected a decline, peer approved"),
        Err(e) => tracing::warn!("expected a decline, got {}", e),
    }
    CORE1_BUSY.store(false, Ordering::SeqCst);

    tracing::info!("step 3: STANDBY while the peer holds the semaphore");
    let sema = SemaphoreId::try_new(SEMAPHORE)?;
    let holder = net.endpoint(CoreId::Core1);
    if holder.try_acquire(sema) {
        std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(3));
            holder.release(sema);
        });
    }
    request_with_retry(
        arbiter,
        PowerMode::Standby,
        &mut ctl,
        &mut TimeDeadline::after(STEP_TIMEOUT),
        RetryPolicy::default(),
        block_for,
    )?;

    tracing::info!("step 4: DEEPSLEEP with a slow core rail");
    regs.with(|f| f.set_rail_settle(RailId::VcoreB, Settle::AfterPolls(3)));
    request(arbiter, &mut ctl, PowerMode::DeepSleep)?;

    tracing::info!("step 5: DEEPSLEEP at 1.1 V, high rail up on wake");
    ctl.set_operating_voltage(OperatingVoltage::V1_1, &mut TimeDeadline::after(STEP_TIMEOUT))?;
    ctl.cpu_mut().sim_mut().on_sleep(|f| f.force_rail_ready(RailId::VcoreA, true));
    request(arbiter, &mut ctl, PowerMode::DeepSleep)?;
    tracing::info!(
        wfi = ctl.cpu().sim().wfi_count(),
        spurious = ctl.cpu().sim().spurious_wakes(),
        brownouts = regs.brownouts(),
        "core 0 sleep summary"
    );

    tracing::info!("step 6: POWERDOWN");
    request(arbiter, &mut ctl, PowerMode::PowerDown)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    tracing::info!(
        "{} v{} dual-core low-power emulator",
        config::APP_NAME,
        config::APP_VERSION
    );

    let net = SimInterconnect::new();
    let core0 = Arc::new(DualCoreArbiter::new(net.endpoint(CoreId::Core0)));
    let core1 = Arc::new(DualCoreArbiter::new(net.endpoint(CoreId::Core1)));
    let configured = core0
        .configure(core0_ready, SEMAPHORE)
        .and_then(|()| core1.configure(core1_ready, SEMAPHORE));
    if let Err(e) = configured {
        tracing::error!("configuration failed: {}", e);
        return ExitCode::FAILURE;
    }

    // Core 0's handler only records answers, so it runs on the raising thread.
    let handler = Arc::clone(&core0);
    net.connect(CoreId::Core0, move || {
        let _ = handler.handler();
    });
    let irq1 = interrupt_line(&net, CoreId::Core1);
    let core1_task = tokio::spawn(run_core(
        core1,
        irq1,
        HostCpu::new(CoreId::Core1, SimRegisters::new()),
    ));

    let script_net = net.clone();
    let script = tokio::task::spawn_blocking(move || run_core0(&script_net, &core0));
    let outcome = script.await;

    net.disconnect(CoreId::Core1);
    if let Ok(idles) = core1_task.await {
        tracing::info!("core 1 idled {} times", idles);
    }
    match outcome {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(e)) => {
            tracing::error!("scenario failed: {}", e);
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!("core 0 task failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
