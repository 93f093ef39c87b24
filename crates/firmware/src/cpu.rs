//! Cortex-M processor primitives.
//!
//! SLEEPDEEP lives in the System Control Block, so the CPU handle owns the
//! `SCB` peripheral taken from `cortex_m::Peripherals`.

use cortex_m::peripheral::SCB;
use platform::Cpu;

/// [`Cpu`] for a Cortex-M core.
pub struct CortexMCpu {
    scb: SCB,
}

impl CortexMCpu {
    /// Take over the System Control Block.
    pub fn new(scb: SCB) -> Self {
        Self { scb }
    }

    /// Give the System Control Block back.
    pub fn free(self) -> SCB {
        self.scb
    }
}

impl Cpu for CortexMCpu {
    fn set_sleep_deep(&mut self, enabled: bool) {
        if enabled {
            self.scb.set_sleepdeep();
        } else {
            self.scb.clear_sleepdeep();
        }
    }

    fn wait_for_interrupt(&mut self) {
        // Complete outstanding register writes before the core stops.
        cortex_m::asm::dsb();
        cortex_m::asm::wfi();
    }

    fn await_restart(&mut self) -> ! {
        info!("waiting for reset");
        loop {
            cortex_m::asm::wfi();
        }
    }
}
