//! Wake-source registry
//!
//! Arms and disarms the events allowed to bring the device out of a
//! low-power mode. GPIO wake is two-level: a per-pin mask and a per-port
//! master enable. The master is cleared only once its port has no pins
//! left, so disarming one pin never silences another.

use heapless::Vec;
use platform::{
    ComparatorChannel, GpioPort, PowerRegisters, Resources, TimerInstance, WakeLine, WakeSource,
};

/// Number of distinct wake-enable lines.
pub const WAKE_LINES: usize = 11;

/// Wake-enable state read back from the registers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmedSet {
    /// Enabled lines, in register order.
    pub lines: Vec<WakeLine, WAKE_LINES>,
    /// Per-port GPIO wake masks, indexed by [`GpioPort::index`].
    pub gpio_pins: [u32; 2],
}

impl ArmedSet {
    /// Read the armed set from the registers.
    pub fn read<R: PowerRegisters + ?Sized>(regs: &R) -> Self {
        let mut lines = Vec::new();
        for line in all_lines().filter(|line| regs.wake_enable(*line)) {
            // Capacity equals the number of lines, so this never fails.
            let _ = lines.push(line);
        }
        let [p0, p1] = GpioPort::ALL;
        Self {
            lines,
            gpio_pins: [regs.gpio_wake_pins(p0), regs.gpio_wake_pins(p1)],
        }
    }

    /// Whether nothing can wake the device.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Resources the armed lines need to stay powered.
    pub fn requires(&self) -> Resources {
        self.lines
            .iter()
            .fold(Resources::NONE, |acc, line| acc.with(line.requires()))
    }
}

/// Every wake-enable line, in register order.
pub fn all_lines() -> impl Iterator<Item = WakeLine> {
    let gpio = GpioPort::ALL.into_iter().map(WakeLine::Gpio);
    let timers = (TimerInstance::MIN..=TimerInstance::MAX)
        .filter_map(|t| TimerInstance::try_new(t).ok())
        .map(WakeLine::Timer);
    let comparators = (0..ComparatorChannel::COUNT)
        .filter_map(|c| ComparatorChannel::try_new(c).ok())
        .map(WakeLine::Comparator);
    gpio.chain(core::iter::once(WakeLine::Rtc))
        .chain(timers)
        .chain(comparators)
        .chain([WakeLine::Usb, WakeLine::WakeupTimer])
}

/// Arms and disarms wake sources on a register block.
pub struct WakeRegistry<'a, R: ?Sized> {
    regs: &'a mut R,
}

impl<'a, R: PowerRegisters + ?Sized> WakeRegistry<'a, R> {
    /// Registry operating on `regs`.
    pub fn new(regs: &'a mut R) -> Self {
        Self { regs }
    }

    /// Allow `source` to wake the device. Arming twice is a no-op.
    pub fn arm(&mut self, source: WakeSource) {
        match source {
            WakeSource::Gpio { port, pins, edge } => {
                self.regs.set_gpio_wake_edge(port, pins, edge);
                let mask = self.regs.gpio_wake_pins(port) | pins.bits();
                self.regs.set_gpio_wake_pins(port, mask);
                self.regs.set_wake_enable(WakeLine::Gpio(port), true);
            }
            other => self.regs.set_wake_enable(other.line(), true),
        }
    }

    /// Stop `source` from waking the device.
    ///
    /// For GPIO the port master enable is cleared only when no pin of the
    /// port remains armed.
    pub fn disarm(&mut self, source: WakeSource) {
        match source {
            WakeSource::Gpio { port, pins, .. } => {
                let remaining = self.regs.gpio_wake_pins(port) & !pins.bits();
                self.regs.set_gpio_wake_pins(port, remaining);
                if remaining == 0 {
                    self.regs.set_wake_enable(WakeLine::Gpio(port), false);
                }
            }
            other => self.regs.set_wake_enable(other.line(), false),
        }
    }

    /// Whether `source` is currently able to wake the device.
    pub fn is_armed(&self, source: WakeSource) -> bool {
        let line_on = self.regs.wake_enable(source.line());
        match source {
            WakeSource::Gpio { port, pins, .. } => {
                line_on && self.regs.gpio_wake_pins(port) & pins.bits() == pins.bits()
            }
            _ => line_on,
        }
    }

    /// Current armed set.
    pub fn armed(&self) -> ArmedSet {
        ArmedSet::read(&*self.regs)
    }

    /// Clear every latched wake flag.
    pub fn clear_pending(&mut self) {
        self.regs.clear_wake_status();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;
    use platform::mocks::SimRegisters;
    use platform::{Edge, PinMask};

    fn gpio(port: GpioPort, pins: u32) -> WakeSource {
        WakeSource::Gpio {
            port,
            pins: PinMask::try_new(pins).unwrap(),
            edge: Edge::Rising,
        }
    }

    #[test]
    fn line_table_has_every_line_once() {
        let lines: std::vec::Vec<_> = all_lines().collect();
        assert_eq!(lines.len(), WAKE_LINES);
        for (i, a) in lines.iter().enumerate() {
            assert!(!lines.iter().skip(i + 1).any(|b| b == a));
        }
    }

    #[test]
    fn disarming_one_pin_keeps_port_master() {
        let mut regs = SimRegisters::new();
        let mut reg = WakeRegistry::new(&mut regs);
        reg.arm(gpio(GpioPort::P0, 0b01));
        reg.arm(gpio(GpioPort::P0, 0b10));
        reg.disarm(gpio(GpioPort::P0, 0b01));
        assert!(reg.is_armed(gpio(GpioPort::P0, 0b10)));
        assert!(!reg.is_armed(gpio(GpioPort::P0, 0b01)));
        reg.disarm(gpio(GpioPort::P0, 0b10));
        assert!(reg.armed().is_empty());
    }

    #[test]
    fn ports_have_independent_masters() {
        let mut regs = SimRegisters::new();
        let mut reg = WakeRegistry::new(&mut regs);
        reg.arm(gpio(GpioPort::P0, 0b1));
        reg.arm(gpio(GpioPort::P1, 0b1));
        reg.disarm(gpio(GpioPort::P1, 0b1));
        assert!(reg.is_armed(gpio(GpioPort::P0, 0b1)));
        assert_eq!(reg.armed().gpio_pins, [0b1, 0]);
    }

    #[test]
    fn comparator_wake_requires_background_analog() {
        let mut regs = SimRegisters::new();
        let mut reg = WakeRegistry::new(&mut regs);
        reg.arm(WakeSource::Comparator(ComparatorChannel::try_new(1).unwrap()));
        assert!(reg.armed().requires().contains(Resources::BACKGROUND_ANALOG));
    }

    #[test]
    fn clear_pending_clears_wake_status() {
        let mut regs = SimRegisters::new();
        regs.with(|f| f.set_wake_pending(true));
        WakeRegistry::new(&mut regs).clear_pending();
        assert!(!regs.wake_status_pending());
    }
}
