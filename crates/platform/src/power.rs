//! Power modes and wake sources
//!
//! `PowerMode` is totally ordered from shallowest to deepest. Each mode
//! retains a subset of what every shallower mode retains, which
//! [`PowerMode::retention`] encodes as a table.

use crate::range::OutOfRangeError;

/// Power modes, shallowest first.
///
/// The derived `Ord` follows declaration order, so `Sleep < DeepSleep`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PowerMode {
    /// CPU executing.
    #[default]
    Active = 0,
    /// CPU halted, clocks and peripherals running.
    Sleep = 1,
    /// CPU halted, peripherals on the high-frequency clock keep running.
    LowPower = 2,
    /// High-frequency clock gated, low-frequency peripherals running.
    MicroPower = 3,
    /// Only the low-frequency domain and retained state remain.
    Standby = 4,
    /// Core rail lowered to the retention level, SRAM retained.
    DeepSleep = 5,
    /// CPU state lost, retained SRAM and RTC domain only. Exits through reset.
    Backup = 6,
    /// Everything off. Exits through reset.
    PowerDown = 7,
}

impl PowerMode {
    /// All modes, shallowest first.
    pub const ALL: [PowerMode; 8] = [
        PowerMode::Active,
        PowerMode::Sleep,
        PowerMode::LowPower,
        PowerMode::MicroPower,
        PowerMode::Standby,
        PowerMode::DeepSleep,
        PowerMode::Backup,
        PowerMode::PowerDown,
    ];

    /// Resources preserved while parked in this mode.
    #[must_use]
    pub const fn retention(self) -> Resources {
        match self {
            Self::Active => Resources::ALL,
            Self::Sleep => Resources::ALL.without(Resources::CPU_CLOCK),
            Self::LowPower => Resources::CPU_STATE
                .with(Resources::SRAM)
                .with(Resources::LOW_FREQ_REFERENCE)
                .with(Resources::BACKGROUND_ANALOG)
                .with(Resources::CORE_RAIL_RUN_LEVEL)
                .with(Resources::INSTRUCTION_CACHE)
                .with(Resources::HIGH_FREQ_CLOCK),
            Self::MicroPower => Self::LowPower.retention().without(Resources::HIGH_FREQ_CLOCK),
            Self::Standby => Self::MicroPower
                .retention()
                .without(Resources::INSTRUCTION_CACHE),
            Self::DeepSleep => Self::Standby
                .retention()
                .without(Resources::BACKGROUND_ANALOG)
                .without(Resources::CORE_RAIL_RUN_LEVEL),
            Self::Backup => Resources::SRAM.with(Resources::LOW_FREQ_REFERENCE),
            Self::PowerDown => Resources::NONE,
        }
    }

    /// Whether a wake event resumes execution after the entry point.
    ///
    /// `Backup` and `PowerDown` only exit through a full reset.
    #[must_use]
    pub const fn resumes_execution(self) -> bool {
        (self as u8) <= (Self::DeepSleep as u8)
    }

    /// Whether the deep-sleep-only processor bit must be set for this mode.
    #[must_use]
    pub const fn uses_sleep_deep(self) -> bool {
        (self as u8) >= (Self::LowPower as u8)
    }

    /// Whether a dual-core request may target this mode.
    #[must_use]
    pub const fn is_arbitrated(self) -> bool {
        (self as u8) >= (Self::LowPower as u8)
    }
}

impl TryFrom<u8> for PowerMode {
    type Error = OutOfRangeError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(usize::from(code))
            .copied()
            .ok_or(OutOfRangeError {
                value: u32::from(code),
                min: 0,
                max: Self::PowerDown as u32,
            })
    }
}

impl core::fmt::Display for PowerMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Active => "ACTIVE",
            Self::Sleep => "SLEEP",
            Self::LowPower => "LOW_POWER",
            Self::MicroPower => "MICRO_POWER",
            Self::Standby => "STANDBY",
            Self::DeepSleep => "DEEPSLEEP",
            Self::Backup => "BACKUP",
            Self::PowerDown => "POWERDOWN",
        })
    }
}

// ── Resources ────────────────────────────────────────────────────────────────

/// Set of clocks, memories and analog blocks.
///
/// Used both for what a mode retains and for what a wake source needs to
/// stay powered in order to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Resources(u8);

impl Resources {
    /// Empty set.
    pub const NONE: Self = Self(0);
    /// CPU register and pipeline state.
    pub const CPU_STATE: Self = Self(1 << 0);
    /// CPU clock running.
    pub const CPU_CLOCK: Self = Self(1 << 1);
    /// System SRAM contents.
    pub const SRAM: Self = Self(1 << 2);
    /// High-frequency oscillator running.
    pub const HIGH_FREQ_CLOCK: Self = Self(1 << 3);
    /// 32 kHz reference running.
    pub const LOW_FREQ_REFERENCE: Self = Self(1 << 4);
    /// Instruction cache powered and valid.
    pub const INSTRUCTION_CACHE: Self = Self(1 << 5);
    /// Core rail held at its run level.
    pub const CORE_RAIL_RUN_LEVEL: Self = Self(1 << 6);
    /// Bandgap and the analog blocks it feeds.
    pub const BACKGROUND_ANALOG: Self = Self(1 << 7);
    /// Every resource.
    pub const ALL: Self = Self(u8::MAX);

    /// Union of two sets.
    #[must_use]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// `self` minus `other`.
    #[must_use]
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Whether every resource in `other` is in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether `self` is a subset of `other`.
    #[must_use]
    pub const fn is_subset_of(self, other: Self) -> bool {
        other.contains(self)
    }

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }
}

// ── Wake sources ─────────────────────────────────────────────────────────────

/// GPIO ports that can wake the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GpioPort {
    /// Port 0
    P0,
    /// Port 1
    P1,
}

impl GpioPort {
    /// All wake-capable ports.
    pub const ALL: [GpioPort; 2] = [GpioPort::P0, GpioPort::P1];

    /// Register index of this port.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::P0 => 0,
            Self::P1 => 1,
        }
    }
}

/// Non-empty set of pins on one port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct PinMask(u32);

impl PinMask {
    /// Create a mask.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] if `bits` selects no pin.
    pub fn try_new(bits: u32) -> Result<Self, OutOfRangeError> {
        if bits == 0 {
            Err(OutOfRangeError {
                value: 0,
                min: 1,
                max: u32::MAX,
            })
        } else {
            Ok(Self(bits))
        }
    }

    /// Mask selecting a single pin.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] if `pin` is not below 32.
    pub fn pin(pin: u8) -> Result<Self, OutOfRangeError> {
        1u32.checked_shl(u32::from(pin))
            .map(Self)
            .ok_or(OutOfRangeError {
                value: u32::from(pin),
                min: 0,
                max: 31,
            })
    }

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }
}

/// Edge that triggers a GPIO wake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    /// Low-to-high transition.
    Rising,
    /// High-to-low transition.
    Falling,
    /// Either transition.
    Both,
}

/// Timer instance that can run from the low-frequency domain.
///
/// Only instances 4 and 5 keep counting in the deep modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerInstance(u8);

impl TimerInstance {
    /// Lowest wake-capable instance.
    pub const MIN: u8 = 4;
    /// Highest wake-capable instance.
    pub const MAX: u8 = 5;

    /// Create a timer instance.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] for instances that cannot wake the device.
    pub fn try_new(instance: u8) -> Result<Self, OutOfRangeError> {
        if (Self::MIN..=Self::MAX).contains(&instance) {
            Ok(Self(instance))
        } else {
            Err(OutOfRangeError {
                value: u32::from(instance),
                min: u32::from(Self::MIN),
                max: u32::from(Self::MAX),
            })
        }
    }

    /// Instance number.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

/// Low-power comparator channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ComparatorChannel(u8);

impl ComparatorChannel {
    /// Number of comparator channels.
    pub const COUNT: u8 = 4;

    /// Create a comparator channel.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] if `channel >= COUNT`.
    pub fn try_new(channel: u8) -> Result<Self, OutOfRangeError> {
        if channel < Self::COUNT {
            Ok(Self(channel))
        } else {
            Err(OutOfRangeError {
                value: u32::from(channel),
                min: 0,
                max: u32::from(Self::COUNT).saturating_sub(1),
            })
        }
    }

    /// Channel number.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

/// Event that can bring the device out of a low-power mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WakeSource {
    /// Edge on one or more pins of a port.
    Gpio {
        /// Port the pins belong to.
        port: GpioPort,
        /// Pins that trigger the wake.
        pins: PinMask,
        /// Triggering edge.
        edge: Edge,
    },
    /// RTC alarm.
    RtcAlarm,
    /// Low-frequency timer expiry.
    Timer(TimerInstance),
    /// Low-power comparator trip.
    Comparator(ComparatorChannel),
    /// USB bus activity.
    Usb,
    /// Dedicated wake-up timer.
    WakeupTimer,
}

impl WakeSource {
    /// Enable line this source is gated by.
    #[must_use]
    pub const fn line(self) -> WakeLine {
        match self {
            Self::Gpio { port, .. } => WakeLine::Gpio(port),
            Self::RtcAlarm => WakeLine::Rtc,
            Self::Timer(t) => WakeLine::Timer(t),
            Self::Comparator(c) => WakeLine::Comparator(c),
            Self::Usb => WakeLine::Usb,
            Self::WakeupTimer => WakeLine::WakeupTimer,
        }
    }
}

/// Single enable bit in the wake-enable registers.
///
/// GPIO wake has one master enable per port; individual pins are selected
/// by a separate per-port mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WakeLine {
    /// Master GPIO wake enable for one port.
    Gpio(GpioPort),
    /// RTC alarm wake.
    Rtc,
    /// Low-frequency timer wake.
    Timer(TimerInstance),
    /// Comparator wake.
    Comparator(ComparatorChannel),
    /// USB wake.
    Usb,
    /// Wake-up timer wake.
    WakeupTimer,
}

impl WakeLine {
    /// Resources that must stay powered for this line to fire.
    #[must_use]
    pub const fn requires(self) -> Resources {
        match self {
            Self::Rtc | Self::Timer(_) | Self::WakeupTimer => Resources::LOW_FREQ_REFERENCE,
            Self::Comparator(_) => Resources::BACKGROUND_ANALOG,
            Self::Gpio(_) | Self::Usb => Resources::NONE,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn modes_are_ordered_shallow_to_deep() {
        for pair in PowerMode::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn try_from_round_trips_codes() {
        for mode in PowerMode::ALL {
            assert_eq!(PowerMode::try_from(mode as u8).unwrap(), mode);
        }
        assert!(PowerMode::try_from(8).is_err());
    }

    #[test]
    fn only_backup_and_power_down_end_in_reset() {
        assert!(PowerMode::DeepSleep.resumes_execution());
        assert!(!PowerMode::Backup.resumes_execution());
        assert!(!PowerMode::PowerDown.resumes_execution());
    }

    #[test]
    fn arbitrated_modes_start_at_low_power() {
        assert!(!PowerMode::Sleep.is_arbitrated());
        assert!(PowerMode::LowPower.is_arbitrated());
        assert!(PowerMode::PowerDown.is_arbitrated());
    }

    #[test]
    fn comparator_wake_needs_background_analog() {
        let c = ComparatorChannel::try_new(2).unwrap();
        assert!(WakeLine::Comparator(c)
            .requires()
            .contains(Resources::BACKGROUND_ANALOG));
        assert_eq!(WakeLine::Usb.requires(), Resources::NONE);
    }

    #[test]
    fn timer_instances_limited_to_low_frequency_timers() {
        assert!(TimerInstance::try_new(3).is_err());
        assert!(TimerInstance::try_new(4).is_ok());
        assert!(TimerInstance::try_new(5).is_ok());
        assert!(TimerInstance::try_new(6).is_err());
    }

    #[test]
    fn comparator_channels_limited_to_four() {
        assert!(ComparatorChannel::try_new(3).is_ok());
        assert!(ComparatorChannel::try_new(4).is_err());
    }

    #[test]
    fn pin_mask_rejects_empty_and_wide_pins() {
        assert!(PinMask::try_new(0).is_err());
        assert_eq!(PinMask::pin(31).unwrap().bits(), 1 << 31);
        assert!(PinMask::pin(32).is_err());
    }
}
