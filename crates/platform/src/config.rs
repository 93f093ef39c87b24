//! Board and protocol constants
//!
//! Central values shared by both cores. Everything that crosses the
//! inter-core mailbox or that both cores must agree on lives here, so the
//! two firmware images cannot drift apart silently.

/// Project name used in banners and logs.
pub const APP_NAME: &str = "Dual-Core Low Power";

/// Version (synchronized with Cargo.toml)
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// ── Inter-core protocol words ────────────────────────────────────────────────

/// Word written into the peer's mailbox to ask for consent to a low-power mode.
pub const LP_REQUEST_TAG: u32 = 0x0005_1EE4;

/// Sentinel held in the requester's response slot while the peer has not answered.
///
/// Distinct from every word a responder may legitimately write.
pub const RESPONSE_PENDING: u32 = 0xA5A5_A5A5;

/// Response word: the peer can tolerate the requested collapse.
pub const RESPONSE_APPROVED: u32 = 0;

/// Response word: the peer still needs a clock, rail or memory bank.
///
/// Two's-complement `-5`, the bad-state code used by the vendor SDK.
pub const RESPONSE_DECLINED: u32 = 0xFFFF_FFFB;

/// Number of hardware semaphores in the shared semaphore block.
pub const SEMAPHORE_INSTANCES: u8 = 8;

// ── Voltages ─────────────────────────────────────────────────────────────────

/// Core rail level while running from the high-frequency oscillator (mV).
pub const RUN_VOLTAGE_MV: u16 = 1000;

/// Core rail level held during deep sleep (mV).
pub const DEEPSLEEP_VOLTAGE_MV: u16 = 850;

/// Lowest level the core regulator can be programmed to (mV).
pub const CORE_RAIL_MIN_MV: u16 = 500;

/// Highest level the core regulator can be programmed to (mV).
pub const CORE_RAIL_MAX_MV: u16 = 1300;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_sentinel_is_not_a_response() {
        assert_ne!(RESPONSE_PENDING, RESPONSE_APPROVED);
        assert_ne!(RESPONSE_PENDING, RESPONSE_DECLINED);
        assert_ne!(RESPONSE_PENDING, LP_REQUEST_TAG);
    }

    #[test]
    fn request_tag_is_not_a_response() {
        assert_ne!(LP_REQUEST_TAG, RESPONSE_APPROVED);
        assert_ne!(LP_REQUEST_TAG, RESPONSE_DECLINED);
    }

    #[test]
    #[allow(clippy::assertions_on_constants)]
    fn deep_sleep_voltage_below_run_voltage() {
        assert!(DEEPSLEEP_VOLTAGE_MV < RUN_VOLTAGE_MV);
        assert!(CORE_RAIL_MIN_MV <= DEEPSLEEP_VOLTAGE_MV);
        assert!(RUN_VOLTAGE_MV <= CORE_RAIL_MAX_MV);
    }
}
