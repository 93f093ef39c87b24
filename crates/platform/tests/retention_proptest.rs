//! Property-based tests for the power-mode ordering.
//! A deeper mode never retains anything a shallower mode gives up.

use platform::{PowerMode, Resources};
use proptest::prelude::*;

fn any_mode() -> impl Strategy<Value = PowerMode> {
    (0u8..8).prop_map(|code| PowerMode::try_from(code).unwrap_or_default())
}

proptest::proptest! {
    /// retention(deeper) ⊆ retention(shallower) for every ordered pair.
    #[test]
    fn deeper_modes_retain_subsets(a in any_mode(), b in any_mode()) {
        let (shallow, deep) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(
            deep.retention().is_subset_of(shallow.retention()),
            "{} retains more than {}", deep, shallow
        );
    }

    /// Ordering agrees with the numeric mode code.
    #[test]
    fn ordering_matches_codes(a in any_mode(), b in any_mode()) {
        prop_assert_eq!(a < b, (a as u8) < (b as u8));
    }

    /// Codes above the deepest mode never decode.
    #[test]
    fn invalid_codes_rejected(code in 8u8..=u8::MAX) {
        prop_assert!(PowerMode::try_from(code).is_err());
    }

    /// Only modes that keep CPU state resume after the entry point.
    #[test]
    fn resuming_modes_keep_cpu_state(mode in any_mode()) {
        if mode.resumes_execution() {
            prop_assert!(mode.retention().contains(Resources::CPU_STATE));
        } else {
            prop_assert!(!mode.retention().contains(Resources::CPU_STATE));
        }
    }
}

#[test]
fn extremes_of_the_table() {
    assert_eq!(PowerMode::Active.retention(), Resources::ALL);
    assert_eq!(PowerMode::PowerDown.retention(), Resources::NONE);
    assert!(!PowerMode::DeepSleep
        .retention()
        .contains(Resources::CORE_RAIL_RUN_LEVEL));
}
