//! Energy regeneration.
//!
//! Energy accrues in whole units, one per `REGEN_INTERVAL_MS`, up to the
//! profile's maximum. The last-update timestamp only advances when at least
//! one whole unit accrued; advancing it on every call would throw away the
//! fractional progress toward the next unit and slow effective regeneration.

/// Milliseconds per regenerated energy unit.
pub const REGEN_INTERVAL_MS: f64 = 30_000.0;

/// Default energy capacity for a fresh profile.
pub const DEFAULT_MAX_ENERGY: f64 = 100.0;

/// Compute regenerated energy since `last_update_ms`.
///
/// Returns `(new_energy, new_last_update)`. Clamps rather than fails:
/// a negative delta counts as zero accrual, energy never exceeds
/// `max_energy`, and the timestamp is untouched unless a unit accrued.
pub fn regen(
    current_energy: f64,
    last_update_ms: f64,
    max_energy: f64,
    now_ms: f64,
) -> (f64, f64) {
    let elapsed = (now_ms - last_update_ms).max(0.0);
    let accrued = (elapsed / REGEN_INTERVAL_MS).floor();
    if accrued <= 0.0 {
        return (current_energy.min(max_energy), last_update_ms);
    }
    let new_energy = (current_energy + accrued).min(max_energy);
    (new_energy, now_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_accrual_below_one_interval() {
        let (energy, stamp) = regen(10.0, 0.0, 100.0, REGEN_INTERVAL_MS - 1.0);
        assert!((energy - 10.0).abs() < f64::EPSILON);
        // Fractional progress preserved: stamp stays at the old value.
        assert!((stamp - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn one_unit_per_interval() {
        let (energy, stamp) = regen(10.0, 0.0, 100.0, REGEN_INTERVAL_MS);
        assert!((energy - 11.0).abs() < f64::EPSILON);
        assert!((stamp - REGEN_INTERVAL_MS).abs() < f64::EPSILON);
    }

    #[test]
    fn multiple_units_floor_division() {
        // 2.5 intervals → 2 units, stamp advances to now (remainder is
        // implicitly dropped; next call restarts from now).
        let now = REGEN_INTERVAL_MS * 2.5;
        let (energy, stamp) = regen(0.0, 0.0, 100.0, now);
        assert!((energy - 2.0).abs() < f64::EPSILON);
        assert!((stamp - now).abs() < f64::EPSILON);
    }

    #[test]
    fn clamped_at_max() {
        let now = REGEN_INTERVAL_MS * 1000.0;
        let (energy, _) = regen(95.0, 0.0, 100.0, now);
        assert!((energy - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn negative_delta_is_zero_accrual() {
        let (energy, stamp) = regen(10.0, 5_000.0, 100.0, 1_000.0);
        assert!((energy - 10.0).abs() < f64::EPSILON);
        assert!((stamp - 5_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn over_max_input_is_clamped_down() {
        let (energy, _) = regen(150.0, 0.0, 100.0, 0.0);
        assert!((energy - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn timestamp_stability_example_from_design() {
        // last=0, now=29999, interval=30000 → stamp stays 0, energy unchanged.
        let (energy, stamp) = regen(3.0, 0.0, 100.0, 29_999.0);
        assert!((energy - 3.0).abs() < f64::EPSILON);
        assert!((stamp - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn fractional_progress_not_lost_across_calls() {
        // Two calls 20s apart each: naive stamp-advance would yield 0 units,
        // preserving the stamp yields 1 unit at 40s.
        let (e1, s1) = regen(0.0, 0.0, 100.0, 20_000.0);
        assert!((e1 - 0.0).abs() < f64::EPSILON);
        let (e2, _) = regen(e1, s1, 100.0, 40_000.0);
        assert!((e2 - 1.0).abs() < f64::EPSILON);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// New energy stays within `[current, max]` whenever the inputs are
        /// already in range.
        #[test]
        fn prop_regen_monotonic_and_bounded(
            current in 0.0f64..100.0,
            last in 0.0f64..1e12,
            ahead in 0.0f64..1e9,
        ) {
            let max = 100.0;
            let (energy, _) = regen(current, last, max, last + ahead);
            prop_assert!(energy >= current - f64::EPSILON);
            prop_assert!(energy <= max + f64::EPSILON);
        }

        /// Stamp never moves backwards and only moves when a unit accrued.
        #[test]
        fn prop_stamp_advances_only_with_accrual(
            current in 0.0f64..100.0,
            last in 0.0f64..1e12,
            ahead in 0.0f64..1e9,
        ) {
            let now = last + ahead;
            let (energy, stamp) = regen(current, last, 100.0, now);
            if energy > current {
                prop_assert!((stamp - now).abs() < f64::EPSILON);
            } else {
                prop_assert!((stamp - last).abs() < f64::EPSILON);
            }
        }

        /// Splitting a span across two calls loses at most one unit (the
        /// sub-unit remainder dropped when the stamp advances), never more.
        #[test]
        fn prop_split_calls_lose_at_most_one_unit(
            mid in 0.0f64..500_000.0,
            rest in 0.0f64..500_000.0,
        ) {
            let total = mid + rest;
            let (single, _) = regen(0.0, 0.0, 1e9, total);
            let (e1, s1) = regen(0.0, 0.0, 1e9, mid);
            let (split, _) = regen(e1, s1, 1e9, total);
            prop_assert!(split <= single + f64::EPSILON,
                "split {} > single {}", split, single);
            prop_assert!(split >= single - 1.0 - f64::EPSILON,
                "split {} lost more than one unit vs {}", split, single);
        }
    }
}
