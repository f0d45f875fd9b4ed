//! Deterministic bucketing for rollout checks and distribution selection.
//!
//! Every entity is mapped to an integer bucket in `[0, 1000)`:
//!
//! ```text
//! crc32("<segment id><entity id>") % 1000  -> bucket
//! ```
//!
//! CRC-32 uses the IEEE polynomial (`0xEDB88320` reflected) and the two parts are concatenated with
//! no separator. The salt is scoped to the segment, so editing one segment never moves entities in
//! another. The same bucket drives the rollout check and the distribution choice. Client-side
//! evaluators must reproduce this exactly.

use crc32fast::Hasher;

use crate::segment::Distribution;
use crate::variation::VariantId;

/// Size of the bucket space. Percentages map onto it as `percent * 10`.
pub const TOTAL_BUCKET_NUM: u32 = 1000;

const PERCENT_MULTIPLIER: u32 = TOTAL_BUCKET_NUM / 100;

/// Maps `(entity_id, segment_id)` onto `[0, TOTAL_BUCKET_NUM)`.
pub fn bucket(entity_id: &str, segment_id: i64) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(segment_id.to_string().as_bytes());
    hasher.update(entity_id.as_bytes());
    hasher.finalize() % TOTAL_BUCKET_NUM
}

/// Reports whether the entity falls inside the segment's rollout percentage.
///
/// A rollout of 0 never passes and a rollout of 100 (or more) always passes. An empty entity id
/// is never rolled out.
pub fn is_rolled_out(entity_id: &str, segment_id: i64, rollout_percent: u32) -> bool {
    if entity_id.is_empty() {
        return false;
    }
    let threshold = rollout_percent.min(100) * PERCENT_MULTIPLIER;
    bucket(entity_id, segment_id) < threshold
}

/// Picks the distribution whose cumulative range contains the entity's bucket.
///
/// Distributions partition the bucket space in list order. Buckets past the last boundary, which
/// happens when weights sum to less than 100, select nothing.
pub fn select_distribution<'a>(
    entity_id: &str,
    segment_id: i64,
    distributions: &'a [Distribution],
) -> Option<&'a Distribution> {
    if distributions.is_empty() {
        return None;
    }
    let bucket = bucket(entity_id, segment_id);
    distribution_for_bucket(bucket, distributions)
}

pub(crate) fn distribution_for_bucket(
    bucket: u32,
    distributions: &[Distribution],
) -> Option<&Distribution> {
    let mut upper = 0_u32;
    for distribution in distributions {
        upper += distribution.percent.min(100) * PERCENT_MULTIPLIER;
        if bucket < upper {
            return Some(distribution);
        }
    }
    None
}

/// Convenience for callers that only need the variant id.
pub fn select_variant_id(
    entity_id: &str,
    segment_id: i64,
    distributions: &[Distribution],
) -> Option<VariantId> {
    select_distribution(entity_id, segment_id, distributions).map(|d| d.variant_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use spectral::prelude::*;
    use test_case::test_case;

    fn dist(id: i64, variant_id: i64, percent: u32) -> Distribution {
        Distribution {
            id,
            segment_id: 1,
            variant_id,
            variant_key: None,
            percent,
        }
    }

    fn entity_ids() -> impl Iterator<Item = String> {
        (0..2000).map(|i| format!("entity-{}", i))
    }

    #[test]
    fn crc32_is_ieee() {
        assert_that!(crc32fast::hash(b"123456789")).is_equal_to(0xCBF4_3926);
    }

    #[test_case("user-42", 20, 914)]
    #[test_case("jane", 1001, 405)]
    #[test_case("jane", 11, 931)]
    fn known_buckets(entity_id: &str, segment_id: i64, expected: u32) {
        assert_that!(bucket(entity_id, segment_id)).is_equal_to(expected);
    }

    #[test]
    fn bucket_is_stable() {
        let first = bucket("userKeyA", 42);
        for _ in 0..10 {
            assert_that!(bucket("userKeyA", 42)).is_equal_to(first);
        }
        assert_that!(first).is_less_than(TOTAL_BUCKET_NUM);
    }

    #[test]
    fn bucket_depends_on_segment() {
        let moved = entity_ids().filter(|id| bucket(id, 1) != bucket(id, 2)).count();
        // 1 in 1000 collisions expected
        assert_that!(moved).is_greater_than(1900);
    }

    #[test]
    fn buckets_are_roughly_uniform() {
        let mut halves = [0_usize; 2];
        for id in entity_ids() {
            halves[(bucket(&id, 7) / 500) as usize] += 1;
        }
        assert_that!(halves[0]).is_greater_than(850);
        assert_that!(halves[1]).is_greater_than(850);
    }

    #[test]
    fn empty_entity_is_never_rolled_out() {
        assert_that!(is_rolled_out("", 3, 100)).is_false();
        assert_that!(is_rolled_out("", 3, 50)).is_false();
    }

    #[test]
    fn half_rollout_lands_in_first_half_distribution() {
        // rollout and distribution read the same bucket
        let distributions = vec![dist(1, 10, 50), dist(2, 20, 50)];
        for id in entity_ids().filter(|id| is_rolled_out(id, 9, 50)) {
            assert_that!(select_variant_id(&id, 9, &distributions)).contains_value(10);
        }
    }

    #[test]
    fn zero_rollout_never_passes() {
        assert_that!(entity_ids().filter(|id| is_rolled_out(id, 3, 0)).count()).is_equal_to(0);
    }

    #[test]
    fn full_rollout_always_passes() {
        assert_that!(entity_ids().all(|id| is_rolled_out(&id, 3, 100))).is_true();
        assert_that!(entity_ids().all(|id| is_rolled_out(&id, 3, 150))).is_true();
    }

    #[test]
    fn partial_rollout_is_proportional() {
        let passed = entity_ids().filter(|id| is_rolled_out(id, 3, 30)).count();
        assert_that!(passed).is_greater_than(480);
        assert_that!(passed).is_less_than(720);
    }

    #[test_case(0, Some(10))]
    #[test_case(299, Some(10))]
    #[test_case(300, Some(20))]
    #[test_case(799, Some(20))]
    #[test_case(800, None ; "gap past the last boundary")]
    #[test_case(999, None)]
    fn distribution_ranges(bucket: u32, expected_variant: Option<i64>) {
        let distributions = vec![dist(1, 10, 30), dist(2, 20, 50)];
        assert_that!(distribution_for_bucket(bucket, &distributions).map(|d| d.variant_id))
            .is_equal_to(expected_variant);
    }

    #[test]
    fn zero_weight_distribution_never_wins() {
        let distributions = vec![dist(1, 10, 0), dist(2, 20, 100)];
        assert_that!(distribution_for_bucket(0, &distributions).map(|d| d.variant_id))
            .contains_value(20);
    }

    #[test]
    fn no_distributions_selects_nothing() {
        assert_that!(select_distribution("a", 1, &[])).is_none();
    }

    #[test]
    fn full_distribution_always_selects() {
        let distributions = vec![dist(1, 10, 50), dist(2, 20, 50)];
        assert_that!(entity_ids().all(|id| select_variant_id(&id, 5, &distributions).is_some()))
            .is_true();
    }

    proptest! {
        #[test]
        fn rollout_is_monotonic(entity_id in ".{0,20}", segment_id in any::<i64>(), percent in 0u32..100) {
            // an entity inside a rollout stays inside when the rollout grows
            if is_rolled_out(&entity_id, segment_id, percent) {
                prop_assert!(is_rolled_out(&entity_id, segment_id, percent + 1));
            }
        }

        #[test]
        fn bucket_in_range(entity_id in ".{0,40}", segment_id in any::<i64>()) {
            prop_assert!(bucket(&entity_id, segment_id) < TOTAL_BUCKET_NUM);
        }
    }
}
