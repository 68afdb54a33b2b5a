use sha1::{Digest, Sha1};

/// Percentage at or above which every subject is included in a rollout.
pub const FULL_ROLLOUT: u8 = 100;

// 53 bits is the widest integer an f64 holds exactly, which keeps every bucket strictly below 1.0.
const BUCKET_BITS: u32 = 53;
const BUCKET_SCALE: f64 = (1u64 << BUCKET_BITS) as f64;

/// The decision a bucket is computed for. Each purpose hashes a different suffix so that rollout
/// inclusion and variant selection are independent for the same user and feature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BucketPurpose {
    Rollout,
    Variant,
}

impl BucketPurpose {
    fn suffix(self) -> &'static str {
        match self {
            BucketPurpose::Rollout => "rollout",
            BucketPurpose::Variant => "variant",
        }
    }
}

/// Maps `input` to a stable, uniformly distributed value in `[0, 1)`.
///
/// The value depends only on the bytes of `input`, so it is identical across calls, threads and
/// processes.
pub fn hash(input: &str) -> f64 {
    let mut hasher = Sha1::new();
    hasher.update(input.as_bytes());
    unit_interval(hasher)
}

/// Computes the bucket for `user_id:feature_key:<purpose>` without building the joined string.
pub(crate) fn bucket(user_id: &str, feature_key: &str, purpose: BucketPurpose) -> f64 {
    let mut hasher = Sha1::new();
    hasher.update(user_id.as_bytes());
    hasher.update(b":");
    hasher.update(feature_key.as_bytes());
    hasher.update(b":");
    hasher.update(purpose.suffix().as_bytes());
    unit_interval(hasher)
}

fn unit_interval(hasher: Sha1) -> f64 {
    let digest = hasher.finalize();
    let mut leading = [0u8; 8];
    leading.copy_from_slice(&digest[..8]);
    let numhash = u64::from_be_bytes(leading) >> (64 - BUCKET_BITS);
    numhash as f64 / BUCKET_SCALE
}

/// Returns true if `user_id` falls inside the first `rollout_percent` percent of the population
/// for `feature_key`.
///
/// A rollout of 0 excludes everyone and a rollout of 100 (or more) includes everyone. In between,
/// inclusion is monotonic: a user included at some percentage stays included at any higher one.
pub fn is_in_rollout(user_id: &str, feature_key: &str, rollout_percent: u8) -> bool {
    match rollout_percent {
        0 => false,
        p if p >= FULL_ROLLOUT => true,
        p => bucket(user_id, feature_key, BucketPurpose::Rollout) * 100.0 <= f64::from(p),
    }
}

/// Picks the variant `user_id` is bucketed into for `feature_key`.
///
/// Returns `None` when `variants` is empty or when the user is outside the rollout. Selection uses
/// a hash independent of the rollout decision, so variant shares are uniform among included users.
pub fn assign_variant<'a, S: AsRef<str>>(
    user_id: &str,
    feature_key: &str,
    variants: &'a [S],
    rollout_percent: u8,
) -> Option<&'a str> {
    if variants.is_empty() || !is_in_rollout(user_id, feature_key, rollout_percent) {
        return None;
    }

    let bucket = bucket(user_id, feature_key, BucketPurpose::Variant);
    let index = ((bucket * variants.len() as f64) as usize).min(variants.len() - 1);
    variants.get(index).map(AsRef::as_ref)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use spectral::prelude::*;
    use std::collections::HashMap;
    use test_case::test_case;

    const VARIANTS: [&str; 3] = ["control", "a", "b"];

    fn population() -> impl Iterator<Item = String> {
        (0..1000).map(|i| format!("user-{}", i))
    }

    #[test]
    fn hash_of_empty_string_is_in_range() {
        let value = hash("");
        assert_that!(value).is_greater_than_or_equal_to(0.0);
        assert_that!(value).is_less_than(1.0);
    }

    #[test]
    fn bucket_matches_hash_of_joined_key() {
        asserting!("rollout bucket hashes user:feature:rollout")
            .that(&bucket("u1", "promo", BucketPurpose::Rollout))
            .is_equal_to(hash("u1:promo:rollout"));
        asserting!("variant bucket hashes user:feature:variant")
            .that(&bucket("u1", "promo", BucketPurpose::Variant))
            .is_equal_to(hash("u1:promo:variant"));
    }

    #[test]
    fn rollout_and_variant_buckets_differ() {
        assert_ne!(
            bucket("alice", "checkout", BucketPurpose::Rollout),
            bucket("alice", "checkout", BucketPurpose::Variant)
        );
    }

    #[test]
    fn small_input_changes_move_the_hash() {
        let a = hash("user-1:promo:rollout");
        let b = hash("user-2:promo:rollout");
        assert_that!((a - b).abs()).is_greater_than(0.001);
    }

    // alice (19.52), carol (17.37) fall inside a 25% rollout of "promo"; bob (85.19),
    // dave (61.28) and u1 (56.50) do not.
    #[test_case("alice", true)]
    #[test_case("carol", true)]
    #[test_case("bob", false)]
    #[test_case("dave", false)]
    #[test_case("u1", false)]
    fn known_users_in_quarter_rollout(user_id: &str, expected: bool) {
        assert_eq!(is_in_rollout(user_id, "promo", 25), expected);
    }

    #[test_case(0, false; "nobody at zero")]
    #[test_case(100, true; "everybody at one hundred")]
    #[test_case(150, true; "everybody above one hundred")]
    fn rollout_boundaries(rollout: u8, expected: bool) {
        for user_id in population() {
            assert_eq!(is_in_rollout(&user_id, "checkout-redesign", rollout), expected);
        }
    }

    #[test]
    fn empty_variants_never_assigned() {
        let empty: [&str; 0] = [];
        assert_that!(assign_variant("alice", "checkout", &empty, 100)).is_none();
        assert_that!(assign_variant("alice", "checkout", &empty, 0)).is_none();
    }

    #[test]
    fn zero_rollout_assigns_no_variant() {
        for user_id in population() {
            assert_that!(assign_variant(&user_id, "checkout-redesign", &VARIANTS, 0)).is_none();
        }
    }

    #[test]
    fn variant_is_one_of_the_configured_variants() {
        let variants = vec!["red".to_string(), "blue".to_string()];
        let assigned = assign_variant("alice", "button-color", &variants, 100);
        assert!(matches!(assigned, Some("red") | Some("blue")));
    }

    #[test]
    fn variant_shares_are_uniform() {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for user_id in population() {
            let variant = assign_variant(&user_id, "checkout-redesign", &VARIANTS, 100)
                .expect("full rollout always assigns a variant");
            *counts.entry(variant).or_default() += 1;
        }

        assert_eq!(counts.len(), 3);
        for (variant, count) in &counts {
            assert!(
                (300..=367).contains(count),
                "variant {} was assigned {} times",
                variant,
                count
            );
        }
    }

    #[test]
    fn half_rollout_includes_about_half() {
        let included = population()
            .filter(|user_id| assign_variant(user_id, "checkout-redesign", &VARIANTS, 50).is_some())
            .count();
        assert_that!(included).is_greater_than_or_equal_to(450);
        assert_that!(included).is_less_than_or_equal_to(550);
    }

    #[test]
    fn thirty_percent_rollout_includes_about_thirty_percent() {
        let included = population()
            .filter(|user_id| is_in_rollout(user_id, "checkout-redesign", 30))
            .count();
        assert_that!(included).is_greater_than_or_equal_to(250);
        assert_that!(included).is_less_than_or_equal_to(350);
    }

    proptest! {
        #[test]
        fn hash_is_in_unit_interval(input in ".*") {
            let value = hash(&input);
            prop_assert!((0.0..1.0).contains(&value));
        }
    }

    proptest! {
        #[test]
        fn decisions_are_deterministic(
            user_id in "[a-zA-Z0-9-]{1,24}",
            feature_key in "[a-z-]{1,16}",
            rollout in 0u8..=100,
        ) {
            prop_assert_eq!(
                is_in_rollout(&user_id, &feature_key, rollout),
                is_in_rollout(&user_id, &feature_key, rollout)
            );
            prop_assert_eq!(
                assign_variant(&user_id, &feature_key, &VARIANTS, rollout),
                assign_variant(&user_id, &feature_key, &VARIANTS, rollout)
            );
        }
    }

    proptest! {
        #[test]
        fn rollout_is_monotonic(
            user_id in "[a-zA-Z0-9-]{1,24}",
            feature_key in "[a-z-]{1,16}",
            low in 0u8..=100,
            high in 0u8..=100,
        ) {
            let (low, high) = if low <= high { (low, high) } else { (high, low) };
            if is_in_rollout(&user_id, &feature_key, low) {
                prop_assert!(is_in_rollout(&user_id, &feature_key, high));
            }
        }
    }
}
