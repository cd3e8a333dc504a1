//! Property tests for the quorum rule.

use gmh_governance::required_yes_votes;
use proptest::prelude::*;

proptest! {
    #[test]
    fn required_is_smallest_count_reaching_threshold(pct in 1u32..=100, voters in 1usize..500) {
        let required = required_yes_votes(pct, voters);
        prop_assert!(required >= 1);
        prop_assert!(required * 100 >= pct as usize * voters);
        if required > 1 {
            prop_assert!((required - 1) * 100 < pct as usize * voters);
        }
    }

    #[test]
    fn required_never_decreases_with_more_voters(pct in 1u32..=100, voters in 0usize..500) {
        prop_assert!(required_yes_votes(pct, voters) <= required_yes_votes(pct, voters + 1));
    }
}
