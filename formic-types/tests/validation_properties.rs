//! Property-based tests for validation result combination.
//!
//! Combining results must be:
//! - Associative overall: (A + B) + C == A + (B + C)
//! - Commutative on `expected` (AND), order-preserving on rejected rules

use formic_types::{RuleId, ValidationResult};
use proptest::prelude::*;

fn result_strategy() -> impl Strategy<Value = ValidationResult> {
    prop::collection::vec("[a-z]{1,12}", 0..4).prop_map(|ids| {
        if ids.is_empty() {
            ValidationResult::valid()
        } else {
            ValidationResult::invalid(ids.iter().map(|s| RuleId::new(s.clone())))
        }
    })
}

proptest! {
    #[test]
    fn combine_is_associative(
        a in result_strategy(),
        b in result_strategy(),
        c in result_strategy(),
    ) {
        let left = a.clone().combine(b.clone()).combine(c.clone());
        let right = a.combine(b.combine(c));
        prop_assert_eq!(left, right);
    }

    #[test]
    fn expected_is_commutative(a in result_strategy(), b in result_strategy()) {
        let ab = a.clone().combine(b.clone());
        let ba = b.combine(a);
        prop_assert_eq!(ab.expected, ba.expected);
    }

    #[test]
    fn rejected_rules_concatenate_in_order(
        a in result_strategy(),
        b in result_strategy(),
    ) {
        let mut expected_rules = a.rejected_rules.clone();
        expected_rules.extend(b.rejected_rules.clone());
        let combined = a.combine(b);
        prop_assert_eq!(combined.rejected_rules, expected_rules);
    }
}
