//! Property-based check of the word round-trip law from the spec:
//! `to_int(to_word(v)) == v` for every `v` in `[-9_999_999, 9_999_999]`.

use proptest::prelude::*;
use vm_core::NullLogger;
use vm_word::{to_int, to_word, MAX_MAGNITUDE};

proptest! {
    #[test]
    fn word_round_trip(v in -MAX_MAGNITUDE..=MAX_MAGNITUDE) {
        let logger = NullLogger;
        prop_assert_eq!(to_int(&to_word(v, &logger), &logger), v);
    }
}
