//! Property tests for judgment parsing.

use hackgrade_core::{parse_response, CriterionScores};
use proptest::prelude::*;

fn half_step() -> impl Strategy<Value = f64> {
    (0u8..=10).prop_map(|n| f64::from(n) / 2.0)
}

fn scores() -> impl Strategy<Value = CriterionScores> {
    (half_step(), half_step(), half_step(), "[a-zA-Z0-9 ,.{}]{0,40}")
        .prop_map(|(c, z, r, comment)| CriterionScores::new(c, z, r, comment))
}

proptest! {
    #[test]
    fn serialized_scores_parse_back(expected in scores()) {
        let raw = serde_json::to_string(&expected).unwrap();
        prop_assert_eq!(parse_response(&raw).unwrap(), expected);
    }

    #[test]
    fn wrapped_scores_parse_back(expected in scores(), prose in "[a-zA-Z :]{0,30}") {
        let json = serde_json::to_string(&expected).unwrap();
        let fenced = format!("```json\n{json}\n```");
        let chatty = format!("{prose}\n{json}\nHope this helps");
        prop_assert_eq!(parse_response(&fenced).unwrap(), expected.clone());
        prop_assert_eq!(parse_response(&chatty).unwrap(), expected);
    }

    #[test]
    fn parsed_values_stay_in_range(c in -100.0f64..100.0, r in -100.0f64..100.0) {
        let raw = format!(r#"{{"completeness": {c}, "conciseness": 2, "correctness": {r}}}"#);
        let s = parse_response(&raw).unwrap();
        for v in s.triple() {
            prop_assert!((0.0..=5.0).contains(&v));
        }
    }
}
