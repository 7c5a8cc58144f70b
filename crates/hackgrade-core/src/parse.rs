//! Recovery of a flat judgment object from free-form model output.
//!
//! Models wrap JSON in prose or code fences despite being told not to. Extraction
//! walks [`STRATEGIES`] in order; each candidate must decode on its own as a JSON
//! object, otherwise the next strategy is tried.

use serde_json::{Map, Value};

use crate::error::{GradeError, GradeResult};
use crate::model::CriterionScores;

const FENCE: &str = "```";

/// One way of carving a candidate substring out of the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// The whole trimmed text.
    Whole,
    /// Text opening with a code fence: first `{` after the fence to the last `}`.
    Fenced,
    /// Unfenced text: first `{` to the last `}`.
    OuterBraces,
    /// Span between the first and last brace characters of either kind.
    BracePositions,
}

pub const STRATEGIES: [ExtractionStrategy; 4] = [
    ExtractionStrategy::Whole,
    ExtractionStrategy::Fenced,
    ExtractionStrategy::OuterBraces,
    ExtractionStrategy::BracePositions,
];

impl ExtractionStrategy {
    /// Candidate substring for this strategy, if the strategy applies.
    pub fn candidate<'a>(&self, text: &'a str) -> Option<&'a str> {
        match self {
            Self::Whole => Some(text),
            Self::Fenced => {
                if !text.starts_with(FENCE) {
                    return None;
                }
                let start = text[FENCE.len()..].find('{')? + FENCE.len();
                brace_span(text, start)
            }
            Self::OuterBraces => {
                if text.starts_with(FENCE) {
                    return None;
                }
                brace_span(text, text.find('{')?)
            }
            Self::BracePositions => {
                let first = text.find(['{', '}'])?;
                let last = text.rfind(['{', '}'])?;
                (last > first).then(|| &text[first..=last])
            }
        }
    }

    fn decode(&self, text: &str) -> Option<Map<String, Value>> {
        let candidate = self.candidate(text)?;
        match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(obj)) => Some(obj),
            _ => None,
        }
    }
}

fn brace_span(text: &str, start: usize) -> Option<&str> {
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Extract the raw judgment object without interpreting its fields.
pub fn extract_judgment(raw: &str) -> GradeResult<Map<String, Value>> {
    let text = raw.trim();
    STRATEGIES
        .iter()
        .find_map(|strategy| strategy.decode(text))
        .ok_or_else(|| GradeError::parse(raw))
}

/// Parse a model response into clamped criterion scores.
///
/// Missing keys count as 0 and out-of-range values are clamped.
pub fn parse_response(raw: &str) -> GradeResult<CriterionScores> {
    let obj = extract_judgment(raw)?;
    Ok(CriterionScores::from_judgment(&obj))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_json() {
        let s = parse_response(
            r#"{"completeness": 4, "conciseness": 3.5, "correctness": 5, "comment": "solid"}"#,
        )
        .unwrap();
        assert_eq!(s.triple(), [4.0, 3.5, 5.0]);
        assert_eq!(s.comment, "solid");
    }

    #[test]
    fn test_prose_then_fence() {
        let raw = "Sure! Here's the JSON:\n```json\n{\"completeness\":3,\"conciseness\":4,\"correctness\":2,\"comment\":\"ok\"}\n```";
        let s = parse_response(raw).unwrap();
        assert_eq!(s.triple(), [3.0, 4.0, 2.0]);
        assert_eq!(s.comment, "ok");
    }

    #[test]
    fn test_leading_fence() {
        let raw = "```json\n{\"completeness\":1,\"conciseness\":1,\"correctness\":1,\"comment\":\"meh\"}\n```";
        assert_eq!(
            ExtractionStrategy::Fenced.candidate(raw.trim()),
            Some("{\"completeness\":1,\"conciseness\":1,\"correctness\":1,\"comment\":\"meh\"}")
        );
        assert_eq!(ExtractionStrategy::OuterBraces.candidate(raw.trim()), None);
        assert_eq!(parse_response(raw).unwrap().triple(), [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_braces_inside_comment_survive() {
        let raw = r#"Result: {"completeness": 2, "conciseness": 2, "correctness": 2, "comment": "uses {x} syntax"} thanks"#;
        let s = parse_response(raw).unwrap();
        assert_eq!(s.comment, "uses {x} syntax");
    }

    #[test]
    fn test_non_object_json_rejected() {
        assert!(matches!(
            parse_response("[1, 2, 3]"),
            Err(GradeError::Parse { .. })
        ));
        assert!(matches!(parse_response("5"), Err(GradeError::Parse { .. })));
    }

    #[test]
    fn test_garbage_fails() {
        for raw in ["", "no json here", "{ broken", "} backwards {", "{\"a\": }"] {
            assert!(
                matches!(parse_response(raw), Err(GradeError::Parse { .. })),
                "expected parse failure for {raw:?}"
            );
        }
    }

    #[test]
    fn test_brace_positions_only_applies_with_two_braces() {
        assert_eq!(ExtractionStrategy::BracePositions.candidate("{"), None);
        assert_eq!(ExtractionStrategy::BracePositions.candidate("a{b}c"), Some("{b}"));
    }
}
