//! Structured field recovery from reviewer output. Reviewers are prompted
//! to lead with `Quality Score: N/10` and `Recommendation: ...` lines, but
//! models drift, so both extractors are optional and match anywhere in the
//! text.

use regex::Regex;
use std::sync::LazyLock;

use super::types::Recommendation;

static SCORE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Quality Score:\s*(\d+)/10").unwrap());
static RECOMMENDATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Recommendation:\s*(APPROVE|REVISE|REJECT)").unwrap());

/// First `Quality Score: N/10` match, if any.
pub fn extract_score(text: &str) -> Option<i32> {
    SCORE_RE
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
}

/// First `Recommendation: APPROVE|REVISE|REJECT` match, if any. The verdict
/// words are case-sensitive on purpose: prose like "my recommendation:
/// approve of the tone" must not register as a verdict.
pub fn extract_recommendation(text: &str) -> Option<Recommendation> {
    let caps = RECOMMENDATION_RE.captures(text)?;
    match &caps[1] {
        "APPROVE" => Some(Recommendation::Approve),
        "REVISE" => Some(Recommendation::Revise),
        "REJECT" => Some(Recommendation::Reject),
        _ => None,
    }
}
