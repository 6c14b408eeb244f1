//! Turn outcomes: what a specialist's response amounts to.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Prefix a specialist replies with to decline a turn.
pub const PASS_SENTINEL: &str = "[PASS";

/// Cleaned responses shorter than this carry nothing worth logging.
pub const MIN_CONTRIBUTION_CHARS: usize = 10;

static TOOL_CALL_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<\|[^|]*\|>[^<]*").expect("TOOL_CALL_BLOCK regex should compile")
});

static TOOL_CALL_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<\|[^|]*\|>").expect("TOOL_CALL_TAG regex should compile"));

static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("BLANK_LINES regex should compile"));

/// Result of one specialist call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnOutcome {
    /// Text to append to the log.
    Contribution(String),
    /// The specialist declined this round.
    Pass,
}

impl TurnOutcome {
    /// Interpret raw model output.
    ///
    /// A response starting with the PASS sentinel (any case) is a pass. So is
    /// a response that has nothing meaningful left once stray tool-call markup
    /// like `<|channel|>...` has been stripped.
    pub fn from_response(raw: &str) -> Self {
        if is_pass_sentinel(raw) {
            return TurnOutcome::Pass;
        }
        let cleaned = clean_response(raw);
        if cleaned.chars().count() < MIN_CONTRIBUTION_CHARS || is_pass_sentinel(&cleaned) {
            TurnOutcome::Pass
        } else {
            TurnOutcome::Contribution(cleaned)
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, TurnOutcome::Pass)
    }
}

fn is_pass_sentinel(text: &str) -> bool {
    text.trim().to_uppercase().starts_with(PASS_SENTINEL)
}

/// Strip tool-call markup and collapse runs of blank lines.
pub fn clean_response(raw: &str) -> String {
    let without_blocks = TOOL_CALL_BLOCK.replace_all(raw, "");
    let without_tags = TOOL_CALL_TAG.replace_all(&without_blocks, "");
    BLANK_LINES
        .replace_all(&without_tags, "\n\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_sentinel_any_case() {
        assert!(TurnOutcome::from_response("[PASS]").is_pass());
        assert!(TurnOutcome::from_response("  [pass] nothing to add").is_pass());
        assert!(TurnOutcome::from_response("[Pass - covered already]").is_pass());
    }

    #[test]
    fn regular_text_is_a_contribution() {
        let outcome = TurnOutcome::from_response("Consider caching the lookups first.");
        assert_eq!(
            outcome,
            TurnOutcome::Contribution("Consider caching the lookups first.".into())
        );
    }

    #[test]
    fn short_responses_are_passes() {
        assert!(TurnOutcome::from_response("ok").is_pass());
        assert!(TurnOutcome::from_response("   ").is_pass());
    }

    #[test]
    fn tool_markup_is_stripped() {
        let raw = "The rollout needs a canary stage.\n<|channel|>commentary<|message|>{\"q\":1}";
        assert_eq!(
            TurnOutcome::from_response(raw),
            TurnOutcome::Contribution("The rollout needs a canary stage.".into())
        );
    }

    #[test]
    fn markup_only_response_is_a_pass() {
        assert!(TurnOutcome::from_response("<|start|>assistant<|end|>").is_pass());
    }

    #[test]
    fn blank_line_runs_collapse() {
        assert_eq!(clean_response("a\n\n\n\n  \nb"), "a\n\nb");
    }

    #[test]
    fn sentinel_mid_text_is_not_a_pass() {
        assert!(!TurnOutcome::from_response("I would not [PASS] on this one, the risk is real.").is_pass());
    }
}
