//! Prompt templates for the discussion flow

use crate::core::query::Query;
use crate::discussion::{DiscussionSnapshot, RollingSummary};
use crate::discussion::outcome::PASS_SENTINEL;
use crate::specialist::profile::SpecialistProfile;

/// Templates for generating prompts at each stage
pub struct PromptTemplate;

impl PromptTemplate {
    /// System prompt for a specialist turn
    pub fn specialist_system(profile: &SpecialistProfile) -> String {
        let mut prompt = format!(
            "You are {}, one of several specialists in a collaborative discussion.\n",
            profile.id()
        );
        if !profile.persona().is_empty() {
            prompt.push_str(profile.persona());
            prompt.push('\n');
        }
        prompt.push_str(&format!(
            r#"
Rules:
- Add one focused point of 150 words or fewer.
- Build on or challenge what others said; do not restate it.
- Speak only from your own perspective.
- If you have nothing new to add, reply with exactly {}]"#,
            PASS_SENTINEL
        ));
        prompt
    }

    /// User prompt for a specialist turn
    pub fn specialist_turn(
        profile: &SpecialistProfile,
        query: &Query,
        snapshot: &DiscussionSnapshot,
        summary: Option<&RollingSummary>,
    ) -> String {
        let mut prompt = format!("Question under discussion:\n{}\n", query.content());

        if let Some(context) = query.context() {
            prompt.push_str(&format!("\nBackground:\n{}\n", context));
        }

        if snapshot.is_empty() {
            prompt.push_str("\nNobody has spoken yet. Open the discussion.\n");
        } else {
            if let Some(summary) = summary {
                prompt.push_str(&format!("\nSummary so far:\n{}\n", summary.text));
            }
            prompt.push_str(&format!("\nDiscussion:\n{}\n", snapshot.transcript()));
        }

        prompt.push_str(&format!(
            "\nWhat does {} add at this point?",
            profile.id()
        ));
        prompt
    }

    /// System prompt for rolling summaries
    pub fn rolling_summary_system() -> &'static str {
        r#"You keep running notes on a discussion between specialists.
Summarize where the discussion stands: the main positions, open disagreements and anything already agreed.
Be brief. Do not add opinions of your own."#
    }

    /// User prompt for a rolling summary
    pub fn rolling_summary(query: &Query, snapshot: &DiscussionSnapshot) -> String {
        format!(
            r#"Question: {}

Discussion so far ({} contributions):
{}

Write a short summary of the current state of the discussion."#,
            query.content(),
            snapshot.len(),
            snapshot.transcript()
        )
    }

    /// System prompt for the final synthesis
    pub fn synthesis_system() -> &'static str {
        r#"You are a moderator closing a discussion between specialists.
Your task is to:
1. Identify where the specialists agree
2. Weigh the disagreements and say which position is better supported
3. Give a clear final answer to the original question
4. Credit the specialists whose points shaped the answer

Be balanced and concrete."#
    }

    /// User prompt for the final synthesis
    ///
    /// Includes the last rolling summary so its insights carry into the answer.
    pub fn synthesis(
        query: &Query,
        snapshot: &DiscussionSnapshot,
        last_summary: Option<&RollingSummary>,
    ) -> String {
        let mut prompt = format!("Original question: {}\n", query.content());

        if let Some(context) = query.context() {
            prompt.push_str(&format!("\nBackground:\n{}\n", context));
        }

        if let Some(summary) = last_summary {
            prompt.push_str(&format!(
                "\nRunning summary (as of contribution {}):\n{}\n",
                summary.source_log_version, summary.text
            ));
        }

        prompt.push_str(&format!("\nFull discussion:\n{}\n", snapshot.transcript()));

        prompt.push_str(
            r#"
Based on the discussion above, provide:

1. **Answer**: the synthesized conclusion
2. **Key Points**: the most important points raised (bullet list)
3. **Disagreements**: unresolved tensions and your assessment (bullet list)

Format your response with clear markdown headers."#,
        );

        prompt
    }
}
