//! Console output formatter for council tasks

use chrono::{DateTime, Utc};
use colored::Colorize;
use council_domain::{
    ConfigIssue, Contribution, DiscussionStatistics, ProviderKind, RateLimitKey, Severity, Task,
    TaskStatus, TokenBucket,
};

/// Formats tasks and operational state for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Format the complete task: question, discussion, synthesis, statistics
    pub fn format(task: &Task) -> String {
        let mut output = String::new();

        output.push_str(&Self::header("Council Discussion"));
        output.push('\n');
        output.push_str(&Self::question(task));

        output.push_str(&Self::section_header("Discussion"));
        if task.result.contributions.is_empty() {
            output.push_str(&format!("\n{}\n", "(no contributions)".dimmed()));
        }
        for contribution in &task.result.contributions {
            output.push_str(&Self::contribution(contribution));
        }

        match task.status {
            TaskStatus::Completed => {
                output.push_str(&Self::section_header("Final Synthesis"));
                output.push('\n');
                output.push_str(task.result.final_synthesis.as_deref().unwrap_or_default());
                output.push('\n');
            }
            TaskStatus::Failed => {
                output.push_str(&format!(
                    "\n{} {}\n",
                    "Failed:".red().bold(),
                    task.result.failure_reason.as_deref().unwrap_or("unknown reason")
                ));
            }
            TaskStatus::Pending | TaskStatus::InProgress => {
                output.push_str(&format!("\n{} {}\n", "Status:".cyan().bold(), task.status));
            }
        }

        if let Some(statistics) = &task.result.statistics {
            output.push_str(&Self::section_header("Statistics"));
            output.push_str(&Self::statistics(statistics));
        }

        output.push_str(&Self::footer());
        output
    }

    /// Format synthesis only (concise output)
    pub fn format_synthesis_only(task: &Task) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "{}\n\n",
            "=== Council Conclusion ===".cyan().bold()
        ));
        output.push_str(&format!("{} {}\n\n", "Q:".bold(), task.query.content()));

        let participants: Vec<String> = task
            .result
            .statistics
            .as_ref()
            .map(|s| s.participants().map(|id| id.to_string()).collect())
            .unwrap_or_default();
        if !participants.is_empty() {
            output.push_str(&format!(
                "{} {}\n\n",
                "Specialists heard:".dimmed(),
                participants.join(", ")
            ));
        }

        match (&task.result.final_synthesis, &task.result.failure_reason) {
            (Some(synthesis), _) => output.push_str(synthesis),
            (None, Some(reason)) => {
                output.push_str(&format!("{} {}", "Failed:".red().bold(), reason))
            }
            (None, None) => output.push_str(&format!("{} {}", "Status:".cyan(), task.status)),
        }
        output.push('\n');
        output
    }

    /// Format as JSON
    pub fn format_json(task: &Task) -> String {
        serde_json::to_string_pretty(task).unwrap_or_else(|_| "{}".to_string())
    }

    /// Progress view for `status`: contributions after `since`, then state.
    pub fn format_progress(task: &Task, since: u64) -> String {
        let mut output = String::new();
        for contribution in task.contributions_since(since) {
            output.push_str(&Self::contribution(contribution));
        }
        if let Some(summary) = &task.result.rolling_summary {
            output.push_str(&format!(
                "\n{} {}\n",
                format!("Running summary (v{}):", summary.source_log_version).dimmed(),
                summary.text
            ));
        }
        let statuses: Vec<String> = task
            .result
            .specialist_status
            .iter()
            .map(|(id, status)| format!("{}={}", id, status))
            .collect();
        output.push_str(&format!(
            "\n{} {} | {} {} | {} {}\n",
            "task".dimmed(),
            task.id,
            "status".dimmed(),
            Self::status_label(task.status),
            "version".dimmed(),
            task.log_version()
        ));
        if !statuses.is_empty() {
            output.push_str(&format!("{}\n", statuses.join("  ").dimmed()));
        }
        output
    }

    /// One line per task, oldest first.
    pub fn format_task_list(tasks: &[Task]) -> String {
        if tasks.is_empty() {
            return format!("{}\n", "No tasks.".dimmed());
        }
        let mut output = String::new();
        for task in tasks {
            output.push_str(&format!(
                "{}  {:<11}  {:>3} contributions  {}\n",
                task.id,
                Self::status_label(task.status),
                task.log_version(),
                Self::truncate(task.query.content(), 60)
            ));
        }
        output
    }

    pub fn format_buckets(buckets: &[(RateLimitKey, TokenBucket)], now: DateTime<Utc>) -> String {
        if buckets.is_empty() {
            return format!("{}\n", "No rate-limit buckets recorded yet.".dimmed());
        }
        let mut output = String::new();
        output.push_str(&format!(
            "{}\n",
            format!("{:<48} {:>10} {:>9}  {}", "KEY", "AVAILABLE", "CAPACITY", "COOLDOWN").bold()
        ));
        for (key, bucket) in buckets {
            let cooldown = match bucket.reset_at() {
                Some(reset) if reset > now => {
                    format!("{}s", (reset - now).num_seconds()).yellow().to_string()
                }
                _ => "-".to_string(),
            };
            output.push_str(&format!(
                "{:<48} {:>10.2} {:>9}  {}\n",
                key.to_string(),
                bucket.available(now),
                bucket.capacity(),
                cooldown
            ));
        }
        output
    }

    pub fn format_health(results: &[(ProviderKind, bool)]) -> String {
        let mut output = String::new();
        for (provider, healthy) in results {
            let mark = if *healthy { "v".green() } else { "x".red() };
            let state = if *healthy { "reachable" } else { "unreachable" };
            output.push_str(&format!("  {} {:<12} {}\n", mark, provider, state));
        }
        output
    }

    /// Sources and validation results for `council config`.
    pub fn format_config_report(sources: &[String], issues: &[ConfigIssue]) -> String {
        let mut output = String::new();
        output.push_str(&format!("{}\n", "Configuration sources:".cyan().bold()));
        if sources.is_empty() {
            output.push_str("  (defaults only)\n");
        }
        for source in sources {
            output.push_str(&format!("{}\n", source));
        }

        output.push('\n');
        if issues.is_empty() {
            output.push_str(&format!("{}\n", "Configuration is valid.".green()));
        }
        for issue in issues {
            let label = match issue.severity {
                Severity::Error => "error:".red().bold(),
                Severity::Warning => "warning:".yellow().bold(),
            };
            output.push_str(&format!("{} {}\n", label, issue.message));
        }
        output
    }

    fn question(task: &Task) -> String {
        let mut output = format!("{} {}\n", "Question:".cyan().bold(), task.query.content());
        if let Some(context) = task.query.context() {
            output.push_str(&format!("{} {}\n", "Context:".cyan().bold(), context));
        }
        let assigned: Vec<String> = task.assigned.iter().map(|id| id.to_string()).collect();
        output.push_str(&format!(
            "{} {}\n",
            "Specialists:".cyan().bold(),
            assigned.join(", ")
        ));
        output
    }

    fn contribution(contribution: &Contribution) -> String {
        format!(
            "\n{}\n{}\n",
            format!(
                "── #{} {} (round {}) ──",
                contribution.sequence, contribution.specialist, contribution.round
            )
            .yellow()
            .bold(),
            contribution.text
        )
    }

    fn statistics(statistics: &DiscussionStatistics) -> String {
        let mut output = format!(
            "Ended: {} after {:.1}s, {} contributions, {} passes, peak {} thinking, {} summaries\n",
            statistics.termination,
            statistics.duration().num_milliseconds() as f64 / 1000.0,
            statistics.total_contributions,
            statistics.total_passes(),
            statistics.peak_concurrent_thinking,
            statistics.rolling_summaries
        );
        for (id, s) in &statistics.specialists {
            let latency = s
                .avg_response_ms
                .map(|ms| format!(", avg {}ms", ms))
                .unwrap_or_default();
            let removed = if s.removed {
                format!(" {}", "(removed)".red())
            } else {
                String::new()
            };
            output.push_str(&format!(
                "  {:<12} {} contributed, {} passed, {} errors{}{}\n",
                id.to_string(),
                s.contributions,
                s.passes,
                s.errors,
                latency,
                removed
            ));
        }
        output
    }

    fn status_label(status: TaskStatus) -> String {
        match status {
            TaskStatus::Pending => status.to_string().dimmed().to_string(),
            TaskStatus::InProgress => status.to_string().cyan().to_string(),
            TaskStatus::Completed => status.to_string().green().to_string(),
            TaskStatus::Failed => status.to_string().red().to_string(),
        }
    }

    fn truncate(text: &str, max: usize) -> String {
        if text.chars().count() <= max {
            return text.to_string();
        }
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_domain::{
        NewTask, Query, RollingSummary, SessionId, SpecialistId, SpecialistStatistics, TaskId,
        TerminationReason,
    };
    use std::collections::BTreeMap;

    fn id(name: &str) -> SpecialistId {
        SpecialistId::try_new(name).unwrap()
    }

    fn running_task() -> Task {
        let now = Utc::now();
        let mut task = NewTask::new(
            SessionId::new("s"),
            "tester",
            Query::try_new("Should we shard the orders table?").unwrap(),
            vec![id("Critical"), id("Quantifier")],
        )
        .unwrap()
        .into_task(TaskId::generate(), now);
        task.claim(now).unwrap();
        for (seq, who, text) in [
            (1, "Critical", "Sharding adds cross-shard joins."),
            (2, "Quantifier", "At 2k writes/s a single node copes."),
        ] {
            task.append_contribution(Contribution {
                sequence: seq,
                round: 1,
                specialist: id(who),
                text: text.to_string(),
                timestamp: now,
            })
            .unwrap();
        }
        task
    }

    fn statistics() -> DiscussionStatistics {
        let now = Utc::now();
        let mut specialists = BTreeMap::new();
        specialists.insert(
            id("Critical"),
            SpecialistStatistics {
                contributions: 1,
                passes: 2,
                avg_response_ms: Some(840),
                ..Default::default()
            },
        );
        specialists.insert(
            id("Quantifier"),
            SpecialistStatistics {
                contributions: 1,
                ..Default::default()
            },
        );
        DiscussionStatistics {
            started_at: now,
            finished_at: now,
            total_contributions: 2,
            specialists,
            peak_concurrent_thinking: 2,
            rolling_summaries: 0,
            termination: TerminationReason::AllPassed { round: 2 },
        }
    }

    #[test]
    fn full_output_lists_discussion_and_synthesis() {
        let mut task = running_task();
        task.complete("Do not shard yet.", Some(statistics()), Utc::now())
            .unwrap();

        let output = ConsoleFormatter::format(&task);
        assert!(output.contains("Should we shard the orders table?"));
        assert!(output.contains("#1 Critical (round 1)"));
        assert!(output.contains("At 2k writes/s a single node copes."));
        assert!(output.contains("Do not shard yet."));
        assert!(output.contains("all specialists passed in round 2"));
        assert!(output.contains("avg 840ms"));
    }

    #[test]
    fn synthesis_only_shows_failure_reason() {
        let mut task = running_task();
        task.fail("No contributions (discussion timed out)", None, Utc::now())
            .unwrap();
        let output = ConsoleFormatter::format_synthesis_only(&task);
        assert!(output.contains("No contributions (discussion timed out)"));
    }

    #[test]
    fn progress_shows_only_unseen_contributions() {
        let mut task = running_task();
        task.record_rolling_summary(RollingSummary::new("Leaning against sharding.", 2, Utc::now()))
            .unwrap();

        let output = ConsoleFormatter::format_progress(&task, 1);
        assert!(!output.contains("cross-shard joins"));
        assert!(output.contains("At 2k writes/s"));
        assert!(output.contains("Leaning against sharding."));
    }

    #[test]
    fn json_is_the_task_record() {
        let task = running_task();
        let value: serde_json::Value =
            serde_json::from_str(&ConsoleFormatter::format_json(&task)).unwrap();
        assert_eq!(value["status"], "in_progress");
        assert_eq!(value["result"]["contributions"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn buckets_show_cooldown() {
        let now = Utc::now();
        let mut bucket = TokenBucket::full(16, now);
        bucket.reject(now, std::time::Duration::from_secs(30));
        let output = ConsoleFormatter::format_buckets(
            &[(RateLimitKey::new("openrouter", "gpt-4o-mini"), bucket)],
            now,
        );
        assert!(output.contains("openrouter/gpt-4o-mini"));
        assert!(output.contains("30s"));
    }
}
