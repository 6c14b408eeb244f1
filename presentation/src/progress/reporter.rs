//! Live progress for a running discussion

use colored::Colorize;
use council_application::DiscussionObserver;
use council_domain::{
    Contribution, RollingSummary, SpecialistId, SpecialistStatus, TaskId, TerminationReason,
};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

/// One spinner per specialist; contributions print above the spinners.
pub struct ProgressReporter {
    multi: MultiProgress,
    bars: Mutex<BTreeMap<SpecialistId, ProgressBar>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(BTreeMap::new()),
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn with_bar(&self, specialist: &SpecialistId, f: impl FnOnce(&ProgressBar)) {
        if let Ok(bars) = self.bars.lock() {
            if let Some(bar) = bars.get(specialist) {
                f(bar);
            }
        }
    }

    fn status_message(status: SpecialistStatus) -> String {
        match status {
            SpecialistStatus::Idle => "listening".dimmed().to_string(),
            SpecialistStatus::Thinking => "thinking...".cyan().to_string(),
            SpecialistStatus::Contributing => "contributing".green().to_string(),
            SpecialistStatus::Removed => "removed after repeated errors".red().to_string(),
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscussionObserver for ProgressReporter {
    fn on_started(&self, _task: TaskId, specialists: &[SpecialistId]) {
        let Ok(mut bars) = self.bars.lock() else {
            return;
        };
        for id in specialists {
            let bar = self.multi.add(ProgressBar::new_spinner());
            bar.set_style(Self::spinner_style());
            bar.set_prefix(format!("{:<12}", id.to_string()));
            bar.set_message(Self::status_message(SpecialistStatus::Idle));
            bar.enable_steady_tick(Duration::from_millis(120));
            bars.insert(id.clone(), bar);
        }
    }

    fn on_status(&self, _task: TaskId, specialist: &SpecialistId, status: SpecialistStatus) {
        self.with_bar(specialist, |bar| {
            bar.set_message(Self::status_message(status));
            if status == SpecialistStatus::Removed {
                bar.finish();
            }
        });
    }

    fn on_pass(&self, _task: TaskId, specialist: &SpecialistId, round: u32) {
        self.with_bar(specialist, |bar| {
            bar.set_message(format!("passed round {}", round).dimmed().to_string());
        });
    }

    fn on_contribution(&self, _task: TaskId, contribution: &Contribution) {
        let _ = self.multi.println(format!(
            "{}\n{}\n",
            format!(
                "── #{} {} (round {}) ──",
                contribution.sequence, contribution.specialist, contribution.round
            )
            .yellow()
            .bold(),
            contribution.text
        ));
    }

    fn on_rolling_summary(&self, _task: TaskId, summary: &RollingSummary) {
        let _ = self.multi.println(format!(
            "{}",
            format!(
                "[running summary after {} contributions]",
                summary.source_log_version
            )
            .dimmed()
        ));
    }

    fn on_terminated(&self, _task: TaskId, reason: &TerminationReason) {
        if let Ok(mut bars) = self.bars.lock() {
            for (_, bar) in std::mem::take(&mut *bars) {
                bar.finish_and_clear();
            }
        }
        let _ = self
            .multi
            .println(format!("{} {}", "Discussion ended:".cyan().bold(), reason));
    }
}

/// Simple text-based progress (no fancy UI)
pub struct SimpleProgress;

impl DiscussionObserver for SimpleProgress {
    fn on_started(&self, _task: TaskId, specialists: &[SpecialistId]) {
        let names: Vec<String> = specialists.iter().map(|id| id.to_string()).collect();
        println!("{} {}", "->".cyan(), format!("Specialists: {}", names.join(", ")).bold());
    }

    fn on_contribution(&self, _task: TaskId, contribution: &Contribution) {
        println!(
            "  {} #{} {}: {}",
            "v".green(),
            contribution.sequence,
            contribution.specialist,
            contribution.text.lines().next().unwrap_or_default()
        );
    }

    fn on_status(&self, _task: TaskId, specialist: &SpecialistId, status: SpecialistStatus) {
        if status == SpecialistStatus::Removed {
            println!("  {} {} removed", "x".red(), specialist);
        }
    }

    fn on_terminated(&self, _task: TaskId, reason: &TerminationReason) {
        println!("{} {}", "->".cyan(), reason);
        println!();
    }
}
