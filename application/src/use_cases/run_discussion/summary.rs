//! Periodic rolling summaries of a running discussion.

use super::log::LogReader;
use crate::ports::capability::Capability;
use crate::ports::clock::Clock;
use crate::ports::conversation_logger::{ConversationEvent, ConversationLogger};
use crate::ports::discussion_observer::DiscussionObserver;
use crate::ports::task_store::TaskStore;
use council_domain::{
    CapabilityEndpoint, GenerationRequest, PromptTemplate, Query, RollingSummary, TaskId,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What the scheduler leaves behind when it stops.
#[derive(Debug, Default)]
pub struct SummaryReport {
    pub latest: Option<RollingSummary>,
    pub generated: u32,
}

/// Summarizes the log on a fixed interval, at most once per log version.
pub struct SummaryScheduler<C: Capability + 'static> {
    pub(crate) task_id: TaskId,
    pub(crate) query: Query,
    pub(crate) endpoint: CapabilityEndpoint,
    pub(crate) interval: Duration,
    pub(crate) capability: Arc<C>,
    pub(crate) log: LogReader,
    pub(crate) publish: watch::Sender<Option<RollingSummary>>,
    pub(crate) store: Arc<dyn TaskStore>,
    pub(crate) observer: Arc<dyn DiscussionObserver>,
    pub(crate) logger: Arc<dyn ConversationLogger>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl<C: Capability + 'static> SummaryScheduler<C> {
    pub async fn run(self, cancel: CancellationToken) -> SummaryReport {
        let mut report = SummaryReport::default();
        let mut last_attempted: Option<u64> = None;
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let snapshot = self.log.snapshot();
            let version = snapshot.version();
            if snapshot.is_empty() || last_attempted == Some(version) {
                continue;
            }
            // Marked before the call so a failed attempt is not retried for this version.
            last_attempted = Some(version);

            let request = GenerationRequest::new(
                self.endpoint.clone(),
                PromptTemplate::rolling_summary(&self.query, &snapshot),
            )
            .with_system_prompt(PromptTemplate::rolling_summary_system());

            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.capability.generate(&request) => result,
            };

            match result {
                Ok(text) => {
                    let summary = RollingSummary::new(text.trim(), version, self.clock.now());
                    info!(
                        "Task {}: rolling summary #{} covers {} contributions",
                        self.task_id,
                        report.generated + 1,
                        version
                    );
                    if let Err(e) = self.store.record_rolling_summary(self.task_id, &summary).await {
                        warn!("Task {}: failed to store rolling summary: {}", self.task_id, e);
                    }
                    self.observer.on_rolling_summary(self.task_id, &summary);
                    self.logger
                        .log(ConversationEvent::rolling_summary(self.task_id, &summary));
                    self.publish.send_replace(Some(summary.clone()));
                    report.generated += 1;
                    report.latest = Some(summary);
                }
                Err(e) => {
                    warn!(
                        "Task {}: rolling summary for version {} failed: {}",
                        self.task_id, version, e
                    );
                }
            }
        }

        debug!("Task {}: summary scheduler stopped", self.task_id);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::super::log::DiscussionLog;
    use super::*;
    use crate::ports::capability::CapabilityError;
    use crate::ports::clock::SystemClock;
    use crate::ports::conversation_logger::NoConversationLogger;
    use crate::ports::discussion_observer::NoProgress;
    use crate::ports::task_store::InMemoryTaskStore;
    use async_trait::async_trait;
    use chrono::Utc;
    use council_domain::{NewTask, SessionId, SpecialistId};
    use std::sync::Mutex;

    /// Records the log size each summary prompt was built from.
    struct CountingSummarizer {
        prompts: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Capability for CountingSummarizer {
        async fn generate(&self, request: &GenerationRequest) -> Result<String, CapabilityError> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            if self.fail {
                return Err(CapabilityError::Persistent("no summaries today".into()));
            }
            Ok(format!("summary #{}", self.prompts.lock().unwrap().len()))
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    async fn scheduler(
        capability: Arc<CountingSummarizer>,
        log: &DiscussionLog,
    ) -> (
        SummaryScheduler<CountingSummarizer>,
        watch::Receiver<Option<RollingSummary>>,
        Arc<InMemoryTaskStore>,
    ) {
        let store = Arc::new(InMemoryTaskStore::new());
        let query = Query::try_new("Should we shard the database?").unwrap();
        let task = NewTask::new(
            SessionId::new("s"),
            "tester",
            query.clone(),
            vec![SpecialistId::try_new("Alpha").unwrap()],
        )
        .unwrap();
        let task_id = store.create(task).await.unwrap();
        store.claim(task_id).await.unwrap();

        let (publish, latest) = watch::channel(None);
        let scheduler = SummaryScheduler {
            task_id,
            query,
            endpoint: "ollama:llama3".parse().unwrap(),
            interval: Duration::from_secs(10),
            capability,
            log: log.reader(),
            publish,
            store: store.clone(),
            observer: Arc::new(NoProgress),
            logger: Arc::new(NoConversationLogger),
            clock: Arc::new(SystemClock::new()),
        };
        (scheduler, latest, store)
    }

    fn append(log: &mut DiscussionLog, n: u32) {
        log.append(
            1,
            SpecialistId::try_new("Alpha").unwrap(),
            format!("point number {}", n),
            Utc::now(),
        );
    }

    #[tokio::test(start_paused = true)]
    async fn summarizes_each_version_at_most_once() {
        let capability = Arc::new(CountingSummarizer {
            prompts: Mutex::new(Vec::new()),
            fail: false,
        });
        let mut log = DiscussionLog::new();
        let (scheduler, latest, store) = scheduler(capability.clone(), &log).await;
        let task_id = scheduler.task_id;
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(scheduler.run(cancel.clone()));

        // Tick at 10s: empty log, nothing to do.
        tokio::time::sleep(Duration::from_secs(12)).await;
        append(&mut log, 1);
        append(&mut log, 2);
        // Ticks at 20s (version 2) and 30s (unchanged).
        tokio::time::sleep(Duration::from_secs(20)).await;
        append(&mut log, 3);
        // Tick at 40s (version 3).
        tokio::time::sleep(Duration::from_secs(10)).await;

        cancel.cancel();
        let report = handle.await.unwrap();

        let prompts = capability.prompts.lock().unwrap().clone();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("(2 contributions)"));
        assert!(prompts[1].contains("(3 contributions)"));
        assert_eq!(report.generated, 2);

        let newest = report.latest.unwrap();
        assert_eq!(newest.source_log_version, 3);
        assert_eq!(latest.borrow().as_ref(), Some(&newest));

        let stored = store.get(task_id).await.unwrap();
        assert_eq!(stored.result.rolling_summary, Some(newest));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_attempt_is_not_repeated_for_same_version() {
        let capability = Arc::new(CountingSummarizer {
            prompts: Mutex::new(Vec::new()),
            fail: true,
        });
        let mut log = DiscussionLog::new();
        append(&mut log, 1);
        let (scheduler, latest, _store) = scheduler(capability.clone(), &log).await;
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(scheduler.run(cancel.clone()));

        tokio::time::sleep(Duration::from_secs(45)).await;
        cancel.cancel();
        let report = handle.await.unwrap();

        assert_eq!(capability.prompts.lock().unwrap().len(), 1);
        assert_eq!(report.generated, 0);
        assert!(latest.borrow().is_none());
    }
}
