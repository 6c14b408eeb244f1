use super::*;
use crate::ports::task_store::InMemoryTaskStore;
use async_trait::async_trait;
use council_domain::{NewTask, Query, SessionId, SpecialistProfile, SpecialistTier};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

// ==================== Scripted capability ====================

#[derive(Clone)]
enum Reply {
    Text(&'static str),
    Pass,
    Fail(CapabilityError),
    After(Duration, Box<Reply>),
    Hang,
    Panic,
}

/// Answers specialists from per-specialist scripts (default: pass) and
/// records every synthesis and summary request.
struct ScriptedCapability {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<HashMap<String, u32>>,
    syntheses: Mutex<Vec<GenerationRequest>>,
    synthesis_reply: Reply,
}

impl ScriptedCapability {
    fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            syntheses: Mutex::new(Vec::new()),
            synthesis_reply: Reply::Text("Consensus: go with option one."),
        }
    }

    fn script(self, specialist: &str, replies: Vec<Reply>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(specialist.to_string(), replies.into());
        self
    }

    fn with_synthesis(mut self, reply: Reply) -> Self {
        self.synthesis_reply = reply;
        self
    }

    fn calls(&self, specialist: &str) -> u32 {
        self.calls.lock().unwrap().get(specialist).copied().unwrap_or(0)
    }

    fn syntheses(&self) -> Vec<GenerationRequest> {
        self.syntheses.lock().unwrap().clone()
    }

    fn speaker(request: &GenerationRequest) -> Option<String> {
        let system = request.system_prompt.as_deref()?;
        let rest = system.strip_prefix("You are ")?;
        rest.split_once(", one of several specialists")
            .map(|(name, _)| name.to_string())
    }

    async fn play(reply: Reply) -> Result<String, CapabilityError> {
        let mut reply = reply;
        loop {
            match reply {
                Reply::Text(text) => return Ok(text.to_string()),
                Reply::Pass => return Ok("[PASS]".to_string()),
                Reply::Fail(error) => return Err(error),
                Reply::After(delay, next) => {
                    tokio::time::sleep(delay).await;
                    reply = *next;
                }
                Reply::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    return Ok("[PASS]".to_string());
                }
                Reply::Panic => panic!("scripted capability panic"),
            }
        }
    }
}

#[async_trait]
impl Capability for ScriptedCapability {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, CapabilityError> {
        let reply = match Self::speaker(request) {
            Some(speaker) => {
                *self.calls.lock().unwrap().entry(speaker.clone()).or_default() += 1;
                self.scripts
                    .lock()
                    .unwrap()
                    .get_mut(&speaker)
                    .and_then(|queue| queue.pop_front())
                    .unwrap_or(Reply::Pass)
            }
            None => {
                self.syntheses.lock().unwrap().push(request.clone());
                self.synthesis_reply.clone()
            }
        };
        Self::play(reply).await
    }

    async fn health_check(&self) -> bool {
        true
    }
}

/// Every capability call returns a fresh, distinct contribution.
struct Chatty {
    counter: Mutex<u32>,
}

#[async_trait]
impl Capability for Chatty {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, CapabilityError> {
        let n = {
            let mut counter = self.counter.lock().unwrap();
            *counter += 1;
            *counter
        };
        let who = ScriptedCapability::speaker(request).unwrap_or_else(|| "moderator".into());
        tokio::time::sleep(Duration::from_millis(10 * (n as u64 % 4))).await;
        Ok(format!("{} makes point number {}", who, n))
    }

    async fn health_check(&self) -> bool {
        true
    }
}

// ==================== Fixtures ====================

fn roster(names: &[&str]) -> Roster {
    let endpoint: CapabilityEndpoint = "ollama:llama3".parse().unwrap();
    Roster::new(
        names
            .iter()
            .map(|name| {
                SpecialistProfile::new(
                    SpecialistId::try_new(*name).unwrap(),
                    SpecialistTier::Core,
                    endpoint.clone(),
                )
            })
            .collect(),
    )
    .unwrap()
}

fn params() -> DiscussionParams {
    DiscussionParams::default()
        .with_max_rounds(3)
        .with_poll_interval(Duration::from_secs(1))
        .with_specialist_timeout(Duration::from_secs(60))
        .with_transient_backoff(Duration::from_millis(100))
}

async fn submit(store: &InMemoryTaskStore, names: &[&str]) -> TaskId {
    let task = NewTask::new(
        SessionId::new("session-1"),
        "tester",
        Query::try_new("Which caching strategy should we adopt?").unwrap(),
        names
            .iter()
            .map(|n| SpecialistId::try_new(*n).unwrap())
            .collect(),
    )
    .unwrap();
    store.create(task).await.unwrap()
}

fn coordinator<C: Capability + 'static>(
    capability: Arc<C>,
    store: Arc<InMemoryTaskStore>,
    names: &[&str],
    params: DiscussionParams,
) -> DiscussionCoordinator<C> {
    DiscussionCoordinator::new(capability, store, roster(names)).with_params(params)
}

fn id(name: &str) -> SpecialistId {
    SpecialistId::try_new(name).unwrap()
}

// ==================== Tests ====================

#[tokio::test(start_paused = true)]
async fn three_specialists_settle_after_four_contributions() {
    let names = ["Alpha", "Beta", "Gamma"];
    let capability = Arc::new(
        ScriptedCapability::new()
            .script(
                "Alpha",
                vec![
                    Reply::Text("Alpha: cache reads at the edge."),
                    Reply::Text("Alpha: and invalidate on write events."),
                ],
            )
            .script(
                "Beta",
                vec![Reply::After(
                    Duration::from_millis(10),
                    Box::new(Reply::Text("Beta: edge caching hurts consistency.")),
                )],
            )
            .script(
                "Gamma",
                vec![Reply::After(
                    Duration::from_millis(20),
                    Box::new(Reply::Text("Gamma: measure hit rates before deciding.")),
                )],
            ),
    );
    let store = Arc::new(InMemoryTaskStore::new());
    let task_id = submit(&store, &names).await;

    let outcome = coordinator(capability.clone(), store.clone(), &names, params())
        .run(task_id)
        .await
        .unwrap();

    assert!(outcome.is_completed());
    assert_eq!(outcome.contributions.len(), 4);
    assert_eq!(
        outcome.statistics.termination,
        TerminationReason::AllPassed { round: 3 }
    );
    let speakers: Vec<&str> = outcome
        .contributions
        .iter()
        .map(|c| c.specialist.as_str())
        .collect();
    assert_eq!(speakers, vec!["Alpha", "Beta", "Gamma", "Alpha"]);
    let sequences: Vec<u64> = outcome.contributions.iter().map(|c| c.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4]);

    let syntheses = capability.syntheses();
    assert_eq!(syntheses.len(), 1);
    for contribution in &outcome.contributions {
        assert!(syntheses[0].prompt.contains(&contribution.text));
    }
    assert_eq!(
        outcome.final_synthesis.as_deref(),
        Some("Consensus: go with option one.")
    );

    let stored = store.get(task_id).await.unwrap();
    assert_eq!(stored.status, TaskStatus::Completed);
    assert_eq!(stored.result.contributions.len(), 4);
    assert_eq!(
        stored.result.final_synthesis.as_deref(),
        Some("Consensus: go with option one.")
    );
    assert!(stored.result.statistics.is_some());
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_within_the_round() {
    let names = ["Alpha", "Beta"];
    let busy = || Reply::Fail(CapabilityError::Transient("server busy".into()));
    let capability = Arc::new(
        ScriptedCapability::new()
            .script("Alpha", vec![Reply::Text("Alpha: start with a read-through cache.")])
            .script(
                "Beta",
                vec![
                    busy(),
                    busy(),
                    Reply::Text("Beta: keep the TTL short at first."),
                ],
            ),
    );
    let store = Arc::new(InMemoryTaskStore::new());
    let task_id = submit(&store, &names).await;

    let outcome = coordinator(capability.clone(), store, &names, params())
        .run(task_id)
        .await
        .unwrap();

    let from_beta: Vec<_> = outcome
        .contributions
        .iter()
        .filter(|c| c.specialist == id("Beta"))
        .collect();
    assert_eq!(from_beta.len(), 1);
    assert_eq!(from_beta[0].round, 1);
    assert_eq!(capability.calls("Beta"), 3);

    let beta = &outcome.statistics.specialists[&id("Beta")];
    assert_eq!(beta.contributions, 1);
    assert_eq!(beta.errors, 0);
}

#[tokio::test(start_paused = true)]
async fn silent_discussion_completes_without_synthesis_call() {
    let names = ["Alpha", "Beta"];
    let capability = Arc::new(ScriptedCapability::new());
    let store = Arc::new(InMemoryTaskStore::new());
    let task_id = submit(&store, &names).await;

    let outcome = coordinator(capability.clone(), store, &names, params())
        .run(task_id)
        .await
        .unwrap();

    assert!(outcome.is_completed());
    assert!(outcome.contributions.is_empty());
    assert_eq!(outcome.final_synthesis.as_deref(), Some(NO_DISCUSSION));
    assert_eq!(
        outcome.statistics.termination,
        TerminationReason::AllPassed { round: 1 }
    );
    assert!(capability.syntheses().is_empty());
    assert_eq!(capability.calls("Alpha"), 1);
    assert_eq!(capability.calls("Beta"), 1);
}

#[tokio::test(start_paused = true)]
async fn quiet_gap_ends_discussion_as_idle() {
    let names = ["Alpha", "Beta"];
    let capability = Arc::new(
        ScriptedCapability::new()
            .script(
                "Alpha",
                vec![Reply::After(
                    Duration::from_millis(300),
                    Box::new(Reply::Text("Alpha: a per-region cache is plenty.")),
                )],
            )
            .script(
                "Beta",
                vec![Reply::After(Duration::from_millis(300), Box::new(Reply::Pass))],
            ),
    );
    let store = Arc::new(InMemoryTaskStore::new());
    let task_id = submit(&store, &names).await;
    let params = params().with_idle_grace(Duration::from_millis(500));

    let outcome = coordinator(capability.clone(), store.clone(), &names, params)
        .run(task_id)
        .await
        .unwrap();

    assert_eq!(outcome.statistics.termination, TerminationReason::Idle);
    assert!(outcome.is_completed());
    assert_eq!(outcome.contributions.len(), 1);
    assert_eq!(capability.syntheses().len(), 1);

    let stored = store.get(task_id).await.unwrap();
    assert_eq!(stored.status, TaskStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn panicking_unit_is_removed_and_reported() {
    let names = ["Alpha", "Beta"];
    let capability = Arc::new(ScriptedCapability::new().script("Beta", vec![Reply::Panic]));
    let store = Arc::new(InMemoryTaskStore::new());
    let task_id = submit(&store, &names).await;

    let outcome = coordinator(capability.clone(), store.clone(), &names, params())
        .run(task_id)
        .await
        .unwrap();

    assert_eq!(
        outcome.statistics.termination,
        TerminationReason::AllPassed { round: 1 }
    );
    assert_eq!(outcome.status, TaskStatus::Failed);
    assert!(
        outcome
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("panicked")
    );
    let beta = &outcome.statistics.specialists[&id("Beta")];
    assert!(beta.removed);
    assert_eq!(beta.errors, 1);
    assert_eq!(capability.calls("Beta"), 1);

    let stored = store.get(task_id).await.unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn timeout_bounds_the_discussion_and_fails_empty_task() {
    let names = ["Alpha", "Beta"];
    let capability = Arc::new(
        ScriptedCapability::new()
            .script("Alpha", vec![Reply::Hang])
            .script("Beta", vec![Reply::Hang]),
    );
    let store = Arc::new(InMemoryTaskStore::new());
    let task_id = submit(&store, &names).await;
    let params = params().with_specialist_timeout(Duration::from_secs(5));

    let started = Instant::now();
    let outcome = coordinator(capability, store.clone(), &names, params)
        .run(task_id)
        .await
        .unwrap();
    let elapsed = started.elapsed();

    // Timeout plus one poll interval, with slack for timer granularity.
    assert!(elapsed <= Duration::from_secs(6) + Duration::from_millis(10));
    assert_eq!(outcome.status, TaskStatus::Failed);
    assert_eq!(outcome.statistics.termination, TerminationReason::Timeout);
    assert!(
        outcome
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("timed out")
    );

    let stored = store.get(task_id).await.unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn timeout_keeps_partial_log() {
    let names = ["Alpha", "Beta"];
    let capability = Arc::new(
        ScriptedCapability::new()
            .script("Alpha", vec![Reply::Text("Alpha: a write-behind cache is enough.")])
            .script("Beta", vec![Reply::Hang]),
    );
    let store = Arc::new(InMemoryTaskStore::new());
    let task_id = submit(&store, &names).await;
    let params = params().with_specialist_timeout(Duration::from_secs(5));

    let outcome = coordinator(capability, store, &names, params)
        .run(task_id)
        .await
        .unwrap();

    assert!(outcome.is_completed());
    assert_eq!(outcome.statistics.termination, TerminationReason::Timeout);
    assert_eq!(outcome.contributions.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn persistent_failures_remove_a_specialist() {
    let names = ["Alpha", "Beta"];
    let broken = || Reply::Fail(CapabilityError::Persistent("model not found".into()));
    let capability = Arc::new(
        ScriptedCapability::new()
            .script("Alpha", vec![Reply::Text("Alpha: start with a read-through cache.")])
            .script("Beta", vec![broken(), broken(), broken()]),
    );
    let store = Arc::new(InMemoryTaskStore::new());
    let task_id = submit(&store, &names).await;

    let outcome = coordinator(capability.clone(), store.clone(), &names, params())
        .run(task_id)
        .await
        .unwrap();

    assert!(outcome.is_completed());
    assert_eq!(outcome.contributions.len(), 1);
    let beta = &outcome.statistics.specialists[&id("Beta")];
    assert!(beta.removed);
    assert_eq!(beta.errors, 2);
    assert_eq!(capability.calls("Beta"), 2);

    let stored = store.get(task_id).await.unwrap();
    assert_eq!(
        stored.result.specialist_status.get(&id("Beta")),
        Some(&council_domain::SpecialistStatus::Removed)
    );
}

#[tokio::test(start_paused = true)]
async fn failing_specialists_with_empty_log_fail_the_task() {
    let names = ["Alpha"];
    let limited = || Reply::Fail(CapabilityError::RateLimited { retry_after: None });
    let capability = Arc::new(
        ScriptedCapability::new().script("Alpha", vec![limited(), limited(), limited()]),
    );
    let store = Arc::new(InMemoryTaskStore::new());
    let task_id = submit(&store, &names).await;

    let outcome = coordinator(capability, store.clone(), &names, params())
        .run(task_id)
        .await
        .unwrap();

    assert_eq!(outcome.status, TaskStatus::Failed);
    assert_eq!(outcome.statistics.termination, TerminationReason::MaxRounds);
    assert!(
        outcome
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("rate limit exhausted")
    );
}

#[tokio::test(start_paused = true)]
async fn synthesis_failure_falls_back() {
    let names = ["Alpha"];
    let capability = Arc::new(
        ScriptedCapability::new()
            .script("Alpha", vec![Reply::Text("Alpha: cache the hot keys only.")])
            .with_synthesis(Reply::Fail(CapabilityError::Persistent("quota".into()))),
    );
    let store = Arc::new(InMemoryTaskStore::new());
    let task_id = submit(&store, &names).await;

    let outcome = coordinator(capability, store, &names, params())
        .run(task_id)
        .await
        .unwrap();

    assert!(outcome.is_completed());
    assert_eq!(outcome.final_synthesis.as_deref(), Some(SYNTHESIS_UNAVAILABLE));
}

#[tokio::test(start_paused = true)]
async fn hung_synthesis_is_cut_off_by_its_own_timeout() {
    let names = ["Alpha"];
    let capability = Arc::new(
        ScriptedCapability::new()
            .script("Alpha", vec![Reply::Text("Alpha: cache the hot keys only.")])
            .with_synthesis(Reply::Hang),
    );
    let store = Arc::new(InMemoryTaskStore::new());
    let task_id = submit(&store, &names).await;
    let params = params().with_synthesis_timeout(Duration::from_secs(5));

    let started = Instant::now();
    let outcome = coordinator(capability.clone(), store, &names, params)
        .run(task_id)
        .await
        .unwrap();

    // Well under the 60s discussion cap.
    assert!(started.elapsed() <= Duration::from_secs(15));
    assert!(outcome.is_completed());
    assert_eq!(outcome.final_synthesis.as_deref(), Some(SYNTHESIS_UNAVAILABLE));
    assert_eq!(capability.syntheses().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn log_respects_contribution_rules_under_load() {
    let names = ["Alpha", "Beta", "Gamma", "Delta"];
    let capability = Arc::new(Chatty {
        counter: Mutex::new(0),
    });
    let store = Arc::new(InMemoryTaskStore::new());
    let task_id = submit(&store, &names).await;
    let params = params().with_max_rounds(10);

    let outcome = coordinator(capability, store, &names, params)
        .run(task_id)
        .await
        .unwrap();

    let log = &outcome.contributions;
    assert!(!log.is_empty());
    for name in names {
        let count = log.iter().filter(|c| c.specialist == id(name)).count();
        assert!(count <= 3, "{} spoke {} times", name, count);
    }
    for pair in log.windows(2) {
        assert_ne!(pair[0].specialist, pair[1].specialist);
    }
    for window in log.windows(3) {
        for name in names {
            let count = window.iter().filter(|c| c.specialist == id(name)).count();
            assert!(count <= 2);
        }
    }
    for (i, contribution) in log.iter().enumerate() {
        assert_eq!(contribution.sequence, i as u64 + 1);
    }
}

#[tokio::test(start_paused = true)]
async fn rolling_summary_feeds_final_synthesis() {
    let names = ["Alpha", "Beta"];
    let capability = Arc::new(
        ScriptedCapability::new()
            .script(
                "Alpha",
                vec![
                    Reply::Text("Alpha: read-through cache for the catalog."),
                    Reply::After(
                        Duration::from_millis(3500),
                        Box::new(Reply::Text("Alpha: plus a warmup job at deploy.")),
                    ),
                ],
            )
            .script("Beta", vec![Reply::Text("Beta: agreed, but watch memory.")])
            .with_synthesis(Reply::Text("Summary: cache the catalog.")),
    );
    let store = Arc::new(InMemoryTaskStore::new());
    let task_id = submit(&store, &names).await;
    let params = params().with_rolling_summary_interval(Duration::from_secs(2));

    let outcome = coordinator(capability.clone(), store, &names, params)
        .run(task_id)
        .await
        .unwrap();

    let summary = outcome.rolling_summary.expect("rolling summary");
    assert_eq!(summary.source_log_version, 2);
    assert_eq!(outcome.statistics.rolling_summaries, 1);

    let syntheses = capability.syntheses();
    let last = syntheses.last().unwrap();
    assert!(last.prompt.contains("Running summary (as of contribution 2)"));
    assert!(last.prompt.contains("Alpha: plus a warmup job at deploy."));
}

#[tokio::test]
async fn claimed_task_cannot_be_run_twice() {
    let names = ["Alpha"];
    let store = Arc::new(InMemoryTaskStore::new());
    let task_id = submit(&store, &names).await;
    store.claim(task_id).await.unwrap();

    let result = coordinator(Arc::new(ScriptedCapability::new()), store, &names, params())
        .run(task_id)
        .await;

    assert!(matches!(result, Err(RunDiscussionError::ClaimConflict(claimed)) if claimed == task_id));
}

#[tokio::test]
async fn unknown_specialist_fails_the_task() {
    let store = Arc::new(InMemoryTaskStore::new());
    let task_id = submit(&store, &["Alpha", "Omega"]).await;

    let result = coordinator(
        Arc::new(ScriptedCapability::new()),
        store.clone(),
        &["Alpha"],
        params(),
    )
    .run(task_id)
    .await;

    assert!(matches!(result, Err(RunDiscussionError::UnknownSpecialist(ref s)) if s.as_str() == "Omega"));
    let stored = store.get(task_id).await.unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
}
