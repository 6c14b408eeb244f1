//! Specialist units: one concurrent task per specialist.
//!
//! A unit never touches the log directly. It reads snapshots, asks the
//! capability, and reports what happened to the coordinator, which is the
//! only writer.

use super::log::LogReader;
use crate::config::DiscussionParams;
use crate::ports::capability::{Capability, CapabilityError};
use council_domain::{
    ContributionPolicy, GenerationRequest, PolicyDecision, PromptTemplate, Query, RollingSummary,
    SpecialistId, SpecialistProfile, TurnOutcome,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, warn};

/// What a unit reports to the coordinator.
#[derive(Debug)]
pub(crate) enum UnitEvent {
    /// A capability call is starting.
    Thinking { specialist: SpecialistId },
    /// A contribution waiting to be admitted; the reply says whether it was.
    Propose {
        specialist: SpecialistId,
        round: u32,
        text: String,
        elapsed: Duration,
        reply: oneshot::Sender<bool>,
    },
    Passed {
        specialist: SpecialistId,
        round: u32,
        /// Set when the specialist was asked and answered with a pass.
        elapsed: Option<Duration>,
    },
    Failed {
        specialist: SpecialistId,
        round: u32,
        error: CapabilityError,
    },
    Finished { specialist: SpecialistId },
    /// The unit panicked; it will send nothing else.
    Crashed {
        specialist: SpecialistId,
        message: String,
    },
}

pub(crate) struct SpecialistUnit<C: Capability + 'static> {
    pub profile: SpecialistProfile,
    pub query: Query,
    pub policy: ContributionPolicy,
    pub params: DiscussionParams,
    pub capability: Arc<C>,
    pub log: LogReader,
    pub summary: watch::Receiver<Option<RollingSummary>>,
    pub events: mpsc::UnboundedSender<UnitEvent>,
    pub cancel: CancellationToken,
}

impl<C: Capability + 'static> SpecialistUnit<C> {
    /// Run the unit on its own task and turn a panic into a `Crashed` event.
    ///
    /// Aborting the returned future aborts the unit as well.
    pub async fn supervise(self) {
        let specialist = self.profile.id().clone();
        let events = self.events.clone();
        let handle = AbortOnDropHandle::new(tokio::spawn(self.run()));
        let Err(error) = handle.await else {
            return;
        };
        if !error.is_panic() {
            return;
        }
        let payload = error.into_panic();
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        let _ = events.send(UnitEvent::Crashed {
            specialist,
            message,
        });
    }

    pub async fn run(self) {
        let id = self.profile.id().clone();
        let system_prompt = PromptTemplate::specialist_system(&self.profile);

        for round in 1..=self.params.max_rounds {
            if self.cancel.is_cancelled() {
                break;
            }

            let snapshot = self.log.snapshot();
            match self.policy.evaluate(&self.profile, &snapshot, &self.query) {
                PolicyDecision::Skip(reason) => {
                    debug!("{} skips round {}: {}", id, round, reason);
                    self.report(UnitEvent::Passed {
                        specialist: id.clone(),
                        round,
                        elapsed: None,
                    });
                }
                PolicyDecision::Contribute => {
                    let summary = self.summary.borrow().clone();
                    let request = GenerationRequest::new(
                        self.profile.endpoint().clone(),
                        PromptTemplate::specialist_turn(
                            &self.profile,
                            &self.query,
                            &snapshot,
                            summary.as_ref(),
                        ),
                    )
                    .with_system_prompt(system_prompt.clone());

                    self.report(UnitEvent::Thinking {
                        specialist: id.clone(),
                    });
                    let started = Instant::now();
                    let result = self.generate(&request, round).await;
                    let elapsed = started.elapsed();

                    match result {
                        Ok(raw) => match TurnOutcome::from_response(&raw) {
                            TurnOutcome::Pass => self.report(UnitEvent::Passed {
                                specialist: id.clone(),
                                round,
                                elapsed: Some(elapsed),
                            }),
                            TurnOutcome::Contribution(text) => {
                                let (reply, admitted) = oneshot::channel();
                                self.report(UnitEvent::Propose {
                                    specialist: id.clone(),
                                    round,
                                    text,
                                    elapsed,
                                    reply,
                                });
                                if !admitted.await.unwrap_or(false) {
                                    debug!("{} proposal for round {} was not admitted", id, round);
                                }
                            }
                        },
                        Err(error) => {
                            warn!("{} failed in round {}: {}", id, round, error);
                            self.report(UnitEvent::Failed {
                                specialist: id.clone(),
                                round,
                                error,
                            });
                        }
                    }
                }
            }

            if round < self.params.max_rounds {
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.params.poll_interval) => {}
                }
            }
        }

        self.report(UnitEvent::Finished { specialist: id });
    }

    /// One capability call with transient retries. Cancellation cuts the
    /// backoff short but never an in-flight call.
    async fn generate(&self, request: &GenerationRequest, round: u32) -> Result<String, CapabilityError> {
        let mut attempt = 0;
        loop {
            match self.capability.generate(request).await {
                Err(CapabilityError::Transient(message))
                    if attempt < self.params.max_transient_retries =>
                {
                    let delay = self.params.transient_delay(attempt);
                    debug!(
                        "{} round {}: transient error ({}), retry {} in {:?}",
                        self.profile.id(),
                        round,
                        message,
                        attempt + 1,
                        delay
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => return Err(CapabilityError::Transient(message)),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    fn report(&self, event: UnitEvent) {
        // The coordinator may already have stopped listening.
        let _ = self.events.send(event);
    }
}
