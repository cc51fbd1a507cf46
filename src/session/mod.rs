//! Search session
//!
//! Drives the orchestrator on behalf of a presentation layer: debounces
//! submissions, tags every invocation with a sequence number and publishes
//! state changes over a watch channel. A result that resolves after a newer
//! invocation was issued is discarded.

mod debounce;

pub use debounce::{Debouncer, InvocationSequencer};

use crate::config::Config;
use crate::search::{ResultEnvelope, SearchCriteria, SearchError, SearchOrchestrator};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// What a caller currently sees
#[derive(Debug, Clone, Default)]
pub enum SessionState {
    #[default]
    Idle,
    InFlight {
        seq: u64,
        criteria: SearchCriteria,
    },
    Success {
        seq: u64,
        envelope: Arc<ResultEnvelope>,
    },
    Failed {
        seq: u64,
        error: SearchError,
    },
}

impl SessionState {
    pub fn seq(&self) -> Option<u64> {
        match self {
            SessionState::Idle => None,
            SessionState::InFlight { seq, .. }
            | SessionState::Success { seq, .. }
            | SessionState::Failed { seq, .. } => Some(*seq),
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            SessionState::Success { .. } | SessionState::Failed { .. }
        )
    }
}

pub struct SearchSession {
    orchestrator: SearchOrchestrator,
    sequencer: InvocationSequencer,
    debouncer: Debouncer,
    state: Arc<watch::Sender<SessionState>>,
    last_criteria: Option<SearchCriteria>,
}

impl SearchSession {
    pub fn new(orchestrator: SearchOrchestrator, debounce_window: Duration) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);

        Self {
            orchestrator,
            sequencer: InvocationSequencer::new(),
            debouncer: Debouncer::new(debounce_window),
            state: Arc::new(state),
            last_criteria: None,
        }
    }

    /// Build a session using the configured debounce window
    pub fn from_config(orchestrator: SearchOrchestrator, config: &Config) -> crate::Result<Self> {
        Ok(Self::new(orchestrator, config.fetch.debounce_window()?))
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Submit criteria after the debounce window. A newer submission within
    /// the window replaces this one.
    pub fn submit(&mut self, criteria: SearchCriteria) {
        self.last_criteria = Some(criteria.clone());
        let work = self.invocation(criteria);
        self.debouncer.schedule(work);
    }

    /// Submit criteria immediately, bypassing the debouncer
    pub fn submit_now(&mut self, criteria: SearchCriteria) -> JoinHandle<()> {
        self.debouncer.cancel();
        self.last_criteria = Some(criteria.clone());
        tokio::spawn(self.invocation(criteria))
    }

    /// Re-run the most recently submitted criteria
    pub fn retry(&mut self) -> Option<JoinHandle<()>> {
        let criteria = self.last_criteria.clone()?;
        Some(self.submit_now(criteria))
    }

    /// Cancel a debounced submission that has not fired yet
    pub fn cancel_pending(&mut self) -> bool {
        self.debouncer.cancel()
    }

    fn invocation(&self, criteria: SearchCriteria) -> impl std::future::Future<Output = ()> + Send + 'static {
        let orchestrator = self.orchestrator.clone();
        let sequencer = self.sequencer.clone();
        let state = self.state.clone();

        async move {
            let mut seq = 0;
            state.send_modify(|current| {
                seq = sequencer.issue();
                *current = SessionState::InFlight {
                    seq,
                    criteria: criteria.clone(),
                };
            });

            let result = orchestrator.execute(criteria).await;

            let published = state.send_if_modified(|current| {
                if !sequencer.is_latest(seq) {
                    return false;
                }
                *current = match result {
                    Ok(envelope) => SessionState::Success { seq, envelope },
                    Err(error) => SessionState::Failed { seq, error },
                };
                true
            });

            if !published {
                tracing::debug!("Discarding stale search result #{}", seq);
            }
        }
    }
}
