//! One user's "query -> display -> reset" cycle as an explicit state machine.
//!
//! Every submission is stamped with the session generation. `reset` bumps the
//! generation, so a response that arrives after the user moved on is dropped
//! instead of overwriting the fresh state.

use thiserror::Error;
use tokio::sync::Mutex;

use crate::client::{classify_outcome, AnalyzerClient};
use crate::error::AnalyzeError;
use crate::models::{AnalysisResult, Submission};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    AwaitingInput,
    Submitting,
    Success(AnalysisResult),
    Failed(AnalyzeError),
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::AwaitingInput => "awaiting_input",
            SessionState::Submitting => "submitting",
            SessionState::Success(_) => "success",
            SessionState::Failed(_) => "failed",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("an analysis is already in flight")]
    InFlight,

    #[error("a result is on screen; reset before checking another product")]
    ResultShown,

    #[error("nothing to retry")]
    NothingToRetry,

    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
}

/// Proof that a submission was started in a given generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
}

#[derive(Debug)]
pub struct Session {
    state: SessionState,
    generation: u64,
    submission: Option<Submission>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            generation: 0,
            submission: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The input behind the current or last submission, kept on failure so it
    /// can be shown next to the error.
    pub fn submission(&self) -> Option<&Submission> {
        self.submission.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.state == SessionState::Submitting
    }

    pub fn begin_input(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Submitting => Err(SessionError::InFlight),
            SessionState::AwaitingInput => Ok(()),
            _ => {
                self.state = SessionState::AwaitingInput;
                Ok(())
            }
        }
    }

    pub fn submit(&mut self, submission: Submission) -> Result<Ticket, SessionError> {
        match self.state {
            SessionState::Submitting => return Err(SessionError::InFlight),
            SessionState::Success(_) => return Err(SessionError::ResultShown),
            _ => {}
        }

        self.submission = Some(submission);
        self.state = SessionState::Submitting;
        log::debug!("🚀 Session submission started (generation {})", self.generation);
        Ok(Ticket {
            generation: self.generation,
        })
    }

    /// "Try Again" with the preserved input.
    pub fn retry(&mut self) -> Result<(Ticket, Submission), SessionError> {
        if !matches!(self.state, SessionState::Failed(_)) {
            return Err(SessionError::InvalidTransition {
                action: "retry",
                state: self.state.name(),
            });
        }

        let submission = self.submission.clone().ok_or(SessionError::NothingToRetry)?;
        self.state = SessionState::Submitting;
        Ok((
            Ticket {
                generation: self.generation,
            },
            submission,
        ))
    }

    /// Applies a finished request. Returns false when the response is stale
    /// and was discarded.
    pub fn resolve(
        &mut self,
        ticket: Ticket,
        outcome: Result<AnalysisResult, AnalyzeError>,
    ) -> bool {
        if ticket.generation != self.generation || !self.is_busy() {
            log::debug!(
                "🗑️ Discarding late response (ticket generation {}, current {}, state {})",
                ticket.generation,
                self.generation,
                self.state.name()
            );
            return false;
        }

        self.state = match classify_outcome(outcome) {
            Ok(result) => SessionState::Success(result),
            Err(e) => {
                log::warn!("⚠️ Analysis failed: {}", e);
                SessionState::Failed(e)
            }
        };
        true
    }

    /// "Check another product": back to idle, forgetting input and result.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.state = SessionState::Idle;
        self.submission = None;
    }
}

/// Runs one submission for a shared session without holding the lock across
/// the network call. Returns whether the response was applied.
pub async fn run_analysis(
    session: &Mutex<Session>,
    client: &AnalyzerClient,
    submission: Submission,
) -> Result<bool, SessionError> {
    let ticket = session.lock().await.submit(submission.clone())?;
    let outcome = client.analyze(&submission).await;
    Ok(session.lock().await.resolve(ticket, outcome))
}
