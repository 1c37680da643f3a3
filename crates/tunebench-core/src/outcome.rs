//! Per-target outcomes and batch reports

use std::time::Duration;

use chrono::{DateTime, Utc};
use kameo_macros::Reply;

use crate::error::ActionError;

/// Result of one action on one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Address the action was run against
    pub target: String,
    pub success: bool,
    /// Exit code of the last command issued, if any completed
    pub exit_code: Option<i32>,
    /// Combined output of the commands issued
    pub output: String,
    pub elapsed: Duration,
    /// False when the target already matched the desired state
    pub changed: bool,
    pub error: Option<ActionError>,
}

impl ActionOutcome {
    /// Successful outcome
    pub fn ok(target: impl Into<String>, changed: bool) -> Self {
        Self {
            target: target.into(),
            success: true,
            exit_code: Some(0),
            output: String::new(),
            elapsed: Duration::ZERO,
            changed,
            error: None,
        }
    }

    /// Failed outcome
    pub fn failed(target: impl Into<String>, error: ActionError) -> Self {
        Self {
            target: target.into(),
            success: false,
            exit_code: error.exit_code(),
            output: String::new(),
            elapsed: Duration::ZERO,
            changed: false,
            error: Some(error),
        }
    }

    /// Record that the target was mutated before the action stopped
    #[must_use]
    pub fn with_changed(mut self, changed: bool) -> Self {
        self.changed = changed;
        self
    }

    #[must_use]
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    #[must_use]
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    /// One-line human summary
    #[must_use]
    pub fn status_line(&self) -> String {
        match &self.error {
            Some(ActionError::ConvergenceTimeout { attempts }) => {
                format!("unconfirmed (no reboot observed after {attempts} polls)")
            }
            Some(err) => match self.exit_code {
                Some(code) if code != 0 => format!("failed (exit code {code})"),
                _ => format!("failed ({err})"),
            },
            None if self.changed => "changed".to_string(),
            None => "no-op (already satisfied)".to_string(),
        }
    }
}

/// Outcomes of one action over a target list, in caller order
#[derive(Debug, Clone, Reply)]
pub struct BatchReport {
    /// Action name, e.g. `ring-buffers`
    pub action: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<ActionOutcome>,
}

impl BatchReport {
    pub(crate) fn start(action: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            action: action.into(),
            started_at: now,
            finished_at: now,
            outcomes: Vec::new(),
        }
    }

    pub(crate) fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }

    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    #[must_use]
    pub fn changed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.changed).count()
    }
}

/// Outcome of an environment test
#[derive(Debug, Clone, Reply)]
pub struct EnvTestReport {
    pub server: ActionOutcome,
    /// `None` when the server never started
    pub client: Option<ActionOutcome>,
}

impl EnvTestReport {
    #[must_use]
    pub fn success(&self) -> bool {
        self.server.success && self.client.as_ref().is_some_and(|c| c.success)
    }
}
