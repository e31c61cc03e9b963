//! Shared failure slot for background tasks.

use crate::error::{CoreError, CoreResult};
use parking_lot::Mutex;
use std::sync::Arc;

/// Records the first fatal failure of a background task.
///
/// Once set, the writer refuses all further work with
/// [`CoreError::PipelineFailed`].
#[derive(Debug, Clone, Default)]
pub(crate) struct Health {
    failure: Arc<Mutex<Option<String>>>,
}

impl Health {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Stores `message` unless an earlier failure is already recorded.
    pub(crate) fn fail(&self, message: impl Into<String>) {
        let mut failure = self.failure.lock();
        if failure.is_none() {
            *failure = Some(message.into());
        }
    }

    /// Returns the recorded failure, if any.
    pub(crate) fn failure(&self) -> Option<String> {
        self.failure.lock().clone()
    }

    /// Returns `Err(PipelineFailed)` once a failure is recorded.
    pub(crate) fn check(&self) -> CoreResult<()> {
        match self.failure() {
            Some(message) => Err(CoreError::pipeline_failed(message)),
            None => Ok(()),
        }
    }

    /// Converts a lost channel into the recorded failure.
    ///
    /// A background task only drops its end of a channel early after
    /// recording why, so a missing record means it panicked.
    pub(crate) fn stopped(&self, task: &str) -> CoreError {
        match self.failure() {
            Some(message) => CoreError::pipeline_failed(message),
            None => CoreError::pipeline_failed(format!("{task} stopped unexpectedly")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthy_until_failed() {
        let health = Health::new();
        assert!(health.check().is_ok());

        health.fail("disk full");
        let err = health.check().unwrap_err();
        assert!(matches!(err, CoreError::PipelineFailed { ref message } if message == "disk full"));
    }

    #[test]
    fn first_failure_wins() {
        let health = Health::new();
        let shared = health.clone();

        shared.fail("first");
        health.fail("second");
        assert_eq!(health.failure().as_deref(), Some("first"));
    }

    #[test]
    fn stopped_without_failure_names_task() {
        let health = Health::new();
        let err = health.stopped("flush pipeline");
        assert!(err.to_string().contains("flush pipeline stopped unexpectedly"));
    }
}
