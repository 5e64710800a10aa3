//! Failure policy: decides whether a fatal error ends the process.
//!
//! The object model itself only ever returns `Result`s. Applications that
//! want the classic hard stop on misconfiguration opt into [`FailurePolicy::FailFast`]
//! at the top level; libraries and tests keep [`FailurePolicy::Propagate`].

use serde::{Deserialize, Serialize};

use super::error::Error;
use super::types::Result;

/// How fatal (configuration) errors are handled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Return every error to the caller.
    #[default]
    Propagate,
    /// Log fatal errors and terminate the process with exit code 1.
    FailFast,
}

impl FailurePolicy {
    /// Build from the `fail_fast` configuration flag.
    pub fn from_fail_fast(fail_fast: bool) -> Self {
        if fail_fast {
            FailurePolicy::FailFast
        } else {
            FailurePolicy::Propagate
        }
    }

    /// Whether this policy terminates on `err`.
    pub fn terminates_on(&self, err: &Error) -> bool {
        *self == FailurePolicy::FailFast && err.is_fatal()
    }

    /// Pass `result` through the policy.
    ///
    /// Non-fatal errors are always returned unchanged.
    pub fn apply<T>(&self, result: Result<T>) -> Result<T> {
        match result {
            Err(err) if self.terminates_on(&err) => {
                log::error!("fatal configuration error, exiting: {}", err);
                std::process::exit(1);
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ConfigError;

    #[test]
    fn test_propagate_returns_fatal_errors() {
        let policy = FailurePolicy::Propagate;
        let result: Result<()> = Err(Error::config("x", ConfigError::MissingTransferFunction));
        assert!(policy.apply(result).is_err());
    }

    #[test]
    fn test_fail_fast_only_terminates_on_configuration() {
        let policy = FailurePolicy::from_fail_fast(true);
        assert!(policy.terminates_on(&Error::config("x", ConfigError::MissingTransferFunction)));
        assert!(!policy.terminates_on(&Error::reference("x", "stale")));

        // Non-fatal errors pass through even under fail-fast.
        let result: Result<()> = Err(Error::reference("x", "stale"));
        assert!(policy.apply(result).is_err());
    }
}
