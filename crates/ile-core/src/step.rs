//! Tagged result of one pipeline step
//!
//! Every I/O step of a run ends in one of three tiers. The driver of each
//! stage decides what a tier means for the run instead of each call site
//! branching on raw errors:
//!
//! ```text
//! Ok(value)        -> continue with the value
//! Skipped(reason)  -> log, fall back (watermark 0, empty source, dropped row)
//! Fatal(reason)    -> abort the run
//! ```

use crate::error::IleError;

/// Outcome of a single step in the export pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<T> {
    /// Step produced a value
    Ok(T),
    /// Step failed in a recoverable way
    Skipped(String),
    /// Step failed in a way the run cannot recover from
    Fatal(String),
}

impl<T> Step<T> {
    /// Map a result into the step tiers using the error's own classification.
    pub fn from_result(result: Result<T, IleError>) -> Self {
        match result {
            Ok(value) => Step::Ok(value),
            Err(err) => Self::from_error(err),
        }
    }

    pub fn from_error(err: IleError) -> Self {
        if err.is_fatal() {
            Step::Fatal(err.to_string())
        } else {
            Step::Skipped(err.to_string())
        }
    }

    /// Map an optional result, treating `None` as skipped with `reason`.
    pub fn from_option(result: Result<Option<T>, IleError>, reason: &str) -> Self {
        match result {
            Ok(Some(value)) => Step::Ok(value),
            Ok(None) => Step::Skipped(reason.to_string()),
            Err(err) => Self::from_error(err),
        }
    }

    /// Chain another step onto a successful one.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Step<U>) -> Step<U> {
        match self {
            Step::Ok(value) => f(value),
            Step::Skipped(reason) => Step::Skipped(reason),
            Step::Fatal(reason) => Step::Fatal(reason),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Step<U> {
        self.and_then(|value| Step::Ok(f(value)))
    }

    /// Reason for a non-Ok step.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Step::Ok(_) => None,
            Step::Skipped(reason) | Step::Fatal(reason) => Some(reason),
        }
    }
}
