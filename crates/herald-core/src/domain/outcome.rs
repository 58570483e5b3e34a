//! Outcome model: what user handler logic produces.
//!
//! An [`Outcome`] is exactly one of success (optionally carrying data) or an
//! [`ErrorResult`]. Data and error are mutually exclusive by construction.
//! The dispatch layer turns an outcome into a response exactly once.

use super::errors::{BoxError, ErrorResult};

/// Result of user-supplied handler logic.
///
/// - `Outcome<()>` is the command shape: `Ok(())` or an error.
/// - `Outcome<T>` is the query shape: `Ok(data)` or an error.
#[derive(Debug, Clone)]
#[must_use]
pub enum Outcome<T = ()> {
    Ok(T),
    Error(ErrorResult),
}

impl Outcome<()> {
    /// Success without data.
    pub fn ok() -> Self {
        Self::Ok(())
    }
}

impl<T> Outcome<T> {
    /// Success carrying `data`.
    pub fn data(data: T) -> Self {
        Self::Ok(data)
    }

    /// Explicit generic failure.
    pub fn error() -> Self {
        Self::Error(ErrorResult::Unknown)
    }

    /// Explicit failure with a message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Error(ErrorResult::failed(message))
    }

    pub fn cancelled() -> Self {
        Self::Error(ErrorResult::Cancelled)
    }

    pub fn no_handler() -> Self {
        Self::Error(ErrorResult::NoHandler)
    }

    pub fn exception(fault: impl Into<BoxError>) -> Self {
        Self::Error(ErrorResult::exception(fault))
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    pub fn is_error(&self) -> bool {
        !self.is_ok()
    }

    pub fn error_result(&self) -> Option<&ErrorResult> {
        match self {
            Self::Ok(_) => None,
            Self::Error(e) => Some(e),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Ok(data) => Outcome::Ok(f(data)),
            Self::Error(e) => Outcome::Error(e),
        }
    }

    pub fn into_result(self) -> Result<T, ErrorResult> {
        self.into()
    }
}

impl<T> From<ErrorResult> for Outcome<T> {
    fn from(error: ErrorResult) -> Self {
        Self::Error(error)
    }
}

impl<T> From<Result<T, ErrorResult>> for Outcome<T> {
    fn from(result: Result<T, ErrorResult>) -> Self {
        match result {
            Ok(data) => Self::Ok(data),
            Err(e) => Self::Error(e),
        }
    }
}

impl<T> From<Outcome<T>> for Result<T, ErrorResult> {
    fn from(outcome: Outcome<T>) -> Self {
        match outcome {
            Outcome::Ok(data) => Ok(data),
            Outcome::Error(e) => Err(e),
        }
    }
}
