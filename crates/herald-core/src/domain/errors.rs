//! Errors - エラー型と分類
//!
//! 2 つの層に分けています。
//! - [`ErrorResult`]: handler 内部で起きた失敗。Response のデータとして呼び出し側に返る
//! - [`DispatchError`]: 配線・設定の誤り。send の呼び出し側に `Err` として伝播する

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

/// Handler や activator が返す任意のエラー
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// `ErrorResult::Exception` が保持する元の fault（Clone 可能な共有所有）
pub type Fault = Arc<dyn StdError + Send + Sync>;

/// ErrorKind は ErrorResult の分類
///
/// SUCCESS / FAILURE と同じく SCREAMING_SNAKE_CASE でシリアライズします。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Unknown,
    NoHandler,
    Cancelled,
    Exception,
    Failed,
}

/// The error half of an [`Outcome`](crate::domain::Outcome).
///
/// Every variant is a terminal failure object in its own right: it implements
/// [`std::error::Error`], so `ensure_success()?` and `into_result()?` can
/// propagate it unchanged.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ErrorResult {
    /// Explicit generic failure returned by user logic.
    #[error("An unknown error occurred.")]
    Unknown,

    /// No eligible handler was found for the request.
    #[error("No handler found.")]
    NoHandler,

    /// The cancellation token was already tripped when the handler was invoked.
    #[error("The request was cancelled.")]
    Cancelled,

    /// User logic returned an error or panicked. Carries the original fault.
    #[error(transparent)]
    Exception(Fault),

    /// Explicit failure with a caller-chosen message.
    #[error("{0}")]
    Failed(String),
}

impl ErrorResult {
    pub fn exception(fault: impl Into<BoxError>) -> Self {
        Self::Exception(Arc::from(fault.into()))
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unknown => ErrorKind::Unknown,
            Self::NoHandler => ErrorKind::NoHandler,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Exception(_) => ErrorKind::Exception,
            Self::Failed(_) => ErrorKind::Failed,
        }
    }

    /// Human-readable message. For `Exception` this is the fault's own message.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// The original fault, if this is an `Exception`.
    pub fn fault(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            Self::Exception(fault) => Some(fault.as_ref()),
            _ => None,
        }
    }
}

impl Serialize for ErrorResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ErrorResult", 2)?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("message", &self.message())?;
        state.end()
    }
}

/// A panic caught inside a handler future, surfaced as an `Exception` fault.
#[derive(Debug, thiserror::Error)]
#[error("handler panicked: {message}")]
pub struct PanicError {
    message: String,
}

impl PanicError {
    /// Extracts the message from a panic payload (`&str` or `String`).
    pub fn from_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(s) => *s,
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(s) => (*s).to_string(),
                Err(_) => "<non-string panic payload>".to_string(),
            },
        };
        Self { message }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// DispatchError は dispatch 層のエラー
///
/// `NoHandlerFound` は send の入口で Response に変換されます。
/// それ以外は設定ミスなので呼び出し側へそのまま伝播します。
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("no handler found for request '{request}'")]
    NoHandlerFound { request: &'static str },

    #[error("failed to activate the handler '{handler}'")]
    HandlerActivationFailed {
        handler: &'static str,
        #[source]
        source: Option<BoxError>,
    },

    #[error("'{name}' is not a handler")]
    NotAHandler { name: String },
}

impl DispatchError {
    pub(crate) fn activation(handler: &'static str, source: Option<BoxError>) -> Self {
        Self::HandlerActivationFailed { handler, source }
    }
}

/// Display wrapper for logging a fault together with its source chain.
pub(crate) struct Chain<'a>(pub &'a (dyn StdError + 'static));

impl fmt::Display for Chain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(cause) = source {
            write!(f, ": {cause}")?;
            source = cause.source();
        }
        Ok(())
    }
}
