//! Response model - 呼び出し側に返る結果
//!
//! Response は dispatch 層が Outcome から 1 回だけ構築し、以後は不変です。
//! 呼び出し側はガードなしで `is_success()` / `error()` を確認できます。
//!
//! # 形
//! - [`CommandResponse`]: データを持たない（成功した Outcome を公開する）
//! - [`QueryResponse<T>`]: 成功時にデータ `T` を持つ

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use super::errors::ErrorResult;
use super::outcome::Outcome;

/// Response は Request 型ごとに 1 つに決まる応答の形
///
/// `from_outcome` は dispatch 層（handler の共通ロジックと send の入口）
/// だけが呼び出します。
pub trait Response: Send + Sized + 'static {
    /// 成功時のデータ型（command は `()`）
    type Data: Send + 'static;

    fn from_outcome(outcome: Outcome<Self::Data>) -> Self;

    fn is_success(&self) -> bool;

    fn error(&self) -> Option<&ErrorResult>;

    /// Fails with the carried error when the response is unsuccessful.
    fn ensure_success(&self) -> Result<(), ErrorResult> {
        match self.error() {
            None => Ok(()),
            Some(e) => Err(e.clone()),
        }
    }
}

/// Response of a command: success or an error, never data.
#[derive(Debug, Clone)]
pub struct CommandResponse {
    outcome: Outcome,
}

impl CommandResponse {
    /// The successful outcome, `None` when the command failed.
    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.is_ok().then_some(&self.outcome)
    }
}

impl Response for CommandResponse {
    type Data = ();

    fn from_outcome(outcome: Outcome) -> Self {
        Self { outcome }
    }

    fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    fn error(&self) -> Option<&ErrorResult> {
        self.outcome.error_result()
    }
}

/// Response of a query: data on success, an error otherwise.
#[derive(Debug, Clone)]
pub struct QueryResponse<T> {
    outcome: Outcome<T>,
}

impl<T> QueryResponse<T> {
    /// The returned data, `None` when the query failed.
    pub fn result(&self) -> Option<&T> {
        match &self.outcome {
            Outcome::Ok(data) => Some(data),
            Outcome::Error(_) => None,
        }
    }

    /// Takes the data out of the response.
    ///
    /// # Errors
    ///
    /// Returns the carried [`ErrorResult`] when the query was not successful.
    pub fn into_result(self) -> Result<T, ErrorResult> {
        self.outcome.into_result()
    }

    pub fn into_outcome(self) -> Outcome<T> {
        self.outcome
    }
}

impl<T: Send + 'static> Response for QueryResponse<T> {
    type Data = T;

    fn from_outcome(outcome: Outcome<T>) -> Self {
        Self { outcome }
    }

    fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    fn error(&self) -> Option<&ErrorResult> {
        self.outcome.error_result()
    }
}

impl Serialize for CommandResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("CommandResponse", 2)?;
        state.serialize_field("is_success", &self.is_success())?;
        state.serialize_field("error", &self.outcome.error_result())?;
        state.end()
    }
}

impl<T: Serialize> Serialize for QueryResponse<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("QueryResponse", 3)?;
        state.serialize_field("is_success", &self.outcome.is_ok())?;
        state.serialize_field("data", &self.result())?;
        state.serialize_field("error", &self.outcome.error_result())?;
        state.end()
    }
}
