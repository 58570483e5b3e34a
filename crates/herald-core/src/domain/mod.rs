//! Domain model (requests, envelopes, outcomes, responses, errors, ...).
//!
//! - request / envelope / ids: 「何をするか」と送信される値
//! - outcome / response: handler の結果と呼び出し側に返る形
//! - errors: ErrorResult（応答データ）と DispatchError（設定ミス）
//! - ambient / scope: handler 選択と探索の入力

pub mod ambient;
pub mod envelope;
pub mod errors;
pub mod ids;
pub mod outcome;
pub mod request;
pub mod response;
pub mod scope;

pub use self::ambient::{Ambient, Flags};
pub use self::envelope::Envelope;
pub use self::errors::{BoxError, DispatchError, ErrorKind, ErrorResult, Fault, PanicError};
pub use self::ids::RequestId;
pub use self::outcome::Outcome;
pub use self::request::{Command, DataOf, Query, Request};
pub use self::response::{CommandResponse, QueryResponse, Response};
pub use self::scope::Scope;
