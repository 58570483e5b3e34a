//! herald-core
//!
//! In-process request dispatch: typed commands and queries are routed to
//! the single handler type that fits them.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（request, envelope, outcome, response, errors, ambient, scope）
//! - **typed**: 型付き Handler API（Handler trait, HandlerType, predicate, Registry）
//! - **app**: 入口（Mediator, MediatorBuilder）
//!
//! # 流れ
//! 1. `submit_handler!` で handler 型をリンク時のカタログに載せる
//! 2. `Mediator::send*` が Envelope を作り、scope 内の候補から predicate で 1 つ選ぶ
//! 3. activator が handler を作り、handler の Outcome が Response になって返る

pub mod app;
pub mod domain;
pub mod typed;

#[doc(hidden)]
pub use inventory;

pub use self::app::{BuildError, Mediator, MediatorBuilder, MediatorConfig};
pub use self::domain::{
    Ambient, BoxError, Command, CommandResponse, DataOf, DispatchError, Envelope, ErrorKind,
    ErrorResult, Flags, Outcome, Query, QueryResponse, Request, RequestId, Response, Scope,
};
pub use self::typed::{Activator, Flag, Handler, HandlerType, Predicates, SelectionPredicate};
