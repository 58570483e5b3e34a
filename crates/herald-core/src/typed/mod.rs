//! Typed - 型付き Handler API と handler 型の解決
//!
//! # 二層構造
//! - **表層（Typed）**: `Handler` trait - ユーザーが実装する
//! - **内部（Dyn）**: `Handle<R>` trait - object-safe, type erasure
//!
//! handler 型は `submit_handler!` でリンク時のカタログに載り、
//! [`Registry`] が scope で絞り込み、predicate で 1 つ選び、activator で作ります。

pub mod descriptor;
pub mod handler;
pub mod predicate;
pub mod registry;

// 主要な trait/型 を再エクスポート
pub use self::descriptor::{
    HandlerDescriptor, HandlerEntry, HandlerType, Instance, RequestType, catalogue, erased,
    find_by_name,
};
pub use self::handler::{Handle, Handler, TypedHandler};
pub use self::predicate::{Flag, FnPredicate, Predicates, SelectionPredicate, all_match, from_fn};
pub use self::registry::{Activator, Registry};
