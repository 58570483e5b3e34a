//! Handler trait - Request を処理する Handler の定義
//!
//! # 学習ポイント
//! - 関連型で「handler 1 つにつき Request 1 つ」を表す (`Handler::Request`)
//! - Object-safe trait (`Handle<R>`)
//! - Type erasure パターン (`TypedHandler<H>` → `dyn Handle<R>`)
//!
//! # 二層構造
//! - **表層**: [`Handler`] - ユーザーが実装する。`Outcome` を返すだけ
//! - **内部**: [`Handle`] - dispatch が呼ぶ完全な契約。Response を返す
//!
//! [`TypedHandler`] が表層を内部へ変換し、共通ポリシーを適用します。
//! 1. token がすでに cancel 済みなら user method を呼ばずに `Cancelled`
//! 2. user method の `Ok(outcome)` はそのまま使う
//! 3. `Err(fault)` や panic は `Exception` に変換する
//! 4. Outcome を Request の Response に包む

use std::any::type_name;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::predicate::Predicates;
use crate::domain::errors::Chain;
use crate::domain::{BoxError, DataOf, Envelope, ErrorResult, Outcome, PanicError, Request, Response};

/// Handler は Request を処理して Outcome を返す
///
/// # 使用例
/// ```ignore
/// struct GetAnswerHandler;
///
/// #[async_trait]
/// impl Handler for GetAnswerHandler {
///     type Request = GetAnswer;
///
///     async fn handle(
///         &self,
///         _request: &Envelope<GetAnswer>,
///         _cancel: &CancellationToken,
///     ) -> Result<Outcome<i32>, BoxError> {
///         Ok(Outcome::data(42))
///     }
/// }
/// ```
///
/// command の handler は `Outcome<()>`、query の handler は `Outcome<T>` を返します。
/// `Err` はそのまま `ErrorResult::Exception` になるので、`?` で早期リターンできます。
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    type Request: Request;

    async fn handle(
        &self,
        request: &Envelope<Self::Request>,
        cancel: &CancellationToken,
    ) -> Result<Outcome<DataOf<Self::Request>>, BoxError>;

    /// Selection predicates attached to this handler type.
    ///
    /// Evaluated on every selection, so they always see the current ambient state.
    fn predicates() -> Predicates
    where
        Self: Sized,
    {
        Vec::new()
    }
}

/// Handle は object-safe な完全な handler 契約
///
/// Request と cancel token を受け取り、Response を返します。
/// 実装は panic も含めて fault を外に漏らしてはいけません。
#[async_trait]
pub trait Handle<R: Request>: Send + Sync {
    async fn handle(&self, request: Envelope<R>, cancel: &CancellationToken) -> R::Response;
}

/// `Handler` を `Handle<H::Request>` に変換するアダプタ
pub struct TypedHandler<H: Handler> {
    handler: H,
}

impl<H: Handler> TypedHandler<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }

    pub fn inner(&self) -> &H {
        &self.handler
    }
}

#[async_trait]
impl<H: Handler> Handle<H::Request> for TypedHandler<H> {
    async fn handle(
        &self,
        request: Envelope<H::Request>,
        cancel: &CancellationToken,
    ) -> <H::Request as Request>::Response {
        let outcome = guarded::<H::Request, _, _>(type_name::<H>(), cancel, || {
            self.handler.handle(&request, cancel)
        })
        .await;
        <<H::Request as Request>::Response as Response>::from_outcome(outcome)
    }
}

/// 共通ポリシー: cancel 確認 → user logic → fault/panic の変換
async fn guarded<R, F, Fut>(
    handler: &'static str,
    cancel: &CancellationToken,
    user_logic: F,
) -> Outcome<DataOf<R>>
where
    R: Request,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Outcome<DataOf<R>>, BoxError>>,
{
    if cancel.is_cancelled() {
        debug!(request = R::NAME, handler, "request cancelled before invocation");
        return Outcome::cancelled();
    }

    match AssertUnwindSafe(async move { user_logic().await })
        .catch_unwind()
        .await
    {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(fault)) => {
            warn!(request = R::NAME, handler, error = %Chain(fault.as_ref()), "handler returned a fault");
            Outcome::Error(ErrorResult::exception(fault))
        }
        Err(payload) => {
            let panic = PanicError::from_payload(payload);
            warn!(request = R::NAME, handler, error = %panic, "handler panicked");
            Outcome::exception(panic)
        }
    }
}
