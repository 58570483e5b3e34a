//! Request trait - 型付き Request の定義
//!
//! # 学習ポイント
//! - Associated Constants (`const NAME`)
//! - Associated Types で Request と Response の形を 1:1 に固定する
//! - Blanket impl による「種類」の表現（[`Command`] / [`Query`]）

use std::future::Future;

use tokio_util::sync::CancellationToken;

use super::errors::DispatchError;
use super::response::{CommandResponse, QueryResponse, Response};
use crate::app::Mediator;

/// Request は「何をするか」を型レベルで表す
///
/// 実装する型はマーカーで、値は持ちません。送信時の値は
/// [`Envelope`](super::Envelope) として毎回新しく作られます。
///
/// # 使用例
/// ```ignore
/// struct GetAnswer;
///
/// impl Request for GetAnswer {
///     const NAME: &'static str = "demo.answer.get";
///     type Arguments = ();
///     type Response = QueryResponse<i32>;
/// }
///
/// let response = mediator.send::<GetAnswer>(&CancellationToken::new()).await?;
/// ```
///
/// # 種類
/// - `Response = CommandResponse` なら command（データを返さない）
/// - `Response = QueryResponse<T>` なら query（成功時に `T` を返す）
/// - `Arguments = ()` なら引数なし、それ以外は引数 1 つを運ぶ
pub trait Request: Sized + 'static {
    /// Name used in logs and error messages.
    const NAME: &'static str;

    /// Payload carried by the request value. `()` for argument-less requests.
    type Arguments: Send + Sync + 'static;

    /// The single response shape this request produces.
    type Response: Response;

    /// Sends a request of this type through `mediator`.
    ///
    /// A missing handler is reported inside the response; only activation
    /// failures come back as `Err`.
    fn send<'a>(
        mediator: &'a Mediator,
        arguments: Self::Arguments,
        cancel: &'a CancellationToken,
    ) -> impl Future<Output = Result<Self::Response, DispatchError>> + Send + 'a {
        mediator.send_with::<Self>(arguments, cancel)
    }
}

/// Data type a request's handler produces on success.
pub type DataOf<R> = <<R as Request>::Response as Response>::Data;

/// A request that performs an effect and returns no data.
pub trait Command: Request<Response = CommandResponse> {}

impl<R: Request<Response = CommandResponse>> Command for R {}

/// A request that returns data of type `T` on success.
pub trait Query<T>: Request<Response = QueryResponse<T>> {}

impl<T, R: Request<Response = QueryResponse<T>>> Query<T> for R {}
