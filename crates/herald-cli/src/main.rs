use std::any::TypeId;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use herald_core::typed::Instance;
use herald_core::{
    BoxError, CommandResponse, Envelope, Handler, Mediator, Outcome, QueryResponse, Request,
    Response, entry_scope, submit_handler,
};

// ── requests ────────────────────────────────────────────────────────────────

struct GetHelloWorld;

impl Request for GetHelloWorld {
    const NAME: &'static str = "sample.hello_world.get";
    type Arguments = ();
    type Response = QueryResponse<String>;
}

struct SetMessage;

impl Request for SetMessage {
    const NAME: &'static str = "sample.message.set";
    type Arguments = String;
    type Response = CommandResponse;
}

struct GetMessage;

impl Request for GetMessage {
    const NAME: &'static str = "sample.message.get";
    type Arguments = ();
    type Response = QueryResponse<String>;
}

// ── handlers ────────────────────────────────────────────────────────────────

#[derive(Default)]
struct GetHelloWorldHandler;

#[async_trait]
impl Handler for GetHelloWorldHandler {
    type Request = GetHelloWorld;

    async fn handle(
        &self,
        _request: &Envelope<GetHelloWorld>,
        cancel: &CancellationToken,
    ) -> Result<Outcome<String>, BoxError> {
        tokio::select! {
            _ = sleep(Duration::from_millis(200)) => Ok(Outcome::data("Hello, World!".to_string())),
            _ = cancel.cancelled() => Ok(Outcome::cancelled()),
        }
    }
}

submit_handler!(GetHelloWorldHandler, default);

/// 共有されるメッセージ置き場（セッションの代わり）
type MessageStore = Arc<RwLock<Option<String>>>;

struct SetMessageHandler {
    store: MessageStore,
}

#[async_trait]
impl Handler for SetMessageHandler {
    type Request = SetMessage;

    async fn handle(
        &self,
        request: &Envelope<SetMessage>,
        _cancel: &CancellationToken,
    ) -> Result<Outcome, BoxError> {
        if request.arguments().trim().is_empty() {
            return Ok(Outcome::failed("message must not be blank"));
        }
        *self.store.write().await = Some(request.arguments().clone());
        Ok(Outcome::ok())
    }
}

submit_handler!(SetMessageHandler);

struct GetMessageHandler {
    store: MessageStore,
}

#[async_trait]
impl Handler for GetMessageHandler {
    type Request = GetMessage;

    async fn handle(
        &self,
        _request: &Envelope<GetMessage>,
        _cancel: &CancellationToken,
    ) -> Result<Outcome<String>, BoxError> {
        let message = self.store.read().await.clone();
        Ok(Outcome::data(message.unwrap_or_default()))
    }
}

submit_handler!(GetMessageHandler);

// ── wiring ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Report<'a, T: Serialize> {
    request: &'static str,
    response: &'a T,
}

fn print_report<R>(response: &R::Response) -> Result<(), BoxError>
where
    R: Request,
    R::Response: Serialize,
{
    let report = Report {
        request: R::NAME,
        response,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // (A) handler が必要とする依存を activator で渡す
    let store: MessageStore = Arc::new(RwLock::new(None));
    let mediator = Mediator::builder()
        .entry_scope(entry_scope!())
        .activate_with(move |ty| {
            let instance: Instance = if ty.handler_type_id() == TypeId::of::<SetMessageHandler>() {
                Box::new(SetMessageHandler { store: Arc::clone(&store) })
            } else if ty.handler_type_id() == TypeId::of::<GetMessageHandler>() {
                Box::new(GetMessageHandler { store: Arc::clone(&store) })
            } else {
                return Ok(ty.construct_default());
            };
            Ok(Some(instance))
        })
        .expect_request::<GetHelloWorld>()
        .expect_request::<SetMessage>()
        .expect_request::<GetMessage>()
        .build()?;

    let cancel = CancellationToken::new();

    // (B) 引数なしの query
    let hello = mediator.send::<GetHelloWorld>(&cancel).await?;
    print_report::<GetHelloWorld>(&hello)?;

    // (C) 引数つきの command → query
    let message = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "hello from herald".to_string());
    let set = SetMessage::send(&mediator, message, &cancel).await?;
    print_report::<SetMessage>(&set)?;

    let get = mediator.send::<GetMessage>(&cancel).await?;
    print_report::<GetMessage>(&get)?;

    // (D) 失敗も Response として返る
    let blank = SetMessage::send(&mediator, "   ".to_string(), &cancel).await?;
    print_report::<SetMessage>(&blank)?;

    // (E) cancel 済みの token では handler は呼ばれない
    cancel.cancel();
    let cancelled = mediator.send::<GetHelloWorld>(&cancel).await?;
    print_report::<GetHelloWorld>(&cancelled)?;

    info!(
        success = hello.is_success() && set.is_success() && get.is_success(),
        "sample finished"
    );
    Ok(())
}
