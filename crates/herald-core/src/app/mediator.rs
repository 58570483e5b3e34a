//! Mediator - Request を handler に届ける入口
//!
//! # 学習ポイント
//! - `ArcSwap` による lock-free な設定の差し替え（読み手は snapshot を持つ）
//! - `tracing::Instrument` で dispatch ごとに span を付ける
//! - `NoHandlerFound` だけを入口で Response に変換する
//!
//! # 使用例
//! ```ignore
//! let mediator = Mediator::builder().entry_scope(entry_scope!()).build()?;
//!
//! let answer = mediator.send::<GetAnswer>(&CancellationToken::new()).await?;
//! assert_eq!(answer.into_result()?, 42);
//! ```

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, debug_span, info};

use super::builder::MediatorBuilder;
use crate::domain::{Ambient, DispatchError, Envelope, Outcome, Request, Response, Scope};
use crate::typed::{Activator, HandlerType, Registry, RequestType, find_by_name};

/// Settings that [`Mediator::configure`] swaps in as a whole.
///
/// The default searches only the crate that declares each request. A host
/// whose handlers live in its own crate, for requests declared elsewhere,
/// sets `entry_scope: Some(entry_scope!())` or lists `scopes`.
///
/// ```ignore
/// let mediator = Mediator::new(MediatorConfig {
///     entry_scope: Some(entry_scope!()),
///     ..MediatorConfig::default()
/// });
/// ```
#[derive(Debug, Clone, Default)]
pub struct MediatorConfig {
    /// Module-path prefixes to search. Empty means the request's crate plus
    /// `entry_scope`.
    pub scopes: Vec<Scope>,
    /// Usually `Some(entry_scope!())`; `None` leaves the host crate unsearched.
    pub entry_scope: Option<Scope>,
    pub activator: Activator,
}

impl MediatorConfig {
    fn into_registry(self) -> Registry {
        Registry::new(self.scopes, self.entry_scope, self.activator)
    }
}

/// Mediator は handler の解決と dispatch を担う共有ハンドル
///
/// Clone は安価で、すべての clone が同じ設定とキャッシュを共有します。
#[derive(Clone)]
pub struct Mediator {
    inner: Arc<Inner>,
}

struct Inner {
    registry: ArcSwap<Registry>,
    ambient: Ambient,
}

impl Mediator {
    /// Creates a mediator with an empty [`Ambient`].
    ///
    /// Without `scopes` or an `entry_scope` in `config`, handlers outside the
    /// request's own crate are not found; see [`MediatorConfig`].
    pub fn new(config: MediatorConfig) -> Self {
        Self::with_ambient(config, Ambient::new())
    }

    pub fn with_ambient(config: MediatorConfig, ambient: Ambient) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: ArcSwap::from_pointee(config.into_registry()),
                ambient,
            }),
        }
    }

    pub fn builder() -> MediatorBuilder {
        MediatorBuilder::new()
    }

    /// State read by selection predicates.
    pub fn ambient(&self) -> &Ambient {
        &self.inner.ambient
    }

    /// Snapshot of the current registry state.
    pub fn registry(&self) -> Arc<Registry> {
        self.inner.registry.load_full()
    }

    /// Replaces scopes and activator, dropping every cached candidate list.
    ///
    /// Dispatches already in flight finish with the state they loaded.
    pub fn configure(&self, config: MediatorConfig) {
        info!(
            scopes = ?config.scopes.iter().map(Scope::as_str).collect::<Vec<_>>(),
            entry_scope = ?config.entry_scope.as_ref().map(Scope::as_str),
            "mediator reconfigured"
        );
        self.inner.registry.store(Arc::new(config.into_registry()));
    }

    /// Adds a handler type for its request type without scanning.
    ///
    /// # Errors
    ///
    /// `NotAHandler` when the handler type does not expose its request type.
    pub fn register(&self, handler_type: HandlerType) -> Result<(), DispatchError> {
        self.inner.registry.load().register(handler_type)
    }

    /// Registers a handler type submitted with `submit_handler!`, by full
    /// type name or unique `::`-suffix.
    ///
    /// # Errors
    ///
    /// `NotAHandler` when no submitted handler type has that name.
    pub fn register_by_name(&self, name: &str) -> Result<(), DispatchError> {
        let handler_type = find_by_name(name).ok_or_else(|| DispatchError::NotAHandler {
            name: name.to_string(),
        })?;
        self.register(handler_type)
    }

    /// Sends an argument-less request.
    pub async fn send<R>(&self, cancel: &CancellationToken) -> Result<R::Response, DispatchError>
    where
        R: Request<Arguments = ()>,
    {
        self.send_with::<R>((), cancel).await
    }

    /// Sends a request with arguments.
    ///
    /// A missing handler is reported inside the response as
    /// `ErrorResult::NoHandler`; activation failures are returned as `Err`.
    pub async fn send_with<R: Request>(
        &self,
        arguments: R::Arguments,
        cancel: &CancellationToken,
    ) -> Result<R::Response, DispatchError> {
        match self.dispatch(Envelope::<R>::new(arguments), cancel).await {
            Err(DispatchError::NoHandlerFound { request }) => {
                debug!(request, "answering with NoHandler");
                Ok(<R::Response as Response>::from_outcome(Outcome::no_handler()))
            }
            other => other,
        }
    }

    /// Selects, activates and invokes the handler for `envelope`.
    ///
    /// # Errors
    ///
    /// `NoHandlerFound` or `HandlerActivationFailed`; handler faults are
    /// already part of the response.
    pub async fn dispatch<R: Request>(
        &self,
        envelope: Envelope<R>,
        cancel: &CancellationToken,
    ) -> Result<R::Response, DispatchError> {
        let span = debug_span!("dispatch", request = R::NAME, request_id = %envelope.id());

        async move {
            let registry = self.registry();
            let handler_type = registry.select_handler(RequestType::of::<R>(), self.ambient())?;
            let handler = registry.activate::<R>(&handler_type)?;
            drop(registry);

            debug!(handler = handler_type.name(), "invoking handler");
            Ok::<_, DispatchError>(handler.handle(envelope, cancel).await)
        }
        .instrument(span)
        .await
    }
}

impl std::fmt::Debug for Mediator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mediator")
            .field("registry", &self.inner.registry.load())
            .field("ambient", &self.inner.ambient)
            .finish()
    }
}
