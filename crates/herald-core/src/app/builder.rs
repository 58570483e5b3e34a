//! MediatorBuilder - Mediator の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 開発体験の改善（明確なエラーメッセージ）

use crate::domain::{Ambient, DispatchError, Request, Scope};
use crate::typed::{Activator, HandlerType, Instance, RequestType, find_by_name};

use super::mediator::{Mediator, MediatorConfig};

/// MediatorBuilder は Mediator を構築
///
/// # 使用例
/// ```ignore
/// let mediator = MediatorBuilder::new()
///     .entry_scope(entry_scope!())
///     .ambient(Flags::new(["beta"]))
///     .register(HandlerType::with_default::<PlaceOrderHandler>())
///     .expect_request::<PlaceOrder>()
///     .expect_request::<GetOrder>()
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - expect_request() で handler が必須の Request 型を登録
/// - build() 時に各 Request 型の候補 handler を解決する
/// - 候補が 1 つもなければ BuildError を返す
pub struct MediatorBuilder {
    config: MediatorConfig,
    ambient: Ambient,
    registrations: Vec<HandlerType>,
    named: Vec<String>,
    expected: Vec<RequestType>,
}

/// BuildError は Mediator 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing handlers for requests: {0:?}. These requests were expected but no handler type was found.")]
    MissingHandlers(Vec<&'static str>),

    #[error("handler registration failed")]
    Registration(#[from] DispatchError),
}

impl MediatorBuilder {
    /// 新しい MediatorBuilder を作成
    pub fn new() -> Self {
        Self {
            config: MediatorConfig::default(),
            ambient: Ambient::new(),
            registrations: Vec::new(),
            named: Vec::new(),
            expected: Vec::new(),
        }
    }

    /// 探索する scope を追加（追加した順に探索）
    pub fn scope(mut self, scope: impl Into<Scope>) -> Self {
        self.config.scopes.push(scope.into());
        self
    }

    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Scope>,
    {
        self.config.scopes.extend(scopes.into_iter().map(Into::into));
        self
    }

    /// scope を設定しなかったときに Request の crate と並んで探索される scope
    pub fn entry_scope(mut self, scope: impl Into<Scope>) -> Self {
        self.config.entry_scope = Some(scope.into());
        self
    }

    pub fn activator(mut self, activator: Activator) -> Self {
        self.config.activator = activator;
        self
    }

    /// Closure 版の [`activator`](Self::activator)
    pub fn activate_with<F>(self, activate: F) -> Self
    where
        F: Fn(&HandlerType) -> Result<Option<Instance>, crate::domain::BoxError>
            + Send
            + Sync
            + 'static,
    {
        self.activator(Activator::new(activate))
    }

    /// selection predicate が読む ambient 値を設定
    pub fn ambient<T: Send + Sync + 'static>(self, value: T) -> Self {
        self.ambient.insert(value);
        self
    }

    /// Handler 型を scan なしで登録
    pub fn register(mut self, handler_type: HandlerType) -> Self {
        self.registrations.push(handler_type);
        self
    }

    /// `submit_handler!` 済みの handler 型を名前で登録（build() 時に解決）
    pub fn register_by_name(mut self, name: impl Into<String>) -> Self {
        self.named.push(name.into());
        self
    }

    /// handler が必須の Request 型を追加
    pub fn expect_request<R: Request>(mut self) -> Self {
        self.expected.push(RequestType::of::<R>());
        self
    }

    /// MediatorBuilder を構築して Mediator を生成
    ///
    /// # 検証
    /// - 名前で登録した handler 型がカタログにあるかチェック
    /// - expect_request() の Request 型に候補 handler があるかチェック
    ///   （解決結果はそのままキャッシュに残る）
    pub fn build(self) -> Result<Mediator, BuildError> {
        let mediator = Mediator::with_ambient(self.config, self.ambient);

        for handler_type in self.registrations {
            mediator.register(handler_type)?;
        }
        for name in &self.named {
            let handler_type = find_by_name(name)
                .ok_or_else(|| DispatchError::NotAHandler { name: name.clone() })?;
            mediator.register(handler_type)?;
        }

        let registry = mediator.registry();
        let missing: Vec<&'static str> = self
            .expected
            .iter()
            .filter(|request| registry.resolve_candidates(**request).is_empty())
            .map(RequestType::name)
            .collect();
        if !missing.is_empty() {
            return Err(BuildError::MissingHandlers(missing));
        }

        Ok(mediator)
    }
}

impl Default for MediatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BoxError, CommandResponse, Envelope, Flags, Outcome, QueryResponse, Response};
    use crate::typed::{Flag, Handler, Predicates};
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    struct Ship;

    impl Request for Ship {
        const NAME: &'static str = "test.ship";
        type Arguments = ();
        type Response = CommandResponse;
    }

    struct Track;

    impl Request for Track {
        const NAME: &'static str = "test.track";
        type Arguments = ();
        type Response = QueryResponse<String>;
    }

    #[derive(Default)]
    struct ShipHandler;

    #[async_trait]
    impl Handler for ShipHandler {
        type Request = Ship;

        async fn handle(
            &self,
            _request: &Envelope<Ship>,
            _cancel: &CancellationToken,
        ) -> Result<Outcome, BoxError> {
            Ok(Outcome::ok())
        }

        fn predicates() -> Predicates {
            vec![Box::new(Flag::new("shipping"))]
        }
    }

    #[derive(Default)]
    struct ExpressShipHandler;

    #[async_trait]
    impl Handler for ExpressShipHandler {
        type Request = Ship;

        async fn handle(
            &self,
            _request: &Envelope<Ship>,
            _cancel: &CancellationToken,
        ) -> Result<Outcome, BoxError> {
            Ok(Outcome::failed("express lane closed"))
        }
    }

    crate::submit_handler!(ExpressShipHandler, default);

    #[test]
    fn test_build_success() {
        let mediator = MediatorBuilder::new()
            .register(HandlerType::with_default::<ShipHandler>())
            .expect_request::<Ship>()
            .build();
        assert!(mediator.is_ok());
    }

    #[test]
    fn test_build_missing_handlers() {
        let mediator = MediatorBuilder::new()
            .register(HandlerType::with_default::<ShipHandler>())
            .expect_request::<Ship>()
            .expect_request::<Track>()
            .build();
        assert!(matches!(
            mediator,
            Err(BuildError::MissingHandlers(missing)) if missing == vec![Track::NAME]
        ));
    }

    #[test]
    fn test_build_no_expect_requests() {
        let mediator = MediatorBuilder::new().build();
        assert!(mediator.is_ok());
    }

    #[test]
    fn test_build_unknown_name() {
        let mediator = MediatorBuilder::new()
            .register_by_name("NoSuchShipHandler")
            .build();
        assert!(matches!(
            mediator,
            Err(BuildError::Registration(DispatchError::NotAHandler { .. }))
        ));
    }

    #[test]
    fn test_expected_requests_are_warmed_up() {
        let mediator = MediatorBuilder::new()
            .scope("herald_core::app::builder")
            .expect_request::<Ship>()
            .build()
            .unwrap();

        let registry = mediator.registry();
        assert_eq!(registry.scan_count(), 1);
        assert_eq!(registry.cached_request_types(), vec![RequestType::of::<Ship>()]);
        assert_eq!(registry.scopes(), [Scope::new("herald_core::app::builder")]);
    }

    #[tokio::test]
    async fn test_ambient_values_reach_predicates() {
        let mediator = MediatorBuilder::new()
            .ambient(Flags::new(["shipping"]))
            .register(HandlerType::with_default::<ShipHandler>())
            .register_by_name("builder::tests::ExpressShipHandler")
            .build()
            .unwrap();

        let response = mediator.send::<Ship>(&CancellationToken::new()).await.unwrap();
        assert!(response.is_success());

        mediator.ambient().remove::<Flags>();
        let response = mediator.send::<Ship>(&CancellationToken::new()).await.unwrap();
        assert_eq!(response.error().unwrap().message(), "express lane closed");
    }

    #[tokio::test]
    async fn test_custom_activator_is_used() {
        let mediator = MediatorBuilder::new()
            .activate_with(|_| Ok(None))
            .register(HandlerType::with_default::<ShipHandler>())
            .ambient(Flags::new(["shipping"]))
            .build()
            .unwrap();

        let error = mediator.send::<Ship>(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(error, DispatchError::HandlerActivationFailed { .. }));
    }
}
