//! Registry - handler type の解決・選択・activate
//!
//! # 学習ポイント
//! - `DashMap::entry().or_insert_with()` で「request 型ごとに scan は最大 1 回」
//! - predicate の数による順位付け（具体的な handler ほど優先）
//! - activator の失敗（Err / None / 型違い / panic）を 1 つのエラーにまとめる
//!
//! # 状態
//! Registry は 1 つの設定（scope, entry scope, activator）と、それに対応する
//! request 型 → handler 型リストのキャッシュを持ちます。再設定は新しい
//! Registry を作って丸ごと差し替えます（[`Mediator::configure`](crate::app::Mediator::configure)）。
//! そのため古いキャッシュが新しい設定に混ざることはありません。

use std::cmp::Reverse;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use tracing::{debug, trace, warn};

use super::descriptor::{HandlerType, Instance, RequestType, catalogue};
use super::handler::Handle;
use super::predicate::all_match;
use crate::domain::errors::Chain;
use crate::domain::{Ambient, BoxError, DispatchError, PanicError, Request, Scope};

type ActivateFn = dyn Fn(&HandlerType) -> Result<Option<Instance>, BoxError> + Send + Sync;

/// Activator は handler 型から新しい handler インスタンスを作る
///
/// 返せるのは解決された handler 型そのもの、または同じ Request を処理する
/// 任意の handler を [`erased`](super::descriptor::erased) で包んだものです。
/// `Ok(None)` は「作れなかった」を意味し、dispatch は
/// `HandlerActivationFailed` になります。
///
/// # 使用例
/// ```ignore
/// let db = pool.clone();
/// let activator = Activator::new(move |ty| {
///     if ty.handler_type_id() == TypeId::of::<SaveOrderHandler>() {
///         return Ok(Some(Box::new(SaveOrderHandler::new(db.clone()))));
///     }
///     Ok(ty.construct_default())
/// });
/// ```
#[derive(Clone)]
pub struct Activator(Arc<ActivateFn>);

impl Activator {
    pub fn new<F>(activate: F) -> Self
    where
        F: Fn(&HandlerType) -> Result<Option<Instance>, BoxError> + Send + Sync + 'static,
    {
        Self(Arc::new(activate))
    }

    /// Constructs handlers through the default constructor declared with
    /// `submit_handler!(H, default)` or [`HandlerType::with_default`].
    pub fn default_constructor() -> Self {
        Self::new(|ty| Ok(ty.construct_default()))
    }

    pub fn activate(&self, handler_type: &HandlerType) -> Result<Option<Instance>, BoxError> {
        (self.0)(handler_type)
    }
}

impl Default for Activator {
    fn default() -> Self {
        Self::default_constructor()
    }
}

impl fmt::Debug for Activator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Activator(..)")
    }
}

/// Registry は 1 つの設定に対する handler 型の解決状態
pub struct Registry {
    scopes: Vec<Scope>,
    entry_scope: Option<Scope>,
    activator: Activator,
    handler_types: DashMap<RequestType, Vec<HandlerType>>,
    scans: AtomicUsize,
}

impl Registry {
    pub fn new(scopes: Vec<Scope>, entry_scope: Option<Scope>, activator: Activator) -> Self {
        Self {
            scopes,
            entry_scope,
            activator,
            handler_types: DashMap::new(),
            scans: AtomicUsize::new(0),
        }
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    pub fn entry_scope(&self) -> Option<&Scope> {
        self.entry_scope.as_ref()
    }

    /// Number of catalogue scans performed so far.
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::Relaxed)
    }

    /// Request types with a cached (scanned or registered) handler list.
    pub fn cached_request_types(&self) -> Vec<RequestType> {
        self.handler_types.iter().map(|entry| *entry.key()).collect()
    }

    /// Handler types registered for or discovered for `request`.
    ///
    /// The first call per request type scans the catalogue; later calls and
    /// pre-registered request types are served from the cache.
    pub fn resolve_candidates(&self, request: RequestType) -> Vec<HandlerType> {
        if let Some(cached) = self.handler_types.get(&request) {
            trace!(request = request.name(), count = cached.len(), "handler types served from cache");
            return cached.value().clone();
        }
        self.handler_types
            .entry(request)
            .or_insert_with(|| self.scan(request))
            .value()
            .clone()
    }

    /// Picks the most specific candidate whose predicates all hold.
    ///
    /// Candidates are ranked by predicate count (descending), then by handler
    /// type name, so equally specific matches resolve the same way every time.
    /// A candidate whose predicates panic, while being built or evaluated, is
    /// not eligible.
    pub fn select_handler(
        &self,
        request: RequestType,
        ambient: &Ambient,
    ) -> Result<HandlerType, DispatchError> {
        let mut ranked: Vec<_> = self
            .resolve_candidates(request)
            .into_iter()
            .filter_map(|ty| match catch_unwind(AssertUnwindSafe(|| ty.predicates())) {
                Ok(predicates) => Some((ty, predicates)),
                Err(payload) => {
                    let panic = PanicError::from_payload(payload);
                    warn!(handler = ty.name(), error = %panic, "building predicates panicked");
                    None
                }
            })
            .collect();
        ranked.sort_by_key(|(ty, predicates)| (Reverse(predicates.len()), ty.name()));

        let selected = ranked
            .into_iter()
            .find(|(ty, predicates)| {
                catch_unwind(AssertUnwindSafe(|| all_match(predicates, ambient))).unwrap_or_else(
                    |payload| {
                        let panic = PanicError::from_payload(payload);
                        warn!(handler = ty.name(), error = %panic, "predicate panicked");
                        false
                    },
                )
            })
            .map(|(ty, _)| ty);

        match selected {
            Some(ty) => {
                debug!(request = request.name(), handler = ty.name(), "handler selected");
                Ok(ty)
            }
            None => {
                debug!(request = request.name(), "no eligible handler");
                Err(DispatchError::NoHandlerFound {
                    request: request.name(),
                })
            }
        }
    }

    /// Creates a fresh handler instance for one dispatch of `R`.
    ///
    /// # Errors
    ///
    /// `HandlerActivationFailed` when the activator fails, panics, returns
    /// nothing, or returns an object that is not `handler_type`.
    pub fn activate<R: Request>(
        &self,
        handler_type: &HandlerType,
    ) -> Result<Box<dyn Handle<R>>, DispatchError> {
        let handler = handler_type.name();
        let activated = catch_unwind(AssertUnwindSafe(|| self.activator.activate(handler_type)))
            .unwrap_or_else(|payload| Err(PanicError::from_payload(payload).into()));

        let instance = match activated {
            Ok(Some(instance)) => instance,
            Ok(None) => {
                warn!(handler, "activator produced no instance");
                return Err(DispatchError::activation(handler, None));
            }
            Err(source) => {
                warn!(handler, error = %Chain(source.as_ref()), "activator failed");
                return Err(DispatchError::activation(handler, Some(source)));
            }
        };

        handler_type.bind_for::<R>(instance).ok_or_else(|| {
            warn!(handler, request = R::NAME, "activated instance does not handle the request");
            DispatchError::activation(handler, None)
        })
    }

    /// Adds a handler type without scanning.
    ///
    /// Registering for a request type that was never resolved suppresses the
    /// scan for it; only registered handler types will be candidates.
    ///
    /// # Errors
    ///
    /// `NotAHandler` when the handler type does not expose its request type.
    pub fn register(&self, handler_type: HandlerType) -> Result<(), DispatchError> {
        let Some(request) = handler_type.request_type() else {
            return Err(DispatchError::NotAHandler {
                name: handler_type.name().to_string(),
            });
        };

        let mut candidates = self.handler_types.entry(request).or_default();
        if !candidates.contains(&handler_type) {
            debug!(request = request.name(), handler = handler_type.name(), "handler type registered");
            candidates.push(handler_type);
        }
        Ok(())
    }

    /// Configured scopes, or the request's crate plus the entry scope.
    fn search_scopes(&self, request: RequestType) -> Vec<Scope> {
        if !self.scopes.is_empty() {
            return self.scopes.clone();
        }
        let mut scopes: Vec<Scope> = request.declaring_scope().into_iter().collect();
        if let Some(entry) = &self.entry_scope {
            if !scopes.contains(entry) {
                scopes.push(entry.clone());
            }
        }
        scopes
    }

    fn scan(&self, request: RequestType) -> Vec<HandlerType> {
        self.scans.fetch_add(1, Ordering::Relaxed);
        let scopes = self.search_scopes(request);

        let mut found: Vec<HandlerType> = Vec::new();
        for scope in &scopes {
            for ty in catalogue() {
                if ty.request_type() == Some(request)
                    && scope.contains(ty.module_path())
                    && !found.contains(ty)
                {
                    found.push(ty.clone());
                }
            }
        }

        debug!(
            request = request.name(),
            scopes = ?scopes.iter().map(Scope::as_str).collect::<Vec<_>>(),
            found = found.len(),
            "scanned for handler types"
        );
        found
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("scopes", &self.scopes)
            .field("entry_scope", &self.entry_scope)
            .field("cached", &self.handler_types.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Envelope, Flags, Outcome, QueryResponse};
    use crate::typed::descriptor::{HandlerDescriptor, erased};
    use crate::typed::handler::Handler;
    use crate::typed::predicate::{Flag, Predicates, SelectionPredicate, from_fn};
    use async_trait::async_trait;
    use rstest::rstest;
    use std::any::TypeId;
    use tokio_util::sync::CancellationToken;

    struct Pick;

    impl Request for Pick {
        const NAME: &'static str = "test.pick";
        type Arguments = ();
        type Response = QueryResponse<u32>;
    }

    /// Answers `ANSWER`; requires flags `A` and `B` unless they are negative.
    #[derive(Default)]
    struct Flagged<const ANSWER: u32, const A: i32, const B: i32>;

    #[async_trait]
    impl<const ANSWER: u32, const A: i32, const B: i32> Handler for Flagged<ANSWER, A, B> {
        type Request = Pick;

        async fn handle(
            &self,
            _request: &Envelope<Pick>,
            _cancel: &CancellationToken,
        ) -> Result<Outcome<u32>, BoxError> {
            Ok(Outcome::data(ANSWER))
        }

        fn predicates() -> Predicates {
            [A, B]
                .into_iter()
                .filter(|flag| *flag >= 0)
                .map(|flag| Box::new(Flag::new(flag.to_string())) as Box<dyn SelectionPredicate>)
                .collect()
        }
    }

    fn registry_with(types: impl IntoIterator<Item = HandlerType>) -> Registry {
        let registry = Registry::new(vec![Scope::new("nowhere")], None, Activator::default());
        for ty in types {
            registry.register(ty).unwrap();
        }
        registry
    }

    fn ambient_with(flags: &[i32]) -> Ambient {
        let ambient = Ambient::new();
        ambient.insert(Flags::new(flags.iter().map(i32::to_string)));
        ambient
    }

    async fn answer(registry: &Registry, ambient: &Ambient) -> Result<u32, DispatchError> {
        let ty = registry.select_handler(RequestType::of::<Pick>(), ambient)?;
        let handler = registry.activate::<Pick>(&ty)?;
        let response = handler.handle(Envelope::new(()), &CancellationToken::new()).await;
        Ok(*response.result().unwrap())
    }

    #[rstest]
    #[case(&[4], Some(4))]
    #[case(&[], None)]
    #[case(&[5], None)]
    #[tokio::test]
    async fn gated_sole_candidate_is_never_forced(#[case] flags: &[i32], #[case] expected: Option<u32>) {
        let registry = registry_with([HandlerType::with_default::<Flagged<4, 4, -1>>()]);

        let result = answer(&registry, &ambient_with(flags)).await;

        match expected {
            Some(value) => assert_eq!(result.unwrap(), value),
            None => assert!(matches!(result, Err(DispatchError::NoHandlerFound { .. }))),
        }
    }

    #[rstest]
    #[case(&[1], Some(1))]
    #[case(&[2], Some(2))]
    #[case(&[0], None)]
    #[case(&[3], None)]
    #[tokio::test]
    async fn single_predicate_selection(#[case] flags: &[i32], #[case] expected: Option<u32>) {
        let registry = registry_with([
            HandlerType::with_default::<Flagged<1, 1, -1>>(),
            HandlerType::with_default::<Flagged<2, 2, -1>>(),
        ]);

        let result = answer(&registry, &ambient_with(flags)).await;

        match expected {
            Some(value) => assert_eq!(result.unwrap(), value),
            None => assert!(matches!(result, Err(DispatchError::NoHandlerFound { .. }))),
        }
    }

    #[rstest]
    #[case(&[0, 1], Some(1))]
    #[case(&[0, 2], Some(2))]
    #[case(&[0, 3], None)]
    #[case(&[1, 2], None)]
    #[tokio::test]
    async fn multiple_predicate_selection(#[case] flags: &[i32], #[case] expected: Option<u32>) {
        let registry = registry_with([
            HandlerType::with_default::<Flagged<1, 0, 1>>(),
            HandlerType::with_default::<Flagged<2, 0, 2>>(),
        ]);

        let result = answer(&registry, &ambient_with(flags)).await;

        match expected {
            Some(value) => assert_eq!(result.unwrap(), value),
            None => assert!(matches!(result, Err(DispatchError::NoHandlerFound { .. }))),
        }
    }

    #[rstest]
    #[case(&[7, 8], 78)]
    #[case(&[7], 7)]
    #[case(&[], 0)]
    #[tokio::test]
    async fn more_specific_handler_wins(#[case] flags: &[i32], #[case] expected: u32) {
        let registry = registry_with([
            HandlerType::with_default::<Flagged<0, -1, -1>>(),
            HandlerType::with_default::<Flagged<7, 7, -1>>(),
            HandlerType::with_default::<Flagged<78, 7, 8>>(),
        ]);

        assert_eq!(answer(&registry, &ambient_with(flags)).await.unwrap(), expected);
    }

    #[tokio::test]
    async fn equally_specific_matches_resolve_by_name() {
        let ambient = ambient_with(&[5]);
        let forward = registry_with([
            HandlerType::with_default::<Flagged<51, 5, -1>>(),
            HandlerType::with_default::<Flagged<52, 5, -1>>(),
        ]);
        let backward = registry_with([
            HandlerType::with_default::<Flagged<52, 5, -1>>(),
            HandlerType::with_default::<Flagged<51, 5, -1>>(),
        ]);

        assert_eq!(answer(&forward, &ambient).await.unwrap(), 51);
        assert_eq!(answer(&backward, &ambient).await.unwrap(), 51);
    }

    #[test]
    fn registration_suppresses_the_scan_and_is_idempotent() {
        let registry = registry_with([
            HandlerType::with_default::<Flagged<1, -1, -1>>(),
            HandlerType::with_default::<Flagged<1, -1, -1>>(),
        ]);

        let candidates = registry.resolve_candidates(RequestType::of::<Pick>());

        assert_eq!(candidates.len(), 1);
        assert_eq!(registry.scan_count(), 0);
        assert_eq!(registry.cached_request_types(), vec![RequestType::of::<Pick>()]);
    }

    #[test]
    fn scan_runs_once_per_request_type() {
        let registry = Registry::new(vec![Scope::new("nowhere")], None, Activator::default());

        assert!(registry.resolve_candidates(RequestType::of::<Pick>()).is_empty());
        assert!(registry.resolve_candidates(RequestType::of::<Pick>()).is_empty());
        assert_eq!(registry.scan_count(), 1);
    }

    #[test]
    fn fallback_scopes_are_request_crate_and_entry_scope() {
        let registry = Registry::new(Vec::new(), Some(Scope::new("host_app")), Activator::default());

        let scopes = registry.search_scopes(RequestType::of::<Pick>());

        assert_eq!(scopes, vec![Scope::new("herald_core"), Scope::new("host_app")]);
    }

    #[test]
    fn configured_scopes_replace_the_fallback() {
        let registry = Registry::new(vec![Scope::new("a"), Scope::new("b")], Some(Scope::new("c")), Activator::default());

        assert_eq!(registry.search_scopes(RequestType::of::<Pick>()), vec![Scope::new("a"), Scope::new("b")]);
    }

    fn activation_source(error: DispatchError) -> Option<String> {
        match error {
            DispatchError::HandlerActivationFailed { source, .. } => source.map(|e| e.to_string()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[rstest]
    #[case::nothing(Activator::new(|_| Ok(None)), None)]
    #[case::wrong_type(Activator::new(|_| Ok(Some(Box::new("not a handler") as Instance))), None)]
    #[case::failure(Activator::new(|_| Err("no database".into())), Some("no database"))]
    #[case::panic(Activator::new(|_| panic!("boom")), Some("handler panicked: boom"))]
    #[case::other_concrete_handler(Activator::new(|_| Ok(Some(Box::new(Flagged::<2, -1, -1>) as Instance))), None)]
    #[case::handler_for_another_request(Activator::new(|_| Ok(Some(erased(Elsewhere)))), None)]
    fn activation_failures_are_reported(#[case] activator: Activator, #[case] source: Option<&str>) {
        let registry = Registry::new(Vec::new(), None, activator);
        let ty = HandlerType::with_default::<Flagged<1, -1, -1>>();

        let error = registry.activate::<Pick>(&ty).err().unwrap();

        assert_eq!(activation_source(error).as_deref(), source);
    }

    struct Away;

    impl Request for Away {
        const NAME: &'static str = "test.away";
        type Arguments = ();
        type Response = QueryResponse<u32>;
    }

    struct Elsewhere;

    #[async_trait]
    impl Handler for Elsewhere {
        type Request = Away;

        async fn handle(
            &self,
            _request: &Envelope<Away>,
            _cancel: &CancellationToken,
        ) -> Result<Outcome<u32>, BoxError> {
            Ok(Outcome::data(0))
        }
    }

    #[tokio::test]
    async fn activator_may_return_any_erased_handler_for_the_request() {
        let activator = Activator::new(|_| Ok(Some(erased(Flagged::<9, -1, -1>))));
        let registry = Registry::new(Vec::new(), None, activator);
        registry.register(HandlerType::of::<Flagged<1, -1, -1>>()).unwrap();

        assert_eq!(answer(&registry, &Ambient::new()).await.unwrap(), 9);
    }

    /// Outranks every other candidate, but its predicate panics.
    struct Touchy;

    #[async_trait]
    impl Handler for Touchy {
        type Request = Pick;

        async fn handle(
            &self,
            _request: &Envelope<Pick>,
            _cancel: &CancellationToken,
        ) -> Result<Outcome<u32>, BoxError> {
            Ok(Outcome::data(100))
        }

        fn predicates() -> Predicates {
            vec![
                Box::new(from_fn(|_| true)) as Box<dyn SelectionPredicate>,
                Box::new(from_fn(|_| panic!("predicate exploded"))),
            ]
        }
    }

    /// Cannot even list its predicates.
    struct Broken;

    #[async_trait]
    impl Handler for Broken {
        type Request = Pick;

        async fn handle(
            &self,
            _request: &Envelope<Pick>,
            _cancel: &CancellationToken,
        ) -> Result<Outcome<u32>, BoxError> {
            Ok(Outcome::data(200))
        }

        fn predicates() -> Predicates {
            panic!("no predicates today")
        }
    }

    #[tokio::test]
    async fn panicking_predicates_make_a_candidate_ineligible() {
        let registry = registry_with([
            HandlerType::of::<Touchy>(),
            HandlerType::of::<Broken>(),
            HandlerType::with_default::<Flagged<3, -1, -1>>(),
        ]);

        assert_eq!(answer(&registry, &Ambient::new()).await.unwrap(), 3);
    }

    #[test]
    fn panicking_predicates_alone_mean_no_handler() {
        let registry = registry_with([HandlerType::of::<Touchy>(), HandlerType::of::<Broken>()]);

        let result = registry.select_handler(RequestType::of::<Pick>(), &Ambient::new());

        assert!(matches!(result, Err(DispatchError::NoHandlerFound { request: "test.pick" })));
    }

    #[test]
    fn default_constructor_needs_a_declared_default() {
        let registry = Registry::new(Vec::new(), None, Activator::default_constructor());

        assert!(registry.activate::<Pick>(&HandlerType::with_default::<Flagged<1, -1, -1>>()).is_ok());
        assert!(registry.activate::<Pick>(&HandlerType::of::<Flagged<1, -1, -1>>()).is_err());
    }

    #[test]
    fn custom_activator_sees_the_handler_type() {
        let activator = Activator::new(|ty| {
            assert_eq!(ty.handler_type_id(), TypeId::of::<Flagged<9, -1, -1>>());
            Ok(Some(Box::new(Flagged::<9, -1, -1>) as Instance))
        });
        let registry = Registry::new(Vec::new(), None, activator);

        assert!(registry.activate::<Pick>(&HandlerType::of::<Flagged<9, -1, -1>>()).is_ok());
    }

    struct Opaque;

    impl HandlerDescriptor for Opaque {
        fn name(&self) -> &'static str {
            "Opaque"
        }
        fn module_path(&self) -> &'static str {
            module_path!()
        }
        fn handler_type_id(&self) -> TypeId {
            TypeId::of::<Opaque>()
        }
        fn request_type(&self) -> Option<RequestType> {
            None
        }
        fn predicates(&self) -> Predicates {
            Vec::new()
        }
        fn construct_default(&self) -> Option<Instance> {
            None
        }
        fn bind(&self, instance: Instance) -> Result<Instance, Instance> {
            Err(instance)
        }
    }

    #[test]
    fn registering_a_non_handler_fails() {
        let registry = Registry::new(Vec::new(), None, Activator::default());

        let error = registry.register(HandlerType::from_descriptor(Opaque)).unwrap_err();

        assert!(matches!(error, DispatchError::NotAHandler { ref name } if name == "Opaque"));
        assert!(registry.cached_request_types().is_empty());
    }
}
