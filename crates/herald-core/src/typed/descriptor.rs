//! HandlerType - 解決対象になる「handler の型」
//!
//! registry が解決するのは handler のインスタンスではなく型です。
//! インスタンスは dispatch のたびに activator が作り、再利用しません。
//!
//! # 学習ポイント
//! - `inventory` によるリンク時の自己登録（`submit_handler!`）
//! - `TypeId` と `Box<dyn Any>` の downcast による型の照合
//! - const fn で static に置ける descriptor
//!
//! # 発見の契約
//! 各 handler type は次を公開します。
//! - 処理する Request の型（1 つだけ）
//! - 0 個以上の selection predicate
//! - 宣言された module path（scope の判定に使う）

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

use super::handler::{Handle, Handler, TypedHandler};
use super::predicate::Predicates;
use crate::domain::{Request, Scope};

/// An activated handler object, before it is checked against the expected capability.
///
/// Either the concrete handler type that was resolved, or any handler for the
/// same request already erased with [`erased`].
pub type Instance = Box<dyn Any + Send + Sync>;

/// Erases `handler` so an activator can return it in place of the resolved
/// handler type (a decorator, a test double, another handler for the request).
pub fn erased<H: Handler>(handler: H) -> Instance {
    let handle: Box<dyn Handle<H::Request>> = Box::new(TypedHandler::new(handler));
    Box::new(handle)
}

/// Identity of a request type, as exposed by handler types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestType {
    id: TypeId,
    name: &'static str,
    type_name: &'static str,
}

impl RequestType {
    pub fn of<R: Request>() -> Self {
        Self {
            id: TypeId::of::<R>(),
            name: R::NAME,
            type_name: type_name::<R>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The request's `NAME`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Scope of the crate that declares the request type.
    pub fn declaring_scope(&self) -> Option<Scope> {
        Scope::of_type_name(self.type_name)
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Type-level description of a handler, the unit the registry resolves.
///
/// Implemented by [`HandlerEntry`]; hosts may implement it for handler types
/// they build by other means.
pub trait HandlerDescriptor: Send + Sync + 'static {
    /// Fully qualified handler type name.
    fn name(&self) -> &'static str;

    /// Module the handler type is declared in.
    fn module_path(&self) -> &'static str;

    fn handler_type_id(&self) -> TypeId;

    /// The request type handled, `None` when it cannot be determined.
    fn request_type(&self) -> Option<RequestType>;

    fn predicates(&self) -> Predicates;

    /// Default construction, when the handler type was declared with one.
    fn construct_default(&self) -> Option<Instance>;

    /// Checks that `instance` is this handler type and erases it to
    /// `Box<dyn Handle<R>>` (boxed again as `Instance`).
    ///
    /// # Errors
    ///
    /// Returns the instance unchanged when it is of another type.
    fn bind(&self, instance: Instance) -> Result<Instance, Instance>;
}

/// Descriptor for a [`Handler`] type `H`.
pub struct HandlerEntry<H: Handler> {
    module_path: &'static str,
    construct: Option<fn() -> H>,
    _marker: PhantomData<fn() -> H>,
}

impl<H: Handler> HandlerEntry<H> {
    /// Entry without default construction; activation needs a custom activator.
    pub const fn new(module_path: &'static str) -> Self {
        Self {
            module_path,
            construct: None,
            _marker: PhantomData,
        }
    }

    /// Entry that the default activator can construct with `construct`.
    pub const fn with_default(module_path: &'static str, construct: fn() -> H) -> Self {
        Self {
            module_path,
            construct: Some(construct),
            _marker: PhantomData,
        }
    }
}

impl<H: Handler> HandlerDescriptor for HandlerEntry<H> {
    fn name(&self) -> &'static str {
        type_name::<H>()
    }

    fn module_path(&self) -> &'static str {
        self.module_path
    }

    fn handler_type_id(&self) -> TypeId {
        TypeId::of::<H>()
    }

    fn request_type(&self) -> Option<RequestType> {
        Some(RequestType::of::<H::Request>())
    }

    fn predicates(&self) -> Predicates {
        H::predicates()
    }

    fn construct_default(&self) -> Option<Instance> {
        self.construct.map(|construct| Box::new(construct()) as Instance)
    }

    fn bind(&self, instance: Instance) -> Result<Instance, Instance> {
        let handler = instance.downcast::<H>()?;
        let erased: Box<dyn Handle<H::Request>> = Box::new(TypedHandler::new(*handler));
        Ok(Box::new(erased))
    }
}

/// Cheaply cloneable handle to a handler type descriptor.
#[derive(Clone)]
pub struct HandlerType(Repr);

#[derive(Clone)]
enum Repr {
    Static(&'static dyn HandlerDescriptor),
    Shared(Arc<dyn HandlerDescriptor>),
}

impl HandlerType {
    /// Wraps a descriptor living in static memory (used by `submit_handler!`).
    pub const fn from_static(descriptor: &'static dyn HandlerDescriptor) -> Self {
        Self(Repr::Static(descriptor))
    }

    pub fn from_descriptor(descriptor: impl HandlerDescriptor) -> Self {
        Self(Repr::Shared(Arc::new(descriptor)))
    }

    /// Handler type `H` without default construction.
    pub fn of<H: Handler>() -> Self {
        Self::from_descriptor(HandlerEntry::<H>::new(module_of(type_name::<H>())))
    }

    /// Handler type `H`, constructible by the default activator.
    pub fn with_default<H: Handler + Default>() -> Self {
        Self::from_descriptor(HandlerEntry::<H>::with_default(
            module_of(type_name::<H>()),
            H::default,
        ))
    }

    /// Erases an activated instance to `Box<dyn Handle<R>>`.
    ///
    /// Accepts an instance that already is a `Box<dyn Handle<R>>`, or an
    /// instance of this handler type when it handles `R`. `None` otherwise.
    pub(crate) fn bind_for<R: Request>(&self, instance: Instance) -> Option<Box<dyn Handle<R>>> {
        let instance = match instance.downcast::<Box<dyn Handle<R>>>() {
            Ok(handle) => return Some(*handle),
            Err(instance) => instance,
        };
        let bound = self.bind(instance).ok()?;
        bound.downcast::<Box<dyn Handle<R>>>().ok().map(|boxed| *boxed)
    }
}

impl Deref for HandlerType {
    type Target = dyn HandlerDescriptor;

    fn deref(&self) -> &Self::Target {
        match &self.0 {
            Repr::Static(descriptor) => *descriptor,
            Repr::Shared(descriptor) => descriptor.as_ref(),
        }
    }
}

impl PartialEq for HandlerType {
    fn eq(&self, other: &Self) -> bool {
        self.handler_type_id() == other.handler_type_id()
    }
}

impl Eq for HandlerType {}

impl fmt::Debug for HandlerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerType")
            .field("name", &self.name())
            .field("request", &self.request_type().map(|r| r.name()))
            .finish()
    }
}

inventory::collect!(HandlerType);

/// All handler types submitted with `submit_handler!` and linked into the program.
pub fn catalogue() -> impl Iterator<Item = &'static HandlerType> {
    inventory::iter::<HandlerType>.into_iter()
}

/// Looks a submitted handler type up by its full type name, or by a unique
/// `::`-suffix of it (`"orders::PlaceOrderHandler"`).
pub fn find_by_name(name: &str) -> Option<HandlerType> {
    if let Some(exact) = catalogue().find(|ty| ty.name() == name) {
        return Some(exact.clone());
    }
    let suffix = format!("::{name}");
    let mut matches = catalogue().filter(|ty| ty.name().ends_with(&suffix));
    let first = matches.next()?;
    match matches.next() {
        None => Some(first.clone()),
        Some(_) => None,
    }
}

/// `my_app::orders::Handler<T>` → `my_app::orders`
fn module_of(type_name: &'static str) -> &'static str {
    let path = type_name.split('<').next().unwrap_or(type_name);
    path.rsplit_once("::").map_or(path, |(module, _)| module)
}

/// Submits a handler type to the link-time catalogue that scans search.
///
/// ```ignore
/// submit_handler!(GetAnswerHandler);           // custom activator required
/// submit_handler!(GetAnswerHandler, default);  // default activator uses `Default`
/// ```
#[macro_export]
macro_rules! submit_handler {
    ($handler:ty) => {
        const _: () = {
            static ENTRY: $crate::typed::HandlerEntry<$handler> =
                $crate::typed::HandlerEntry::<$handler>::new(::core::module_path!());
            $crate::inventory::submit! {
                $crate::typed::HandlerType::from_static(&ENTRY)
            }
        };
    };
    ($handler:ty, default) => {
        const _: () = {
            static ENTRY: $crate::typed::HandlerEntry<$handler> =
                $crate::typed::HandlerEntry::<$handler>::with_default(
                    ::core::module_path!(),
                    <$handler as ::core::default::Default>::default,
                );
            $crate::inventory::submit! {
                $crate::typed::HandlerType::from_static(&ENTRY)
            }
        };
    };
}
