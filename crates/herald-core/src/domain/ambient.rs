//! Ambient - handler 選択に使う外部状態
//!
//! Selection predicate はこの map を明示的に受け取って評価します。
//! プロセス全体の static を読む代わりに、Mediator ごとに 1 つ持たせます。
//!
//! # 学習ポイント
//! - `TypeId` をキーにした型付き map（型ごとに値 1 つ）
//! - `Arc<dyn Any + Send + Sync>` からの downcast

use std::any::{Any, TypeId};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

/// Type-keyed store of ambient values read by selection predicates.
///
/// Values are replaced wholesale; readers get an `Arc` snapshot, so a
/// predicate never observes a half-written value.
#[derive(Default)]
pub struct Ambient {
    values: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl Ambient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value`, replacing any previous value of the same type.
    pub fn insert<T: Send + Sync + 'static>(&self, value: T) {
        self.values.write().insert(TypeId::of::<T>(), Arc::new(value));
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let value = self.values.read().get(&TypeId::of::<T>()).cloned()?;
        value.downcast::<T>().ok()
    }

    pub fn remove<T: Send + Sync + 'static>(&self) -> bool {
        self.values.write().remove(&TypeId::of::<T>()).is_some()
    }

    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.values.read().contains_key(&TypeId::of::<T>())
    }
}

impl std::fmt::Debug for Ambient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ambient")
            .field("values", &self.values.read().len())
            .finish()
    }
}

/// Set of named switches, the usual ambient value behind [`Flag`] predicates.
///
/// [`Flag`]: crate::typed::predicate::Flag
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags(BTreeSet<String>);

impl Flags {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.0.contains(name)
    }
}
