//! SelectionPredicate - 同じ Request に複数 handler があるときの選択条件
//!
//! handler type は 0 個以上の predicate を持ちます。
//! - predicate が 0 個の handler は常に候補になる
//! - すべての predicate が true のときだけ候補になる
//! - predicate の数が多い handler ほど優先される（より具体的）
//!
//! predicate は [`Ambient`] を読むだけで、副作用を持ってはいけません。

use std::borrow::Cow;

use crate::domain::{Ambient, Flags};

/// A declarative condition attached to a handler type.
///
/// A predicate that panics makes its handler ineligible for that selection.
pub trait SelectionPredicate: Send + Sync {
    fn is_match(&self, ambient: &Ambient) -> bool;
}

/// Predicates attached to one handler type. Order is irrelevant.
pub type Predicates = Vec<Box<dyn SelectionPredicate>>;

/// `true` when every predicate matches (vacuously true when empty).
pub fn all_match(predicates: &[Box<dyn SelectionPredicate>], ambient: &Ambient) -> bool {
    predicates.iter().all(|p| p.is_match(ambient))
}

/// Predicate backed by a closure.
pub struct FnPredicate<F>(F);

/// Creates a predicate from a closure over the ambient state.
///
/// ```ignore
/// fn predicates() -> Predicates {
///     vec![Box::new(predicate::from_fn(|ambient| ambient.contains::<Maintenance>()))]
/// }
/// ```
pub fn from_fn<F>(f: F) -> FnPredicate<F>
where
    F: Fn(&Ambient) -> bool + Send + Sync,
{
    FnPredicate(f)
}

impl<F> SelectionPredicate for FnPredicate<F>
where
    F: Fn(&Ambient) -> bool + Send + Sync,
{
    fn is_match(&self, ambient: &Ambient) -> bool {
        (self.0)(ambient)
    }
}

/// Matches when the named flag is set in the ambient [`Flags`].
#[derive(Debug, Clone)]
pub struct Flag(Cow<'static, str>);

impl Flag {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }
}

impl SelectionPredicate for Flag {
    fn is_match(&self, ambient: &Ambient) -> bool {
        ambient.get::<Flags>().is_some_and(|flags| flags.is_set(&self.0))
    }
}
