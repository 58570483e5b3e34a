//! Scope - handler を探す範囲
//!
//! Scope は module path の prefix です（例: `my_app`, `my_app::orders`）。
//! handler type は宣言された module path を持ち、scan はその path が
//! いずれかの scope に含まれる handler だけを候補にします。

use std::borrow::Cow;
use std::fmt;

/// A module-path prefix that handler discovery searches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope(Cow<'static, str>);

impl Scope {
    pub fn new(path: impl Into<Cow<'static, str>>) -> Self {
        let path = path.into();
        if let Some(trimmed) = path.strip_suffix("::") {
            return Self(Cow::Owned(trimmed.to_string()));
        }
        Self(path)
    }

    /// Scope covering the whole crate that `module_path` belongs to.
    pub fn crate_of(module_path: &str) -> Self {
        let root = module_path.split("::").next().unwrap_or(module_path);
        Self(Cow::Owned(root.to_string()))
    }

    /// Scope of the crate declaring `T`, if `T` is a path type.
    ///
    /// Primitive and tuple types (`i32`, `()`) have no declaring crate.
    pub fn of_type<T: ?Sized>() -> Option<Self> {
        Self::of_type_name(std::any::type_name::<T>())
    }

    /// Same as [`Scope::of_type`], from a `type_name` string.
    pub fn of_type_name(name: &str) -> Option<Self> {
        let (root, _) = name.split_once("::")?;
        if root.is_empty() || !root.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return None;
        }
        Some(Self(Cow::Owned(root.to_string())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` if `module_path` is this scope or nested inside it.
    pub fn contains(&self, module_path: &str) -> bool {
        match module_path.strip_prefix(self.as_str()) {
            Some("") => true,
            Some(rest) => rest.starts_with("::"),
            None => false,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&'static str> for Scope {
    fn from(path: &'static str) -> Self {
        Self::new(path)
    }
}

/// Scope of the crate invoking the macro; the usual entry scope.
///
/// ```ignore
/// let mediator = Mediator::builder().entry_scope(entry_scope!()).build()?;
/// ```
#[macro_export]
macro_rules! entry_scope {
    () => {
        $crate::domain::Scope::crate_of(::core::module_path!())
    };
}
