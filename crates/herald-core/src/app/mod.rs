//! App - アプリケーション層
//!
//! domain と typed を組み合わせて、呼び出し側が使う入口を提供します。
//!
//! # 主要コンポーネント
//! - **Mediator**: send / dispatch / configure / register
//! - **MediatorBuilder**: 構築とワイヤリング、起動時検証

pub mod builder;
pub mod mediator;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, MediatorBuilder};
pub use self::mediator::{Mediator, MediatorConfig};
