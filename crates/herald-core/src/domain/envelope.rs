//! Envelope - 送信される Request の値
//!
//! Envelope は send のたびに新しく作られ、dispatch が終わると捨てられます。
//! 作成後は不変です（フィールドは getter からのみ読める）。

use std::fmt;

use super::ids::RequestId;
use super::request::Request;

/// The immutable request value handed to a handler.
pub struct Envelope<R: Request> {
    id: RequestId,
    arguments: R::Arguments,
}

impl<R: Request> Envelope<R> {
    pub fn new(arguments: R::Arguments) -> Self {
        Self {
            id: RequestId::generate(),
            arguments,
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        R::NAME
    }

    pub fn arguments(&self) -> &R::Arguments {
        &self.arguments
    }

    pub fn into_arguments(self) -> R::Arguments {
        self.arguments
    }
}

impl<R: Request> fmt::Debug for Envelope<R>
where
    R::Arguments: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("request", &R::NAME)
            .field("id", &self.id)
            .field("arguments", &self.arguments)
            .finish()
    }
}
