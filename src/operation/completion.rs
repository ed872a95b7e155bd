/*!
 * Completion Handlers
 *
 * The callback an operation delivers its single terminal result to, plus an
 * optional diagnostic span found by capability lookup.
 */

use tracing::Span;

/// Receiver of an operation's terminal result
///
/// Any `FnOnce(T) + Send + 'static` closure is a completion handler. Handlers
/// that carry a diagnostic logger override [`span`](Self::span); everyone
/// else gets the inert `Span::none()`.
pub trait CompletionHandler<T>: Send + 'static {
    /// Deliver the result. Called exactly once, from scheduler context.
    fn complete(self, result: T);

    /// Diagnostic logger associated with this handler
    fn span(&self) -> Span {
        Span::none()
    }
}

impl<T, F> CompletionHandler<T> for F
where
    F: FnOnce(T) + Send + 'static,
{
    #[inline]
    fn complete(self, result: T) {
        self(result)
    }
}

/// Completion handler carrying its own diagnostic span
pub struct Logged<C> {
    inner: C,
    span: Span,
}

impl<C> Logged<C> {
    pub fn new(inner: C, span: Span) -> Self {
        Self { inner, span }
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<T, C> CompletionHandler<T> for Logged<C>
where
    C: CompletionHandler<T>,
{
    fn complete(self, result: T) {
        self.inner.complete(result)
    }

    fn span(&self) -> Span {
        self.span.clone()
    }
}

/// Attach a diagnostic span to any handler
pub trait CompletionExt: Sized {
    fn with_span(self, span: Span) -> Logged<Self> {
        Logged::new(self, span)
    }
}

impl<C> CompletionExt for C {}
