//! Handler trait and type erasure.
//!
//! # Why handlers are trait objects
//!
//! [`AccessLog::wrap`](crate::AccessLog::wrap) and
//! [`Server::serve`](crate::Server::serve) accept any handler, but each one
//! has to keep it in a field whose type is fixed when the crate is compiled.
//! Every `async fn` and closure has its own unnameable type, so handlers are
//! erased behind `dyn ErasedHandler` and stored as one [`BoxedHandler`].
//!
//! ```text
//! async fn app(req: Request) -> Response { … }     ← user writes this
//!        ↓ access_log.wrap(app)  /  server.serve(app)
//! app.into_boxed_handler()                         ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(app))                         ← stored as BoxedHandler
//!        ↓
//! handler.call(req)  at request time               ← one vtable dispatch
//!        ↓
//! Box::pin(async { app(req).await.into_response() })
//! ```
//!
//! A wrapped handler is itself a closure, so it erases the same way: the
//! server holds `Arc<FnHandler<closure>>`, and the closure holds the inner
//! application as another `BoxedHandler`.
//!
//! Per request this costs one `Arc` clone and one virtual call per layer.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future that resolves to a [`Response`].
///
/// Pinned because tokio polls it in place after the first poll. `Send` and
/// `'static` let the runtime move it between worker threads.
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)`: it shows up in the return
/// type of [`Handler::into_boxed_handler`], which is public.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A type-erased handler shared across concurrent requests.
///
/// Every connection task clones the `Arc`; the handler itself is never
/// copied.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid handler.
///
/// You never implement this yourself. It is satisfied by any function or
/// closure with the shape:
///
/// ```text
/// async fn name(req: Request) -> impl IntoResponse
/// ```
///
/// The trait is sealed through the private `Sealed` supertrait, so the
/// blanket impl below is the only way to satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

/// `Sealed` is unnameable outside this crate.
mod private {
    pub trait Sealed {}
}

// ── Blanket implementations ───────────────────────────────────────────────────

/// `Fn(Request) -> Fut` covers named `async fn` items, closures returning
/// `async` blocks, and the closure [`AccessLog::wrap`](crate::AccessLog::wrap)
/// builds around another handler.
impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Holds a concrete handler `F` and implements [`ErasedHandler`] for it.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        // The concrete `Fut` is created here, outside the box, so `&self`
        // is not captured by the returned future.
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}
