//! # Message handlers.
//!
//! [`Handler`] is invoked once per admitted message on its own tokio task.
//! [`HandlerFn`] adapts a closure `Fn(Request) -> Fut`, producing a fresh
//! future per message.
//!
//! ## Example
//! ```rust
//! use eventvisor::consumer::{HandlerFn, HandlerRef, Request};
//!
//! let h: HandlerRef = HandlerFn::arc(|req: Request| async move {
//!     if req.token.is_cancelled() {
//!         req.message.nack();
//!         return Ok(());
//!     }
//!     // process req.message.body() ...
//!     req.message.ack();
//!     Ok(())
//! });
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::message::Message;
use crate::error::HandlerError;
use crate::record::EventContext;

/// Boxed handler future.
pub type BoxHandlerFuture = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'static>>;

/// Shared handle to a handler.
pub type HandlerRef = Arc<dyn Handler>;

/// One admitted message plus its cancellation scope.
#[derive(Debug)]
pub struct Request {
    /// Per-message token; child of the consumer's token.
    pub token: CancellationToken,
    /// Raw message; the handler is responsible for `ack`/`nack`.
    pub message: Message,
}

impl Request {
    pub fn new(token: CancellationToken, message: Message) -> Self {
        Self { token, message }
    }

    /// Event record and transaction carried by the message body.
    pub fn context(&self) -> Result<EventContext, HandlerError> {
        self.message.context()
    }
}

/// Asynchronous message handler.
///
/// The returned result is only logged; errors and panics never stop the
/// dispatcher. A handler that never completes holds its slot forever and
/// blocks the consumer's drain.
pub trait Handler: Send + Sync + 'static {
    /// Creates the future processing `req`.
    fn handle(&self, req: Request) -> BoxHandlerFuture;
}

/// Function-backed handler.
pub struct HandlerFn<F> {
    f: F,
}

impl<F, Fut> HandlerFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the handler and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    fn handle(&self, req: Request) -> BoxHandlerFuture {
        Box::pin((self.f)(req))
    }
}
