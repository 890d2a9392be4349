use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::message::Message;
use crate::error::SubscriptionError;

/// # Source of messages for one consumer.
///
/// `receive` blocks until a message is available. Any error is terminal: the
/// dispatcher stops pulling and drains, it never calls `receive` again.
///
/// Implementations should return promptly once `token` is cancelled; the
/// dispatcher also races `receive` against cancellation, so a transport that
/// ignores the token still shuts down.
#[async_trait]
pub trait Subscription: Send + Sync + 'static {
    /// Waits for the next message.
    async fn receive(&self, token: &CancellationToken) -> Result<Message, SubscriptionError>;

    /// Releases transport resources once the consumer has drained.
    async fn shutdown(&self) {}
}

/// Shared handle to a subscription.
pub type SubscriptionRef = Arc<dyn Subscription>;
