//! # In-process subscription backed by a tokio mpsc channel.
//!
//! Useful for tests, demos, and for bridging a transport client that already
//! runs its own receive task. Dropping every sender makes the next `receive`
//! fail with [`SubscriptionError::Closed`], which the dispatcher treats as
//! terminal.

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use super::message::Message;
use super::subscription::Subscription;
use crate::error::SubscriptionError;

/// Subscription reading from an mpsc receiver.
pub struct ChannelSubscription {
    rx: Mutex<mpsc::Receiver<Message>>,
}

impl ChannelSubscription {
    /// Creates a subscription and the sender feeding it.
    pub fn new(capacity: usize) -> (mpsc::Sender<Message>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self::from_receiver(rx))
    }

    pub fn from_receiver(rx: mpsc::Receiver<Message>) -> Self {
        Self { rx: Mutex::new(rx) }
    }
}

#[async_trait]
impl Subscription for ChannelSubscription {
    async fn receive(&self, _token: &CancellationToken) -> Result<Message, SubscriptionError> {
        let mut rx = self.rx.lock().await;
        rx.recv().await.ok_or(SubscriptionError::Closed)
    }

    async fn shutdown(&self) {
        self.rx.lock().await.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn yields_in_order_then_closes() {
        let (tx, sub) = ChannelSubscription::new(4);
        let token = CancellationToken::new();

        tx.send(Message::new("1", b"a".to_vec())).await.unwrap();
        tx.send(Message::new("2", b"b".to_vec())).await.unwrap();
        drop(tx);

        assert_eq!(sub.receive(&token).await.unwrap().id(), "1");
        assert_eq!(sub.receive(&token).await.unwrap().id(), "2");
        assert_eq!(
            sub.receive(&token).await.unwrap_err(),
            SubscriptionError::Closed
        );
    }

    #[tokio::test]
    async fn shutdown_rejects_further_sends() {
        let (tx, sub) = ChannelSubscription::new(1);
        sub.shutdown().await;
        assert!(tx.send(Message::new("x", Vec::new())).await.is_err());
    }
}
