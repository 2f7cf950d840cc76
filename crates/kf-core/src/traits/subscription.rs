//! Single-subscriber channel-open stream

use std::sync::Mutex;

use futures::StreamExt;
use tokio::sync::mpsc;

use super::transport::ChannelOpenStream;
use crate::error::ForwardError;

/// Holds the receiving end of one channel type's open events until taken
pub struct SubscriptionSlot<E> {
    channel_type: String,
    rx: Mutex<Option<mpsc::Receiver<E>>>,
}

impl<E: Send + 'static> SubscriptionSlot<E> {
    /// Create a slot around a receiver
    pub fn new(channel_type: impl Into<String>, rx: mpsc::Receiver<E>) -> Self {
        Self {
            channel_type: channel_type.into(),
            rx: Mutex::new(Some(rx)),
        }
    }

    /// Channel type this slot serves
    pub fn channel_type(&self) -> &str {
        &self.channel_type
    }

    /// Whether the event stream has not been taken yet
    pub fn is_available(&self) -> bool {
        self.rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }

    /// Take the event stream; only the first call succeeds
    pub fn take(&self) -> Result<ChannelOpenStream<E>, ForwardError> {
        let rx = self
            .rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .ok_or_else(|| ForwardError::AlreadySubscribed(self.channel_type.clone()))?;

        Ok(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
        .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_take_once() {
        let (tx, rx) = mpsc::channel(4);
        let slot = SubscriptionSlot::new("x11", rx);

        assert!(slot.is_available());
        let mut events = slot.take().unwrap();
        assert!(!slot.is_available());
        assert!(matches!(
            slot.take(),
            Err(ForwardError::AlreadySubscribed(t)) if t == "x11"
        ));

        tx.send(1u32).await.unwrap();
        tx.send(2u32).await.unwrap();
        drop(tx);

        assert_eq!(events.next().await, Some(1));
        assert_eq!(events.next().await, Some(2));
        assert_eq!(events.next().await, None);
    }
}
