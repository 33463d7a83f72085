//! One-shot, multi-observer synchronization point.

use tokio::sync::watch;

/// A value that is set at most once and can be awaited by any number of
/// observers. The first [`complete`](Slot::complete) wins.
pub(crate) struct Slot<T> {
    tx: watch::Sender<Option<T>>,
}

impl<T: Clone> Slot<T> {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Set the value if unset. Returns `false` if another value was already
    /// in place.
    pub(crate) fn complete(&self, value: T) -> bool {
        let mut value = Some(value);
        self.tx.send_if_modified(|current| {
            if current.is_none() {
                *current = value.take();
                true
            } else {
                false
            }
        })
    }

    /// Wait for the value. `None` means the slot was torn down unset.
    pub(crate) async fn wait(&self) -> Option<T> {
        let mut rx = self.tx.subscribe();
        let value = rx.wait_for(Option::is_some).await.ok()?.clone();
        value
    }

    pub(crate) fn peek(&self) -> Option<T> {
        self.tx.borrow().clone()
    }

    pub(crate) fn is_done(&self) -> bool {
        self.tx.borrow().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn first_completion_wins() {
        let slot = Slot::new();
        assert!(!slot.is_done());
        assert!(slot.complete(1));
        assert!(!slot.complete(2));
        assert_eq!(slot.peek(), Some(1));
    }

    #[tokio::test]
    async fn wait_returns_value_set_before_and_after() {
        let slot = Arc::new(Slot::new());
        slot.complete("early");
        assert_eq!(slot.wait().await, Some("early"));

        let late = Arc::new(Slot::<u8>::new());
        let waiter = {
            let late = Arc::clone(&late);
            tokio::spawn(async move { late.wait().await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        late.complete(7);
        let got = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .unwrap();
        assert_eq!(got, Some(7));
    }

    #[tokio::test]
    async fn many_observers_see_same_value() {
        let slot = Arc::new(Slot::<u32>::new());
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let slot = Arc::clone(&slot);
                tokio::spawn(async move { slot.wait().await })
            })
            .collect();
        slot.complete(42);
        for w in futures::future::join_all(waiters).await {
            assert_eq!(w.unwrap(), Some(42));
        }
    }
}
