use std::pin::Pin;
use std::task::{Context, Poll as TaskPoll};
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::ChannelError;

/// One step of a polling subscription
#[async_trait]
pub(crate) trait Poll: Send + 'static {
    type Item: Send + 'static;

    /// Look at the channel once
    ///
    /// # Returns
    /// * `Ok(Some(item))` - something changed, emit `item`
    /// * `Ok(None)` - nothing new since the last call
    /// * `Err(_)` - emitted once, then the subscription ends
    async fn poll(&mut self) -> Result<Option<Self::Item>, ChannelError>;
}

/// A live, cancellable stream of values observed by polling a channel
///
/// Nothing is delivered after [`Subscription::cancel`] returns or the
/// handle is dropped. An error ends the stream.
#[derive(Debug)]
pub struct Subscription<T> {
    rx: Option<mpsc::UnboundedReceiver<Result<T, ChannelError>>>,
    task: Option<JoinHandle<()>>,
}

impl<T> Unpin for Subscription<T> {}

impl<T: Send + 'static> Subscription<T> {
    /// Run `poller` every `interval`, starting immediately
    ///
    /// A zero `interval` yields a subscription that emits one
    /// `InvalidParameters` error and ends.
    pub(crate) fn spawn<P>(interval: Duration, mut poller: P) -> Self
    where
        P: Poll<Item = T>,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Err(err) = check_interval(interval) {
            let _ = tx.send(Err(err));
            return Self {
                rx: Some(rx),
                task: None,
            };
        }
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match poller.poll().await {
                    Ok(Some(item)) => {
                        if tx.send(Ok(item)).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(err) => {
                        tracing::warn!("subscription ended with error: {}", err);
                        let _ = tx.send(Err(err));
                        break;
                    }
                }
            }
        });

        Self {
            rx: Some(rx),
            task: Some(task),
        }
    }
}

/// Polling intervals must be non-zero
pub(crate) fn check_interval(interval: Duration) -> Result<(), ChannelError> {
    if interval.is_zero() {
        return Err(ChannelError::InvalidParameters(
            "polling interval must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

impl<T> Subscription<T> {
    /// Wait for the next value, `None` once the subscription has ended
    pub async fn recv(&mut self) -> Option<Result<T, ChannelError>> {
        match self.rx.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }

    /// Stop polling and drop anything not yet received
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.rx = None;
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.is_none()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl<T> Stream for Subscription<T> {
    type Item = Result<T, ChannelError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> TaskPoll<Option<Self::Item>> {
        match self.get_mut().rx.as_mut() {
            Some(rx) => rx.poll_recv(cx),
            None => TaskPoll::Ready(None),
        }
    }
}

#[cfg(test)]
mod test {
    use futures::StreamExt;

    use super::*;

    struct Counter {
        n: u32,
        fail_at: Option<u32>,
    }

    #[async_trait]
    impl Poll for Counter {
        type Item = u32;

        async fn poll(&mut self) -> Result<Option<u32>, ChannelError> {
            self.n += 1;
            if Some(self.n) == self.fail_at {
                return Err(ChannelError::Network("boom".to_string()));
            }
            // only even ticks count as a change
            Ok((self.n % 2 == 0).then_some(self.n))
        }
    }

    #[tokio::test]
    async fn test_emits_changes_only() {
        let mut sub = Subscription::spawn(
            Duration::from_millis(5),
            Counter {
                n: 0,
                fail_at: None,
            },
        );
        assert_eq!(sub.next().await.unwrap().unwrap(), 2);
        assert_eq!(sub.next().await.unwrap().unwrap(), 4);
    }

    #[tokio::test]
    async fn test_error_is_terminal() {
        let mut sub = Subscription::spawn(
            Duration::from_millis(5),
            Counter {
                n: 0,
                fail_at: Some(3),
            },
        );
        assert_eq!(sub.recv().await.unwrap().unwrap(), 2);
        assert!(matches!(
            sub.recv().await,
            Some(Err(ChannelError::Network(_)))
        ));
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_silences() {
        let mut sub = Subscription::spawn(
            Duration::from_millis(5),
            Counter {
                n: 0,
                fail_at: None,
            },
        );
        assert!(sub.recv().await.is_some());
        sub.cancel();
        assert!(sub.is_cancelled());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_zero_interval_is_an_error() {
        let mut sub = Subscription::spawn(
            Duration::ZERO,
            Counter {
                n: 0,
                fail_at: None,
            },
        );
        assert!(matches!(
            sub.recv().await,
            Some(Err(ChannelError::InvalidParameters(_)))
        ));
        assert!(sub.recv().await.is_none());
    }
}
