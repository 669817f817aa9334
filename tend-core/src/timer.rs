//! Cancellable background timers
//!
//! Restart delays and health-check loops run as spawned tasks. Each one is
//! owned through a [`TimerHandle`] stored in the daemon's runtime record so it
//! can be cancelled before a stop or restart proceeds.
//!
//! A timer is only ever replaced after the previous one was cancelled, so a
//! task whose token is still live is the current timer for its daemon.

use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handle to a spawned timer task.
#[derive(Debug)]
pub struct TimerHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Spawn `body` with a token derived from `parent`.
    ///
    /// The task sees cancellation both when the handle is cancelled and when
    /// `parent` is cancelled (supervisor shutdown).
    pub fn spawn<F, Fut>(parent: &CancellationToken, body: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = parent.child_token();
        let task = tokio::spawn(body(token.clone()));
        Self { token, task }
    }

    /// Cancel the timer and abort its task at the next suspension point.
    pub fn cancel(self) {
        self.token.cancel();
        self.task.abort();
    }

    /// Drop the handle without cancelling; used by a timer that has fired.
    pub fn release(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn cancelled_timer_never_fires() {
        let parent = CancellationToken::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);

        let timer = TimerHandle::spawn(&parent, move |token| async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(Duration::from_millis(50)) => {
                    flag.store(true, Ordering::SeqCst);
                }
            }
        });
        timer.cancel();

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn timer_fires_when_left_alone() {
        let parent = CancellationToken::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);

        let timer = TimerHandle::spawn(&parent, move |_token| async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            flag.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(fired.load(Ordering::SeqCst));
        timer.release();
    }

    #[tokio::test]
    async fn parent_cancellation_reaches_timer() {
        let parent = CancellationToken::new();
        let seen = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&seen);

        let _timer = TimerHandle::spawn(&parent, move |token| async move {
            token.cancelled().await;
            flag.store(true, Ordering::SeqCst);
        });

        parent.cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(seen.load(Ordering::SeqCst));
    }
}
