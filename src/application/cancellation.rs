//! Cooperative cancellation for request attempts.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::domain::errors::ImageError;

/// Shared flag that asks an attempt to stop.
///
/// Cancelling a token also cancels every token created from it with
/// [`CancellationToken::child_token`]. Cancellation is sticky.
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

#[derive(Default)]
struct TokenInner {
    cancelled: AtomicBool,
    notify: Notify,
    children: Mutex<Vec<Weak<TokenInner>>>,
}

impl TokenInner {
    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.notify.notify_waiters();
        let children = std::mem::take(&mut *self.children.lock());
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }
}

impl CancellationToken {
    /// Creates an uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a token that is cancelled together with this one.
    #[must_use]
    pub fn child_token(&self) -> Self {
        let child = Self::new();
        if self.is_cancelled() {
            child.cancel();
            return child;
        }
        let mut children = self.inner.children.lock();
        children.retain(|weak| weak.strong_count() > 0);
        children.push(Arc::downgrade(&child.inner));
        drop(children);
        // The parent may have been cancelled while the child was registered.
        if self.is_cancelled() {
            child.cancel();
        }
        child
    }

    /// Cancels this token and its children.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Returns true once cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Fails with [`ImageError::Cancelled`] if the token is cancelled.
    ///
    /// # Errors
    /// Returns `Cancelled` once the token has been cancelled.
    pub fn check(&self) -> Result<(), ImageError> {
        if self.is_cancelled() {
            Err(ImageError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Drives `future` until it completes or the token is cancelled.
    ///
    /// On cancellation the future is dropped, releasing whatever it held.
    ///
    /// # Errors
    /// Returns `Cancelled` if the token fires first.
    pub async fn run_until_cancelled<F>(&self, future: F) -> Result<F::Output, ImageError>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            () = self.cancelled() => Err(ImageError::Cancelled),
            output = future => Ok(output),
        }
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
