//! Per-attempt state shared between a running request and its handles.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::ReentrantMutex;
use tokio::sync::watch;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::application::cancellation::CancellationToken;
use crate::domain::entities::{ImageRequest, LifecycleState};
use crate::domain::ports::TargetId;

/// One attempt at running a request.
///
/// Callbacks towards the target and listeners go through
/// [`RequestDelegate::deliver`], which shares a lock with
/// [`RequestDelegate::dispose`]. Once `dispose` returns, no further callback
/// for this attempt can start.
pub struct RequestDelegate {
    attempt: Uuid,
    request: ImageRequest,
    token: CancellationToken,
    target: Option<TargetId>,
    completed: AtomicBool,
    disposed: AtomicBool,
    delivery: ReentrantMutex<()>,
}

impl RequestDelegate {
    /// Creates a delegate for `request`, cancelled through `token`.
    #[must_use]
    pub fn new(request: ImageRequest, token: CancellationToken) -> Self {
        let target = request.target().and_then(|target| target.id());
        Self {
            attempt: Uuid::new_v4(),
            request,
            token,
            target,
            completed: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            delivery: ReentrantMutex::new(()),
        }
    }

    /// Unique id of this attempt, used in logs.
    #[must_use]
    pub const fn attempt(&self) -> Uuid {
        self.attempt
    }

    /// The request as submitted, without loader defaults.
    #[must_use]
    pub const fn request(&self) -> &ImageRequest {
        &self.request
    }

    /// Slot this attempt occupies, if any.
    #[must_use]
    pub const fn target(&self) -> Option<TargetId> {
        self.target
    }

    /// Token cancelled on dispose.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.token
    }

    /// Starts the attempt, observing the request's lifecycle if it has one.
    ///
    /// Dropping the returned guard completes the attempt.
    #[must_use]
    pub fn start(self: &Arc<Self>) -> ActiveAttempt {
        trace!(attempt = %self.attempt, "Attempt started");
        ActiveAttempt {
            delegate: self.clone(),
            observer: self.request.lifecycle().map(|lifecycle| lifecycle.subscribe()),
        }
    }

    /// Runs `callback` unless the attempt has been disposed.
    ///
    /// Returns whether the callback ran.
    pub fn deliver(&self, callback: impl FnOnce()) -> bool {
        let _delivery = self.delivery.lock();
        if self.token.is_cancelled() {
            return false;
        }
        callback();
        true
    }

    /// Cancels the attempt. Later calls do nothing.
    pub fn dispose(&self) {
        let _delivery = self.delivery.lock();
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.token.cancel();
        debug!(attempt = %self.attempt, target_id = ?self.target, "Disposed request");
    }

    /// Marks the attempt finished. Returns false if it already was.
    pub fn complete(&self) -> bool {
        !self.completed.swap(true, Ordering::SeqCst)
    }

    /// Returns true once [`RequestDelegate::dispose`] has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Returns true once the attempt has finished for any reason.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for RequestDelegate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDelegate")
            .field("attempt", &self.attempt)
            .field("target", &self.target)
            .field("completed", &self.is_completed())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

/// A started attempt holding its lifecycle subscription.
///
/// Dropping it detaches the observer and completes the delegate, whether
/// the attempt finished, failed or was dropped mid-flight.
pub struct ActiveAttempt {
    delegate: Arc<RequestDelegate>,
    observer: Option<watch::Receiver<LifecycleState>>,
}

impl ActiveAttempt {
    /// Resolves when the observed lifecycle is destroyed.
    ///
    /// Never resolves for requests without a lifecycle.
    pub async fn destroyed(&mut self) {
        if let Some(observer) = self.observer.as_mut() {
            if observer
                .wait_for(|state| *state == LifecycleState::Destroyed)
                .await
                .is_ok()
            {
                return;
            }
        }
        std::future::pending::<()>().await;
    }
}

impl Drop for ActiveAttempt {
    fn drop(&mut self) {
        self.observer = None;
        if self.delegate.complete() {
            trace!(attempt = %self.delegate.attempt, "Attempt completed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::domain::entities::Lifecycle;
    use crate::domain::ports::mocks::RecordingTarget;

    fn delegate(request: ImageRequest) -> Arc<RequestDelegate> {
        Arc::new(RequestDelegate::new(request, CancellationToken::new()))
    }

    #[test]
    fn test_target_id_taken_from_request() {
        let request = ImageRequest::builder("a")
            .target(RecordingTarget::new(TargetId::new(3)))
            .build();
        assert_eq!(delegate(request).target(), Some(TargetId::new(3)));
        assert_eq!(delegate(ImageRequest::builder("a").build()).target(), None);
    }

    #[test]
    fn test_dispose_blocks_later_delivery() {
        let delegate = delegate(ImageRequest::builder("a").build());
        assert!(delegate.deliver(|| {}));

        delegate.dispose();
        delegate.dispose();
        let mut ran = false;
        assert!(!delegate.deliver(|| ran = true));
        assert!(!ran);
        assert!(delegate.is_disposed());
        assert!(delegate.cancellation().is_cancelled());
    }

    #[test]
    fn test_dispose_inside_delivery_is_reentrant() {
        let delegate = delegate(ImageRequest::builder("a").build());
        assert!(delegate.deliver(|| delegate.dispose()));
        assert!(delegate.is_disposed());
    }

    #[test]
    fn test_guard_completes_once_and_releases_observer() {
        let lifecycle = Lifecycle::default();
        let delegate = delegate(ImageRequest::builder("a").lifecycle(lifecycle.clone()).build());

        let attempt = delegate.start();
        assert_eq!(lifecycle.observer_count(), 1);
        assert!(!delegate.is_completed());

        drop(attempt);
        assert_eq!(lifecycle.observer_count(), 0);
        assert!(delegate.is_completed());
        assert!(!delegate.complete());
    }

    #[tokio::test]
    async fn test_destroyed_resolves_on_destroy() {
        let lifecycle = Lifecycle::default();
        let delegate = delegate(ImageRequest::builder("a").lifecycle(lifecycle.clone()).build());
        let mut attempt = delegate.start();

        let destroyer = lifecycle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            destroyer.stop();
            destroyer.destroy();
        });
        tokio::time::timeout(Duration::from_secs(1), attempt.destroyed())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_destroyed_never_resolves_without_lifecycle() {
        let delegate = delegate(ImageRequest::builder("a").build());
        let mut attempt = delegate.start();
        let waited = tokio::time::timeout(Duration::from_millis(20), attempt.destroyed()).await;
        assert!(waited.is_err());
    }
}
