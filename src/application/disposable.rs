//! Caller-facing handle to an enqueued request.

use std::sync::Arc;

use tokio::sync::watch;

use crate::domain::entities::ImageResult;
use crate::domain::errors::Cancelled;
use crate::domain::ports::TargetId;

use super::request_delegate::RequestDelegate;
use super::target_slots::TargetSlots;

/// Final outcome of an attempt as seen through a [`Disposable`].
pub type AttemptOutcome = Result<ImageResult, Cancelled>;

#[derive(Clone)]
enum Handle {
    Attempt(Arc<RequestDelegate>),
    Target {
        slots: Arc<TargetSlots>,
        id: TargetId,
        delegate: Arc<RequestDelegate>,
    },
    Disposed,
}

/// Handle to one enqueued attempt.
///
/// For target-bound requests the handle only acts while its attempt still
/// occupies the target, so disposing a superseded handle leaves the newer
/// request alone.
#[derive(Clone)]
pub struct Disposable {
    handle: Handle,
    outcome: watch::Receiver<Option<AttemptOutcome>>,
}

impl Disposable {
    pub(crate) const fn attempt(
        delegate: Arc<RequestDelegate>,
        outcome: watch::Receiver<Option<AttemptOutcome>>,
    ) -> Self {
        Self {
            handle: Handle::Attempt(delegate),
            outcome,
        }
    }

    pub(crate) const fn target(
        slots: Arc<TargetSlots>,
        id: TargetId,
        delegate: Arc<RequestDelegate>,
        outcome: watch::Receiver<Option<AttemptOutcome>>,
    ) -> Self {
        Self {
            handle: Handle::Target {
                slots,
                id,
                delegate,
            },
            outcome,
        }
    }

    /// A handle for a request that never ran.
    #[must_use]
    pub fn disposed() -> Self {
        let (_, outcome) = watch::channel(Some(Err(Cancelled)));
        Self {
            handle: Handle::Disposed,
            outcome,
        }
    }

    /// Cancels the attempt if it is still live. Later calls do nothing.
    pub fn dispose(&self) {
        match &self.handle {
            Handle::Attempt(delegate) => delegate.dispose(),
            Handle::Target {
                slots,
                id,
                delegate,
            } => {
                slots.dispose_if_current(*id, delegate);
            }
            Handle::Disposed => {}
        }
    }

    /// Returns true once the attempt can no longer deliver anything new.
    ///
    /// Target handles also report disposed once superseded or finished.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        match &self.handle {
            Handle::Attempt(delegate) => delegate.is_disposed() || delegate.is_completed(),
            Handle::Target {
                slots,
                id,
                delegate,
            } => delegate.is_disposed() || !slots.is_current(*id, delegate),
            Handle::Disposed => true,
        }
    }

    /// Waits for the attempt to finish.
    ///
    /// # Errors
    /// Returns [`Cancelled`] if the attempt was disposed or never ran.
    pub async fn result(&self) -> AttemptOutcome {
        let mut outcome = self.outcome.clone();
        match outcome.wait_for(Option::is_some).await {
            Ok(value) => value.clone().unwrap_or(Err(Cancelled)),
            Err(_) => Err(Cancelled),
        }
    }
}

impl std::fmt::Debug for Disposable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disposable")
            .field("is_disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}
