//! Port definitions for request sinks.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::entities::{DecodedImage, ErrorResult, ImageRequest, SuccessResult};

use super::SizeResolver;

static NEXT_TARGET_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a display target, used to key its request slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    /// Wraps a host-provided identifier.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates a process-unique identifier.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_TARGET_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "target#{}", self.0)
    }
}

/// Sink that displays a request's images.
///
/// Targets returning an [`id`](Target::id) are bound to a slot: starting a
/// new request for the same id disposes the previous one.
pub trait Target: Send + Sync {
    /// Slot identity, if this target displays one request at a time.
    fn id(&self) -> Option<TargetId> {
        None
    }

    /// Resolver measuring this target, used when the request sets no size.
    fn size_resolver(&self) -> Option<Arc<dyn SizeResolver>> {
        None
    }

    /// Called when the request starts, with its placeholder.
    fn on_start(&self, _placeholder: Option<&DecodedImage>) {}

    /// Called with the produced image.
    fn on_success(&self, _image: &DecodedImage) {}

    /// Called with the error or fallback image.
    fn on_error(&self, _image: Option<&DecodedImage>) {}
}

/// Per-request callbacks.
pub trait RequestListener: Send + Sync {
    /// The request started.
    fn on_start(&self, _request: &ImageRequest) {}

    /// The request was cancelled.
    fn on_cancel(&self, _request: &ImageRequest) {}

    /// The request succeeded.
    fn on_success(&self, _request: &ImageRequest, _result: &SuccessResult) {}

    /// The request failed.
    fn on_error(&self, _request: &ImageRequest, _result: &ErrorResult) {}
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use parking_lot::Mutex;

    /// Callback observed by [`RecordingTarget`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum TargetEvent {
        /// `on_start`, with whether a placeholder was passed.
        Start { placeholder: bool },
        /// `on_success`, with the image width.
        Success { width: u32 },
        /// `on_error`, with whether an image was passed.
        Error { image: bool },
    }

    /// Target recording every callback in order.
    pub struct RecordingTarget {
        id: Option<TargetId>,
        resolver: Option<Arc<dyn SizeResolver>>,
        /// Recorded callbacks.
        pub events: Mutex<Vec<TargetEvent>>,
    }

    impl RecordingTarget {
        /// Creates a slot-bound target.
        pub fn new(id: TargetId) -> Arc<Self> {
            Arc::new(Self {
                id: Some(id),
                resolver: None,
                events: Mutex::new(Vec::new()),
            })
        }

        /// Creates a target without a slot.
        pub fn unbound() -> Arc<Self> {
            Arc::new(Self {
                id: None,
                resolver: None,
                events: Mutex::new(Vec::new()),
            })
        }

        /// Creates a slot-bound target that measures itself.
        pub fn measured(id: TargetId, resolver: Arc<dyn SizeResolver>) -> Arc<Self> {
            Arc::new(Self {
                id: Some(id),
                resolver: Some(resolver),
                events: Mutex::new(Vec::new()),
            })
        }

        /// Snapshot of recorded callbacks.
        pub fn events(&self) -> Vec<TargetEvent> {
            self.events.lock().clone()
        }
    }

    impl Target for RecordingTarget {
        fn id(&self) -> Option<TargetId> {
            self.id
        }

        fn size_resolver(&self) -> Option<Arc<dyn SizeResolver>> {
            self.resolver.clone()
        }

        fn on_start(&self, placeholder: Option<&DecodedImage>) {
            self.events.lock().push(TargetEvent::Start {
                placeholder: placeholder.is_some(),
            });
        }

        fn on_success(&self, image: &DecodedImage) {
            self.events.lock().push(TargetEvent::Success {
                width: image.width(),
            });
        }

        fn on_error(&self, image: Option<&DecodedImage>) {
            self.events.lock().push(TargetEvent::Error {
                image: image.is_some(),
            });
        }
    }

    /// Listener counting callbacks.
    #[derive(Default)]
    pub struct CountingListener {
        /// `(start, cancel, success, error)` counts.
        pub counts: Mutex<(usize, usize, usize, usize)>,
    }

    impl RequestListener for CountingListener {
        fn on_start(&self, _request: &ImageRequest) {
            self.counts.lock().0 += 1;
        }

        fn on_cancel(&self, _request: &ImageRequest) {
            self.counts.lock().1 += 1;
        }

        fn on_success(&self, _request: &ImageRequest, _result: &SuccessResult) {
            self.counts.lock().2 += 1;
        }

        fn on_error(&self, _request: &ImageRequest, _result: &ErrorResult) {
            self.counts.lock().3 += 1;
        }
    }
}
