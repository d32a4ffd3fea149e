//! Host lifecycle signal observed by requests.

use std::sync::Arc;

use tokio::sync::watch;

/// State of a host lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// Created but not yet visible.
    #[default]
    Initialized,
    /// Visible and able to display images.
    Started,
    /// Hidden; requests wait before starting.
    Stopped,
    /// Torn down; attached requests are disposed.
    Destroyed,
}

impl LifecycleState {
    /// Returns true if work bound to this lifecycle may run.
    #[must_use]
    pub const fn is_started(self) -> bool {
        matches!(self, Self::Started)
    }
}

/// Observable lifecycle shared between a host and its requests.
///
/// The host drives the state with [`Lifecycle::set_state`]; requests observe
/// it through subscriptions. Each active observer is one subscription, so
/// [`Lifecycle::observer_count`] reports leaked observers directly.
#[derive(Clone)]
pub struct Lifecycle {
    state: Arc<watch::Sender<LifecycleState>>,
}

impl Lifecycle {
    /// Creates a lifecycle in the given state.
    #[must_use]
    pub fn new(initial: LifecycleState) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            state: Arc::new(state),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Moves to a new state and notifies observers.
    pub fn set_state(&self, state: LifecycleState) {
        self.state.send_replace(state);
    }

    /// Convenience for `set_state(LifecycleState::Started)`.
    pub fn start(&self) {
        self.set_state(LifecycleState::Started);
    }

    /// Convenience for `set_state(LifecycleState::Stopped)`.
    pub fn stop(&self) {
        self.set_state(LifecycleState::Stopped);
    }

    /// Convenience for `set_state(LifecycleState::Destroyed)`.
    pub fn destroy(&self) {
        self.set_state(LifecycleState::Destroyed);
    }

    /// Registers a new observer.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Number of live observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.state.receiver_count()
    }

    /// Waits until the lifecycle is started.
    ///
    /// Returns `false` if the lifecycle was destroyed first.
    pub async fn await_started(&self) -> bool {
        let mut rx = self.subscribe();
        match rx
            .wait_for(|state| state.is_started() || *state == LifecycleState::Destroyed)
            .await
        {
            Ok(state) => state.is_started(),
            Err(_) => false,
        }
    }

    /// Returns true if both handles drive the same lifecycle.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new(LifecycleState::Initialized)
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("state", &self.state())
            .field("observers", &self.observer_count())
            .finish()
    }
}
