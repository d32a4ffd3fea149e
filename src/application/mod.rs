//! Application layer: the loader, its interceptor chain and request state.

pub mod cancellation;
pub mod chain;
pub mod disposable;
pub mod loader;
pub mod registry;
pub mod request_delegate;
pub mod services;
pub mod target_slots;

pub use cancellation::CancellationToken;
pub use chain::{Chain, EngineInterceptor, ExecuteResult, Interceptor};
pub use disposable::{AttemptOutcome, Disposable};
pub use loader::{ImageLoader, ImageLoaderBuilder};
pub use registry::{ComponentRegistry, ComponentRegistryBuilder};
pub use services::{MemoryCacheService, RequestService};
