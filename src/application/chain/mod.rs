mod engine_interceptor;
mod interceptor_chain;

pub use engine_interceptor::{EngineInterceptor, ExecuteResult};
pub use interceptor_chain::{Chain, Interceptor};
