//! Pipeline services shared by the engine and the loader.

pub mod memory_cache_service;
pub mod request_service;

pub use memory_cache_service::MemoryCacheService;
pub use request_service::RequestService;
