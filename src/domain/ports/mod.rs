mod decoder_port;
mod event_listener_port;
mod fetcher_port;
mod mapper_port;
mod size_resolver_port;
mod target_port;
mod transformation_port;

pub use decoder_port::{DecodeResult, Decoder};
pub use event_listener_port::{EventListener, NoopEventListener};
pub use fetcher_port::{ByteSource, FetchResult, Fetcher};
pub use mapper_port::Mapper;
pub use size_resolver_port::{FixedSizeResolver, SizeResolver};
pub use target_port::{RequestListener, Target, TargetId};
pub use transformation_port::Transformation;

#[cfg(test)]
pub use transformation_port::MockTransformation;

#[cfg(test)]
pub mod mocks {
    pub use super::decoder_port::mock::MockDecoder;
    pub use super::fetcher_port::mock::MockFetcher;
    pub use super::target_port::mock::{CountingListener, RecordingTarget, TargetEvent};
}
