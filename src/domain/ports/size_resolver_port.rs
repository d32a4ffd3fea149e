//! Port definition for resolving a request's size.

use async_trait::async_trait;

use crate::domain::entities::Size;

/// Resolves the size an image should be loaded at.
///
/// Resolution may suspend, for example until a view has been measured.
#[async_trait]
pub trait SizeResolver: Send + Sync {
    /// Returns the size to load at.
    async fn size(&self) -> Size;

    /// Returns true if the size is derived from the target itself. Used to
    /// decide whether [`Precision::Automatic`] allows inexact sizes.
    ///
    /// [`Precision::Automatic`]: crate::domain::entities::Precision::Automatic
    fn is_target_bound(&self) -> bool {
        false
    }
}

/// Resolver returning a size known up front.
#[derive(Debug, Clone, Copy)]
pub struct FixedSizeResolver {
    size: Size,
    target_bound: bool,
}

impl FixedSizeResolver {
    /// Creates a resolver for a fixed size.
    #[must_use]
    pub const fn new(size: Size) -> Self {
        Self {
            size,
            target_bound: false,
        }
    }

    /// Creates a resolver for the original size.
    #[must_use]
    pub const fn original() -> Self {
        Self::new(Size::ORIGINAL)
    }

    /// Creates a resolver for a size measured from the target.
    #[must_use]
    pub const fn measured(size: Size) -> Self {
        Self {
            size,
            target_bound: true,
        }
    }
}

#[async_trait]
impl SizeResolver for FixedSizeResolver {
    async fn size(&self) -> Size {
        self.size
    }

    fn is_target_bound(&self) -> bool {
        self.target_bound
    }
}
