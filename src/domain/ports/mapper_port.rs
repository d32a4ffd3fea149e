//! Port definition for mapping request data.

use crate::domain::entities::{Data, Options};

/// Converts one kind of [`Data`] into another before fetching.
pub trait Mapper: Send + Sync {
    /// Returns the mapped data, or `None` if this mapper does not apply.
    fn map(&self, data: &Data, options: &Options) -> Option<Data>;
}
