//! Interprets free-form strings.

use std::path::PathBuf;

use crate::domain::entities::{Data, Options};
use crate::domain::ports::Mapper;

/// Maps [`Data::Text`] to a concrete source.
///
/// `data:` strings become data URIs, `http(s)://` strings URLs, `file://`
/// URIs and scheme-less strings paths. Other schemes are left alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextMapper;

impl Mapper for TextMapper {
    fn map(&self, data: &Data, _options: &Options) -> Option<Data> {
        let Data::Text(text) = data else {
            return None;
        };
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if text.starts_with("data:") {
            return Some(Data::DataUri(text.to_string()));
        }
        if let Some(path) = text.strip_prefix("file://") {
            return Some(Data::Path(PathBuf::from(path)));
        }
        if text.starts_with("http://") || text.starts_with("https://") {
            return Some(Data::Url(text.to_string()));
        }
        if text.contains("://") {
            return None;
        }
        Some(Data::Path(PathBuf::from(text)))
    }
}
