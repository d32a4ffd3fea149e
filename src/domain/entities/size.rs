//! Requested image dimensions, scaling and precision.

use serde::{Deserialize, Serialize};

/// One axis of a requested size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    /// An exact pixel count.
    Pixels(u32),
    /// No constraint on this axis; the source value is used.
    Undefined,
}

impl Dimension {
    /// Returns the pixel count or the given fallback.
    #[must_use]
    pub const fn px_or(self, fallback: u32) -> u32 {
        match self {
            Self::Pixels(px) => px,
            Self::Undefined => fallback,
        }
    }

    /// Returns true if this axis has no constraint.
    #[must_use]
    pub const fn is_undefined(self) -> bool {
        matches!(self, Self::Undefined)
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pixels(px) => write!(f, "{px}"),
            Self::Undefined => write!(f, "undefined"),
        }
    }
}

/// Target size of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    /// Horizontal constraint.
    pub width: Dimension,
    /// Vertical constraint.
    pub height: Dimension,
}

impl Size {
    /// The source's original size.
    pub const ORIGINAL: Self = Self {
        width: Dimension::Undefined,
        height: Dimension::Undefined,
    };

    /// Creates a size with both axes fixed.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self {
            width: Dimension::Pixels(width),
            height: Dimension::Pixels(height),
        }
    }

    /// Returns true if neither axis is constrained.
    #[must_use]
    pub const fn is_original(&self) -> bool {
        self.width.is_undefined() && self.height.is_undefined()
    }
}

impl Default for Size {
    fn default() -> Self {
        Self::ORIGINAL
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Size({}, {})", self.width, self.height)
    }
}

/// How a source is fit into the requested size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    /// Fill the requested size; one axis may overflow.
    Fill,
    /// Fit inside the requested size.
    #[default]
    Fit,
}

/// Whether the produced image must match the requested size exactly.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// Output dimensions must match the requested size.
    Exact,
    /// Output may be larger or smaller than the requested size.
    Inexact,
    /// Inexact when the size comes from the target itself, exact otherwise.
    #[default]
    Automatic,
}

/// Computes the factor that scales `src` into `dst` under `scale`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn size_multiplier(src_width: u32, src_height: u32, dst_width: u32, dst_height: u32, scale: Scale) -> f64 {
    let width_percent = f64::from(dst_width) / f64::from(src_width.max(1));
    let height_percent = f64::from(dst_height) / f64::from(src_height.max(1));
    match scale {
        Scale::Fill => width_percent.max(height_percent),
        Scale::Fit => width_percent.min(height_percent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_original_size() {
        assert!(Size::ORIGINAL.is_original());
        assert!(!Size::new(1, 1).is_original());
        assert_eq!(Size::default(), Size::ORIGINAL);
    }

    #[test]
    fn test_size_display() {
        assert_eq!(Size::new(100, 50).to_string(), "Size(100, 50)");
        assert_eq!(Size::ORIGINAL.to_string(), "Size(undefined, undefined)");
    }

    #[test]
    fn test_size_multiplier() {
        assert!((size_multiplier(200, 100, 100, 100, Scale::Fit) - 0.5).abs() < f64::EPSILON);
        assert!((size_multiplier(200, 100, 100, 100, Scale::Fill) - 1.0).abs() < f64::EPSILON);
    }
}
