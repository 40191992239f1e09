//! Unified error handling for the profile-segmenter library.
//!
//! Segmentation itself degrades numerically instead of failing. This type is
//! only returned by the strict surfaces: parameter validation, JSON configs,
//! `try_segment`, and producers whose consumer went away.

use std::fmt;

/// Unified error type for profile-segmenter operations.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentationError {
    /// Profile has insufficient points for the chosen strategy
    InsufficientPoints {
        point_count: usize,
        minimum_required: usize,
    },
    /// Profile contains a point that cannot be segmented
    InvalidPoints { index: usize, message: String },
    /// Parameter or configuration error
    ConfigError { message: String },
    /// Consumer dropped the receiving end of a progressive detection
    Cancelled { emitted: usize },
    /// Generic internal error
    Internal { message: String },
}

impl fmt::Display for SegmentationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentationError::InsufficientPoints {
                point_count,
                minimum_required,
            } => {
                write!(
                    f,
                    "Profile has {} points, minimum {} required",
                    point_count, minimum_required
                )
            }
            SegmentationError::InvalidPoints { index, message } => {
                write!(f, "Invalid point at index {}: {}", index, message)
            }
            SegmentationError::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            SegmentationError::Cancelled { emitted } => {
                write!(
                    f,
                    "Detection cancelled by consumer after {} segments",
                    emitted
                )
            }
            SegmentationError::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for SegmentationError {}

impl From<serde_json::Error> for SegmentationError {
    fn from(err: serde_json::Error) -> Self {
        SegmentationError::ConfigError {
            message: err.to_string(),
        }
    }
}

/// Result type alias for profile-segmenter operations.
pub type Result<T> = std::result::Result<T, SegmentationError>;

/// Extension trait for converting Option to SegmentationError.
pub trait OptionExt<T> {
    /// Convert Option to Result with insufficient points error.
    fn ok_or_insufficient_points(self, point_count: usize, minimum: usize) -> Result<T>;

    /// Convert Option to Result with generic internal error.
    fn ok_or_internal(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_insufficient_points(self, point_count: usize, minimum: usize) -> Result<T> {
        self.ok_or_else(|| SegmentationError::InsufficientPoints {
            point_count,
            minimum_required: minimum,
        })
    }

    fn ok_or_internal(self, message: &str) -> Result<T> {
        self.ok_or_else(|| SegmentationError::Internal {
            message: message.to_string(),
        })
    }
}

/// Reject a parameter that is NaN, infinite or negative.
pub(crate) fn ensure_non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SegmentationError::ConfigError {
            message: format!("{} must be a finite non-negative number, got {}", name, value),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SegmentationError::InsufficientPoints {
            point_count: 1,
            minimum_required: 5,
        };
        assert!(err.to_string().contains("1 points"));
        assert!(err.to_string().contains("minimum 5"));
    }

    #[test]
    fn test_option_ext() {
        let none: Option<i32> = None;
        let result = none.ok_or_insufficient_points(0, 2);
        assert!(matches!(
            result,
            Err(SegmentationError::InsufficientPoints { .. })
        ));
        assert_eq!(Some(3).ok_or_internal("unused"), Ok(3));
    }

    #[test]
    fn test_ensure_non_negative() {
        assert!(ensure_non_negative("threshold", 0.0).is_ok());
        assert!(ensure_non_negative("threshold", -1.0).is_err());
        assert!(ensure_non_negative("threshold", f64::NAN).is_err());
    }

    #[test]
    fn test_json_error_maps_to_config_error() {
        let err: SegmentationError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, SegmentationError::ConfigError { .. }));
    }
}
