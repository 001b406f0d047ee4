//! Unified error handling for the trailmap pipeline.
//!
//! Per-item failures (`Unmatched`, `Parse`, `Coercion`, `Io`, `Document`) are
//! recoverable: the batch records them and moves on. Only `Config` aborts a run.

use std::fmt;
use std::path::{Path, PathBuf};

/// Unified error type for trailmap operations.
#[derive(Debug)]
pub enum TrailError {
    /// No ledger record corresponds to a track file
    Unmatched { file: String },
    /// Track file is malformed or holds no points
    Parse { file: String, message: String },
    /// Ledger cell could not be converted to its numeric type
    Coercion {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
    /// A single file could not be read or written
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A GeoJSON artifact exists but cannot be interpreted
    Document { path: PathBuf, message: String },
    /// Run-level misconfiguration (missing directories, bad palette, ...)
    Config { message: String },
}

impl TrailError {
    /// Build a configuration error from any message.
    pub fn config(message: impl Into<String>) -> Self {
        TrailError::Config {
            message: message.into(),
        }
    }

    /// Build a parse error for the given file.
    pub fn parse(file: impl Into<String>, message: impl Into<String>) -> Self {
        TrailError::Parse {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Whether the batch may continue past this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, TrailError::Config { .. })
    }
}

impl fmt::Display for TrailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrailError::Unmatched { file } => {
                write!(f, "No ledger record matches '{}'", file)
            }
            TrailError::Parse { file, message } => {
                write!(f, "Failed to parse track '{}': {}", file, message)
            }
            TrailError::Coercion {
                field,
                value,
                expected,
            } => {
                write!(
                    f,
                    "Field '{}' value '{}' is not a valid {}",
                    field, value, expected
                )
            }
            TrailError::Io { path, source } => {
                write!(f, "I/O error on {}: {}", path.display(), source)
            }
            TrailError::Document { path, message } => {
                write!(f, "Invalid GeoJSON document {}: {}", path.display(), message)
            }
            TrailError::Config { message } => {
                write!(f, "Configuration error: {}", message)
            }
        }
    }
}

impl std::error::Error for TrailError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TrailError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type alias for trailmap operations.
pub type Result<T> = std::result::Result<T, TrailError>;

/// Extension trait for converting Option to TrailError.
pub trait OptionExt<T> {
    /// Convert Option to Result with a configuration error.
    fn ok_or_config(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_config(self, message: &str) -> Result<T> {
        self.ok_or_else(|| TrailError::config(message))
    }
}

/// Extension trait attaching the offending path to `std::io` failures.
pub trait IoResultExt<T> {
    fn at_path(self, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn at_path(self, path: &Path) -> Result<T> {
        self.map_err(|source| TrailError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_error_display() {
        let err = TrailError::Coercion {
            field: "distance_km",
            value: "abc".to_string(),
            expected: "number",
        };
        assert!(err.to_string().contains("distance_km"));
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_only_config_is_fatal() {
        assert!(!TrailError::config("missing gpx dir").is_recoverable());
        assert!(TrailError::parse("a.gpx", "no points").is_recoverable());
        assert!(TrailError::Unmatched {
            file: "a.gpx".to_string()
        }
        .is_recoverable());
    }

    #[test]
    fn test_io_error_keeps_source_and_path() {
        let res: std::io::Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "gone",
        ));
        let err = res.at_path(Path::new("/tmp/x.gpx")).unwrap_err();
        assert!(err.to_string().contains("/tmp/x.gpx"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_option_ext() {
        let none: Option<i32> = None;
        assert!(matches!(
            none.ok_or_config("palette is empty"),
            Err(TrailError::Config { .. })
        ));
    }
}
