//! Exit codes for the converter binary
//!
//! Scripts can tell a resumable stop from a hard failure without parsing
//! output.

use crate::error::ConverterError;
use crate::types::ConversionStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Source exhausted, every batch handled
    Success = 0,

    /// A batch failed or the destination could not be written mid-run
    ConversionFailed = 1,

    /// Invalid flags or configuration
    ConfigError = 2,

    /// The event source could not be read
    SourceUnavailable = 3,

    /// The destination could not be opened or initialized
    DestinationError = 4,

    /// Stopped by an interrupt; rerun with `--resume`
    Interrupted = 5,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ExitCode::Success
    }

    /// Exit code for a run that returned statistics
    pub fn from_stats(stats: &ConversionStats) -> Self {
        if stats.interrupted {
            ExitCode::Interrupted
        } else {
            ExitCode::Success
        }
    }
}

impl From<&ConverterError> for ExitCode {
    fn from(err: &ConverterError) -> Self {
        match err {
            ConverterError::Config(_) => ExitCode::ConfigError,
            ConverterError::Schema(_) | ConverterError::Destination { .. } => {
                ExitCode::DestinationError
            }
            ConverterError::SourceUnavailable { .. } => ExitCode::SourceUnavailable,
            ConverterError::BatchFailed { .. } => ExitCode::ConversionFailed,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SourceError, StoreError};

    #[test]
    fn test_error_mapping() {
        assert_eq!(
            ExitCode::from(&ConverterError::Config("bad".to_string())),
            ExitCode::ConfigError
        );
        assert_eq!(
            ExitCode::from(&ConverterError::Schema(StoreError::Schema("x".to_string()))),
            ExitCode::DestinationError
        );
        let source_err = ConverterError::SourceUnavailable {
            source: SourceError::Unavailable("reset".to_string()),
            checkpoint: 0,
            stats: Box::default(),
        };
        assert_eq!(ExitCode::from(&source_err).as_i32(), 3);

        let destination_err = ConverterError::Destination {
            source: StoreError::Transient("disk I/O error".to_string()),
            checkpoint: 4,
            stats: Box::default(),
        };
        assert_eq!(ExitCode::from(&destination_err), ExitCode::DestinationError);
    }

    #[test]
    fn test_interrupted_run_is_not_success() {
        let stats = ConversionStats {
            interrupted: true,
            ..Default::default()
        };
        assert_eq!(ExitCode::from_stats(&stats), ExitCode::Interrupted);
        assert!(!ExitCode::Interrupted.is_success());
        assert!(ExitCode::from_stats(&ConversionStats::default()).is_success());
    }
}
