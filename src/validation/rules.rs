//! Required-field and payload checks

use crate::error::{ValidationError, ValidationResult};
use crate::types::SourceTimestamp;

/// Require a present, non-empty string field
pub fn require_text(field: &'static str, value: Option<String>) -> ValidationResult<String> {
    match value {
        None => Err(ValidationError::MissingField(field)),
        Some(v) if v.is_empty() => Err(ValidationError::EmptyField(field)),
        Some(v) => Ok(v),
    }
}

/// Require a timestamp strictly after the unix epoch
pub fn require_positive_timestamp(value: Option<SourceTimestamp>) -> ValidationResult<i64> {
    let secs = value
        .ok_or(ValidationError::MissingField("recorded_at"))?
        .unix_seconds();
    if secs <= 0 {
        return Err(ValidationError::InvalidTimestamp(secs));
    }
    Ok(secs)
}

/// Reject payloads larger than `limit` bytes
pub fn check_payload_size(payload: &str, limit: usize) -> ValidationResult<()> {
    let size = payload.len();
    if size > limit {
        return Err(ValidationError::PayloadTooLarge { size, limit });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_text_accepts_value() {
        assert_eq!(
            require_text("event_type", Some("OrderPlaced".to_string())),
            Ok("OrderPlaced".to_string())
        );
    }

    #[test]
    fn test_require_text_rejects_missing_and_empty() {
        assert_eq!(
            require_text("id", None),
            Err(ValidationError::MissingField("id"))
        );
        assert_eq!(
            require_text("stream_name", Some(String::new())),
            Err(ValidationError::EmptyField("stream_name"))
        );
    }

    #[test]
    fn test_require_positive_timestamp() {
        assert_eq!(
            require_positive_timestamp(Some(SourceTimestamp::Seconds(1700000000))),
            Ok(1700000000)
        );
        assert_eq!(
            require_positive_timestamp(Some(SourceTimestamp::Seconds(-5))),
            Err(ValidationError::InvalidTimestamp(-5))
        );
        assert_eq!(
            require_positive_timestamp(Some(SourceTimestamp::Seconds(0))),
            Err(ValidationError::InvalidTimestamp(0))
        );
        assert_eq!(
            require_positive_timestamp(None),
            Err(ValidationError::MissingField("recorded_at"))
        );
    }

    #[test]
    fn test_payload_size_limit() {
        assert!(check_payload_size("abc", 3).is_ok());
        assert_eq!(
            check_payload_size("abcd", 3),
            Err(ValidationError::PayloadTooLarge { size: 4, limit: 3 })
        );
    }
}
