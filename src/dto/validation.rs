//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::services::session_service::{MAX_KEY_CHARS, MAX_NICKNAME_CHARS, is_valid_key};

/// Validates that a nickname is non-blank and at most [`MAX_NICKNAME_CHARS`] characters once trimmed.
///
/// # Examples
///
/// ```ignore
/// validate_nickname("ann")    // Ok
/// validate_nickname("   ")    // Err - blank
/// ```
pub fn validate_nickname(nickname: &str) -> Result<(), ValidationError> {
    let trimmed = nickname.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("nickname_blank");
        err.message = Some("Nickname must not be blank".into());
        return Err(err);
    }

    let count = trimmed.chars().count();
    if count > MAX_NICKNAME_CHARS {
        let mut err = ValidationError::new("nickname_length");
        err.message = Some(
            format!("Nickname must be at most {MAX_NICKNAME_CHARS} characters (got {count})")
                .into(),
        );
        return Err(err);
    }

    Ok(())
}

/// Validates a session or question id taken from a request body.
pub fn validate_key(key: &str) -> Result<(), ValidationError> {
    if is_valid_key(key) {
        return Ok(());
    }
    let mut err = ValidationError::new("key_format");
    err.message = Some(
        format!("Ids hold 1 to {MAX_KEY_CHARS} letters, digits, `-` or `_`").into(),
    );
    Err(err)
}
