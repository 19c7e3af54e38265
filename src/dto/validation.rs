//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest accepted match, team or player name.
pub const MAX_NAME_LEN: usize = 64;

/// Validates that a display name is not blank and fits in [`MAX_NAME_LEN`] characters.
///
/// # Examples
///
/// ```ignore
/// validate_name("Lions")   // Ok
/// validate_name("   ")     // Err - blank
/// ```
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("name_blank");
        err.message = Some("Name must not be blank".into());
        return Err(err);
    }

    let length = trimmed.chars().count();
    if length > MAX_NAME_LEN {
        let mut err = ValidationError::new("name_length");
        err.message = Some(
            format!("Name must be at most {MAX_NAME_LEN} characters (got {length})").into(),
        );
        return Err(err);
    }

    Ok(())
}
