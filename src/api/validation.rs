use validator::Validate;

use crate::api::errors::ApiError;

pub(crate) const MIN_PASSWORD_LEN: usize = 8;

/// Parses a numeric path segment; `label` names it in the 400 detail.
pub(crate) fn parse_id(raw: &str, label: &str) -> Result<i64, ApiError> {
    raw.trim().parse::<i64>().map_err(|_| ApiError::BadRequest(format!("Invalid {label} ID")))
}

pub(crate) fn validate_password_len(password: &str) -> Result<(), ApiError> {
    if password.chars().count() >= MIN_PASSWORD_LEN {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )))
    }
}

pub(crate) fn validate_payload(payload: &impl Validate) -> Result<(), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))
}
