use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::schemas::user::UserResponse;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct LoginRequest {
    #[validate(length(min = 1, message = "username must not be empty"))]
    pub(crate) username: String,
    #[validate(length(min = 1, message = "password must not be empty"))]
    pub(crate) password: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginResponse {
    pub(crate) user: UserResponse,
    pub(crate) redirect_path: String,
}
