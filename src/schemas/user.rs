use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::models::{User, UserModule};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct UserCreate {
    #[validate(length(min = 3, max = 64, message = "username must be 3 to 64 characters"))]
    pub(crate) username: String,
    pub(crate) password: String,
    #[serde(default)]
    #[validate(length(max = 254, message = "email is too long"))]
    pub(crate) email: String,
    #[serde(default)]
    pub(crate) firstname: String,
    #[serde(default)]
    pub(crate) lastname: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct UserUpdate {
    #[serde(default)]
    #[validate(length(max = 254, message = "email is too long"))]
    pub(crate) email: Option<String>,
    #[serde(default)]
    pub(crate) firstname: Option<String>,
    #[serde(default)]
    pub(crate) lastname: Option<String>,
    #[serde(default)]
    #[validate(length(max = 4000, message = "bio is too long"))]
    pub(crate) bio: Option<String>,
    #[serde(default)]
    pub(crate) avatar: Option<String>,
    #[serde(default)]
    pub(crate) roles: Option<Vec<String>>,
}

/// A user as returned over HTTP; never carries the password hash.
#[derive(Debug, Serialize)]
pub(crate) struct UserResponse {
    pub(crate) id: i64,
    pub(crate) username: String,
    pub(crate) email: String,
    pub(crate) firstname: String,
    pub(crate) lastname: String,
    pub(crate) roles: Vec<String>,
    pub(crate) modules: Vec<UserModule>,
    pub(crate) bio: String,
    pub(crate) avatar: String,
    pub(crate) created_on: String,
}

impl UserResponse {
    pub(crate) fn from_db(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            firstname: user.firstname,
            lastname: user.lastname,
            roles: user.roles,
            modules: user.modules,
            bio: user.bio,
            avatar: user.avatar,
            created_on: user.created_on,
        }
    }
}
