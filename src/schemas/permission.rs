use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct RolePayload {
    #[validate(length(min = 1, max = 64, message = "name must be 1 to 64 characters"))]
    pub(crate) name: String,
    pub(crate) numeric_value: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RouteLevelUpdate {
    #[serde(rename = "numeric_value", alias = "permission_level")]
    pub(crate) permission_level: u32,
}
