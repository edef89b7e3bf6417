use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::models::{Answer, Element, Module, UserModule};

/// Upper bound for a reported attempt duration, one year in seconds.
pub(crate) const MAX_TIME_SPENT_SECONDS: i64 = 31_536_000;

/// Body of `POST /user/{userId}/module/{id}/submit`.
#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ModuleSubmission {
    #[serde(default)]
    pub(crate) module_id: i64,
    #[serde(default)]
    pub(crate) answers: BTreeMap<String, Answer>,
    /// Seconds reported by the client. Stored as given once in range.
    #[serde(default)]
    #[validate(range(min = 0, max = MAX_TIME_SPENT_SECONDS, message = "time_spent is out of range"))]
    pub(crate) time_spent: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct StartModuleResponse {
    pub(crate) module: Module,
    pub(crate) elements: Vec<Element>,
    pub(crate) start_time: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitModuleResponse {
    pub(crate) score: i32,
    pub(crate) max_score: i32,
    pub(crate) passing_score: i32,
    pub(crate) passed: bool,
    pub(crate) feedback: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ModuleResultsResponse {
    pub(crate) module: Module,
    pub(crate) user_module: UserModule,
    pub(crate) elements: Vec<Element>,
    pub(crate) passed: bool,
}
