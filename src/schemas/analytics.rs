use std::collections::BTreeMap;

use serde::Serialize;

use crate::db::models::Module;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub(crate) struct ElementStats {
    pub(crate) attempts: i64,
    pub(crate) correct: i64,
    pub(crate) percent_correct: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ModuleAnalyticsResponse {
    pub(crate) module: Module,
    pub(crate) total_attempts: i64,
    pub(crate) total_passed: i64,
    pub(crate) pass_rate: i64,
    pub(crate) average_score: i64,
    pub(crate) average_time: i64,
    pub(crate) element_stats: BTreeMap<String, ElementStats>,
}

/// Quiz flavour of the analytics: fixed passing threshold, no module, `question_stats`.
#[derive(Debug, Serialize)]
pub(crate) struct QuizAnalyticsResponse {
    pub(crate) total_attempts: i64,
    pub(crate) total_passed: i64,
    pub(crate) pass_rate: i64,
    pub(crate) average_score: i64,
    pub(crate) average_time: i64,
    pub(crate) question_stats: BTreeMap<String, ElementStats>,
}
