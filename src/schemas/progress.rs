use serde::Serialize;

/// One course line in a learner's progress overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct CourseProgressSummary {
    pub(crate) course_id: i64,
    pub(crate) modules_completed: i64,
    pub(crate) total_modules: i64,
    pub(crate) progress: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) completion_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) grade: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserProgressSummary {
    pub(crate) total_courses: i64,
    pub(crate) completed_courses: i64,
    pub(crate) in_progress_courses: i64,
    pub(crate) not_started_courses: i64,
    pub(crate) courses_progress: Vec<CourseProgressSummary>,
    pub(crate) overall_progress: i64,
    pub(crate) completed_quizzes: i64,
    pub(crate) total_quizzes: i64,
    pub(crate) passed_quizzes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ModuleProgress {
    pub(crate) module_id: i64,
    pub(crate) module_name: String,
    pub(crate) completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) score: Option<i32>,
    pub(crate) attempt_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) date_completed: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CourseProgress {
    #[serde(flatten)]
    pub(crate) summary: CourseProgressSummary,
    pub(crate) module_progress: Vec<ModuleProgress>,
}
