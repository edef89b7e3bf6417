//! Learner progress derived from the recorded attempts, grouped by each module's `course_id`.
//!
//! A module is completed once the learner's stored score reaches its `min_passing`. Modules
//! without a course (`course_id <= 0`) are not part of any progress report.

use std::collections::BTreeMap;

use serde_json::json;
use thiserror::Error;

use crate::db::models::{Module, User, UserModule};
use crate::repositories::{self, EntityStore, StoreError};
use crate::schemas::progress::{
    CourseProgress, CourseProgressSummary, ModuleProgress, UserProgressSummary,
};

#[derive(Debug, Error)]
pub(crate) enum ProgressError {
    #[error("User not found")]
    UserNotFound,
    #[error("Course not found")]
    CourseNotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
}

async fn load_user(store: &dyn EntityStore, user_id: i64) -> Result<User, ProgressError> {
    repositories::find::<User>(store, user_id).await?.ok_or(ProgressError::UserNotFound)
}

fn in_course_order(modules: &mut [Module]) {
    modules.sort_by_key(|module| (module.sort_key, module.id));
}

fn module_progress(module: &Module, attempt: Option<&UserModule>) -> ModuleProgress {
    let completed = attempt.is_some_and(|attempt| attempt.score >= module.min_passing);
    ModuleProgress {
        module_id: module.id,
        module_name: module.name.clone(),
        completed,
        score: attempt.map(|attempt| attempt.score),
        attempt_count: i64::from(attempt.is_some()),
        date_completed: attempt.filter(|_| completed).map(|attempt| attempt.date.clone()),
    }
}

/// `modules` must all belong to `course_id` and be in course order.
fn course_progress(user: &User, course_id: i64, modules: &[Module]) -> CourseProgress {
    let module_progress: Vec<ModuleProgress> = modules
        .iter()
        .map(|module| module_progress(module, user.module_attempt(module.id)))
        .collect();

    let total_modules = module_progress.len() as i64;
    let completed: Vec<&ModuleProgress> =
        module_progress.iter().filter(|entry| entry.completed).collect();
    let modules_completed = completed.len() as i64;
    let progress = if total_modules > 0 { modules_completed * 100 / total_modules } else { 0 };

    // Dates are UTC RFC 3339, so string order is time order.
    let start_date = modules
        .iter()
        .filter_map(|module| user.module_attempt(module.id))
        .map(|attempt| attempt.date.as_str())
        .filter(|date| !date.is_empty())
        .min()
        .map(str::to_string);
    let completion_date = if total_modules > 0 && modules_completed == total_modules {
        completed.iter().filter_map(|entry| entry.date_completed.as_deref()).max().map(str::to_string)
    } else {
        None
    };
    let grade = if completed.is_empty() {
        None
    } else {
        let total: i64 =
            completed.iter().filter_map(|entry| entry.score).map(i64::from).sum();
        Some(total / modules_completed)
    };

    CourseProgress {
        summary: CourseProgressSummary {
            course_id,
            modules_completed,
            total_modules,
            progress,
            start_date,
            completion_date,
            grade,
        },
        module_progress,
    }
}

pub(crate) async fn user_progress(
    store: &dyn EntityStore,
    user_id: i64,
) -> Result<UserProgressSummary, ProgressError> {
    let user = load_user(store, user_id).await?;
    let modules: Vec<Module> = repositories::list(store).await?;

    let mut courses: BTreeMap<i64, Vec<Module>> = BTreeMap::new();
    for module in modules.into_iter().filter(|module| module.course_id > 0) {
        courses.entry(module.course_id).or_default().push(module);
    }

    let mut summary = UserProgressSummary {
        total_courses: courses.len() as i64,
        completed_courses: 0,
        in_progress_courses: 0,
        not_started_courses: 0,
        courses_progress: Vec::with_capacity(courses.len()),
        overall_progress: 0,
        completed_quizzes: 0,
        total_quizzes: 0,
        passed_quizzes: 0,
    };

    for (course_id, mut modules) in courses {
        in_course_order(&mut modules);
        let course = course_progress(&user, course_id, &modules);
        let attempted =
            course.module_progress.iter().filter(|entry| entry.attempt_count > 0).count() as i64;

        summary.total_quizzes += course.summary.total_modules;
        summary.completed_quizzes += attempted;
        summary.passed_quizzes += course.summary.modules_completed;

        if attempted == 0 {
            summary.not_started_courses += 1;
        } else if course.summary.modules_completed == course.summary.total_modules {
            summary.completed_courses += 1;
        } else {
            summary.in_progress_courses += 1;
        }

        summary.courses_progress.push(course.summary);
    }

    if summary.total_courses > 0 {
        let total: i64 = summary.courses_progress.iter().map(|course| course.progress).sum();
        summary.overall_progress = total / summary.total_courses;
    }

    Ok(summary)
}

pub(crate) async fn course_progress_for(
    store: &dyn EntityStore,
    user_id: i64,
    course_id: i64,
) -> Result<CourseProgress, ProgressError> {
    let user = load_user(store, user_id).await?;
    if course_id <= 0 {
        return Err(ProgressError::CourseNotFound);
    }

    let mut modules: Vec<Module> =
        repositories::list_where(store, json!({ "course_id": course_id })).await?;
    if modules.is_empty() {
        return Err(ProgressError::CourseNotFound);
    }
    in_course_order(&mut modules);

    Ok(course_progress(&user, course_id, &modules))
}
