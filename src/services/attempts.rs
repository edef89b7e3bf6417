//! Start, submit, review and reset of module attempts.
//!
//! "Start" is stateless: it can be called any number of times and only reads. "Submit"
//! grades, then writes the user record exactly once at the end.

use thiserror::Error;

use crate::core::time;
use crate::db::models::{Element, Module, ModuleElement, User, UserModule};
use crate::repositories::{self, elements, EntityStore, StoreError};
use crate::schemas::attempt::{
    ModuleResultsResponse, ModuleSubmission, StartModuleResponse, SubmitModuleResponse,
};
use crate::services::grading::{self, GradingError, GradingOptions};

pub(crate) const PASS_FEEDBACK: &str = "Congratulations! You completed this module successfully.";
pub(crate) const FAIL_FEEDBACK: &str =
    "You did not meet the passing criteria for this module. Please review the material and try again.";

#[derive(Debug, Error)]
pub(crate) enum AttemptError {
    #[error("Module not found")]
    ModuleNotFound,
    #[error("User not found")]
    UserNotFound,
    #[error("No results found for this module")]
    ResultsNotFound,
    #[error(transparent)]
    Grading(#[from] GradingError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub(crate) async fn load_module(
    store: &dyn EntityStore,
    module_id: i64,
) -> Result<Module, AttemptError> {
    repositories::find::<Module>(store, module_id).await?.ok_or(AttemptError::ModuleNotFound)
}

async fn load_user(store: &dyn EntityStore, user_id: i64) -> Result<User, AttemptError> {
    repositories::find::<User>(store, user_id).await?.ok_or(AttemptError::UserNotFound)
}

fn present_elements(resolved: Vec<(ModuleElement, Option<Element>)>) -> Vec<Element> {
    resolved.into_iter().filter_map(|(_, element)| element).collect()
}

pub(crate) async fn start(
    store: &dyn EntityStore,
    module_id: i64,
) -> Result<StartModuleResponse, AttemptError> {
    let module = load_module(store, module_id).await?;
    let resolved = elements::resolve_for_module(store, module_id).await?;

    let elements = present_elements(resolved).iter().map(Element::sanitized).collect();

    Ok(StartModuleResponse { module, elements, start_time: time::now_rfc3339() })
}

pub(crate) async fn submit(
    store: &dyn EntityStore,
    options: GradingOptions,
    user_id: i64,
    module_id: i64,
    submission: ModuleSubmission,
) -> Result<SubmitModuleResponse, AttemptError> {
    if submission.module_id != 0 && submission.module_id != module_id {
        tracing::warn!(
            module_id,
            body_module_id = submission.module_id,
            "submission body names a different module; using the path"
        );
    }

    let module = load_module(store, module_id).await?;
    let mut user = load_user(store, user_id).await?;
    let resolved = elements::resolve_for_module(store, module_id).await?;

    let outcome = grading::grade(&resolved, submission.answers, options)?;
    let percentage = outcome.percentage();
    let passed = grading::passed(percentage, module.min_passing);

    user.upsert_module_attempt(UserModule {
        user_id,
        module_id,
        answers: outcome.answers,
        date: time::now_rfc3339(),
        score: percentage,
        time_passed: submission.time_spent,
    });

    if !repositories::save(store, &user).await? {
        return Err(AttemptError::UserNotFound);
    }

    tracing::info!(
        user_id,
        module_id,
        score = outcome.score,
        max_score = outcome.max_score,
        percentage,
        passed,
        "module attempt graded"
    );
    crate::core::metrics::record_submission(passed);

    Ok(SubmitModuleResponse {
        score: outcome.score,
        max_score: outcome.max_score,
        passing_score: module.min_passing,
        passed,
        feedback: if passed { PASS_FEEDBACK } else { FAIL_FEEDBACK }.to_string(),
    })
}

/// The stored attempt joined with its module. With `reveal_answers` off the elements are
/// sanitized the same way as on start.
pub(crate) async fn results(
    store: &dyn EntityStore,
    user_id: i64,
    module_id: i64,
    reveal_answers: bool,
) -> Result<ModuleResultsResponse, AttemptError> {
    let user = load_user(store, user_id).await?;
    let user_module =
        user.module_attempt(module_id).cloned().ok_or(AttemptError::ResultsNotFound)?;
    let module = load_module(store, module_id).await?;

    let mut elements = present_elements(elements::resolve_for_module(store, module_id).await?);
    if !reveal_answers {
        elements = elements.iter().map(Element::sanitized).collect();
    }

    let passed = grading::passed(user_module.score, module.min_passing);
    Ok(ModuleResultsResponse { module, user_module, elements, passed })
}

/// Removes the user's attempt for the module. Returns whether one existed.
pub(crate) async fn reset(
    store: &dyn EntityStore,
    user_id: i64,
    module_id: i64,
) -> Result<bool, AttemptError> {
    let mut user = load_user(store, user_id).await?;
    if !user.remove_module_attempt(module_id) {
        return Ok(false);
    }

    if !repositories::save(store, &user).await? {
        return Err(AttemptError::UserNotFound);
    }
    tracing::info!(user_id, module_id, "module attempt reset");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::core::config::MissingElementPolicy;
    use crate::db::models::{Answer, Choice};
    use crate::repositories::memory::MemoryEntityStore;

    struct Fixture {
        store: MemoryEntityStore,
        module: Module,
        user: User,
        single: Element,
        essay: Element,
    }

    async fn fixture(min_passing: i32) -> Fixture {
        let store = MemoryEntityStore::new();

        let mut module = Module { name: "Fractions".to_string(), min_passing, ..Module::default() };
        repositories::create(&store, &mut module).await.unwrap();

        let mut single = Element {
            text: "Pick the half".to_string(),
            element_type: "single".to_string(),
            choices: vec![
                Choice { text: "1/2".to_string(), correct: true },
                Choice { text: "1/3".to_string(), correct: false },
            ],
            ..Element::default()
        };
        repositories::create(&store, &mut single).await.unwrap();

        let mut essay = Element { element_type: "essay".to_string(), ..Element::default() };
        repositories::create(&store, &mut essay).await.unwrap();

        let mut intro = Element { element_type: "content".to_string(), ..Element::default() };
        repositories::create(&store, &mut intro).await.unwrap();

        for (element_id, sort_key) in [(essay.id, 3), (single.id, 2), (intro.id, 1)] {
            let mut link = ModuleElement { module_id: module.id, element_id, sort_key, ..ModuleElement::default() };
            repositories::create(&store, &mut link).await.unwrap();
        }

        let mut user = User { username: "learner".to_string(), ..User::default() };
        repositories::create(&store, &mut user).await.unwrap();

        Fixture { store, module, user, single, essay }
    }

    fn submission(entries: Vec<(i64, Answer)>, time_spent: i64) -> ModuleSubmission {
        let answers: BTreeMap<String, Answer> =
            entries.into_iter().map(|(id, answer)| (id.to_string(), answer)).collect();
        ModuleSubmission { module_id: 0, answers, time_spent }
    }

    #[tokio::test]
    async fn start_orders_and_sanitizes_elements() {
        let fx = fixture(70).await;

        let first = start(&fx.store, fx.module.id).await.unwrap();
        let second = start(&fx.store, fx.module.id).await.unwrap();

        let kinds: Vec<&str> = first.elements.iter().map(|e| e.element_type.as_str()).collect();
        assert_eq!(kinds, vec!["content", "single", "essay"]);
        assert_eq!(first.elements, second.elements);
        assert!(first.elements.iter().flat_map(|e| &e.choices).all(|choice| !choice.correct));
        assert!(time::parse_rfc3339(&first.start_time).is_some());
    }

    #[tokio::test]
    async fn start_unknown_module_is_not_found() {
        let fx = fixture(70).await;
        assert!(matches!(start(&fx.store, 424242).await, Err(AttemptError::ModuleNotFound)));
    }

    #[tokio::test]
    async fn submit_grades_and_records_the_attempt() {
        let fx = fixture(70).await;
        let body = submission(
            vec![
                (fx.single.id, Answer { answer: vec![true, false], ..Answer::default() }),
                (fx.essay.id, Answer { answer_essay: "Halves are equal".to_string(), ..Answer::default() }),
            ],
            95,
        );

        let result =
            submit(&fx.store, GradingOptions::default(), fx.user.id, fx.module.id, body).await.unwrap();
        assert_eq!((result.score, result.max_score, result.passing_score), (2, 2, 70));
        assert!(result.passed);
        assert_eq!(result.feedback, PASS_FEEDBACK);

        let user: User = repositories::find(&fx.store, fx.user.id).await.unwrap().unwrap();
        let attempt = user.module_attempt(fx.module.id).expect("attempt");
        assert_eq!(attempt.score, 100);
        assert_eq!(attempt.time_passed, 95);
        assert_eq!(attempt.user_id, fx.user.id);
        assert!(attempt.answers[&fx.single.id.to_string()].correct);
        assert!(time::parse_rfc3339(&attempt.date).is_some());
    }

    #[tokio::test]
    async fn resubmission_replaces_the_previous_attempt() {
        let fx = fixture(70).await;
        let right = submission(vec![(fx.single.id, Answer { answer: vec![true, false], ..Answer::default() })], 10);
        let wrong = submission(vec![(fx.single.id, Answer { answer: vec![false, true], ..Answer::default() })], 20);

        submit(&fx.store, GradingOptions::default(), fx.user.id, fx.module.id, right).await.unwrap();
        let second =
            submit(&fx.store, GradingOptions::default(), fx.user.id, fx.module.id, wrong).await.unwrap();
        assert!(!second.passed);
        assert_eq!(second.feedback, FAIL_FEEDBACK);

        let user: User = repositories::find(&fx.store, fx.user.id).await.unwrap().unwrap();
        assert_eq!(user.modules.len(), 1);
        assert_eq!(user.modules[0].score, 0);
        assert_eq!(user.modules[0].time_passed, 20);
    }

    #[tokio::test]
    async fn submit_requires_module_and_user() {
        let fx = fixture(70).await;

        let missing_module =
            submit(&fx.store, GradingOptions::default(), fx.user.id, 999_999, submission(vec![], 0)).await;
        assert!(matches!(missing_module, Err(AttemptError::ModuleNotFound)));

        let missing_user =
            submit(&fx.store, GradingOptions::default(), 999_999, fx.module.id, submission(vec![], 0)).await;
        assert!(matches!(missing_user, Err(AttemptError::UserNotFound)));
    }

    #[tokio::test]
    async fn rejected_submission_persists_nothing() {
        let fx = fixture(0).await;
        let mut dangling = ModuleElement { module_id: fx.module.id, element_id: 777_777, sort_key: 9, ..ModuleElement::default() };
        repositories::create(&fx.store, &mut dangling).await.unwrap();

        let options = GradingOptions { missing_elements: MissingElementPolicy::Reject, ..GradingOptions::default() };
        let result = submit(&fx.store, options, fx.user.id, fx.module.id, submission(vec![], 0)).await;
        assert!(matches!(result, Err(AttemptError::Grading(GradingError::MissingElement(777_777)))));

        let user: User = repositories::find(&fx.store, fx.user.id).await.unwrap().unwrap();
        assert!(user.modules.is_empty());
    }

    #[tokio::test]
    async fn results_follow_the_reveal_setting() {
        let fx = fixture(70).await;
        assert!(matches!(
            results(&fx.store, fx.user.id, fx.module.id, true).await,
            Err(AttemptError::ResultsNotFound)
        ));

        let body = submission(vec![(fx.single.id, Answer { answer: vec![true], ..Answer::default() })], 5);
        submit(&fx.store, GradingOptions::default(), fx.user.id, fx.module.id, body).await.unwrap();

        let revealed = results(&fx.store, fx.user.id, fx.module.id, true).await.unwrap();
        assert_eq!(revealed.user_module.score, 50);
        assert!(!revealed.passed);
        assert!(revealed.elements.iter().flat_map(|e| &e.choices).any(|choice| choice.correct));

        let hidden = results(&fx.store, fx.user.id, fx.module.id, false).await.unwrap();
        assert!(hidden.elements.iter().flat_map(|e| &e.choices).all(|choice| !choice.correct));
    }

    #[tokio::test]
    async fn reset_is_idempotent() {
        let fx = fixture(70).await;
        let body = submission(vec![], 1);
        submit(&fx.store, GradingOptions::default(), fx.user.id, fx.module.id, body).await.unwrap();

        assert!(reset(&fx.store, fx.user.id, fx.module.id).await.unwrap());
        assert!(!reset(&fx.store, fx.user.id, fx.module.id).await.unwrap());

        let user: User = repositories::find(&fx.store, fx.user.id).await.unwrap().unwrap();
        assert!(user.modules.is_empty());
        assert!(matches!(reset(&fx.store, 31337, fx.module.id).await, Err(AttemptError::UserNotFound)));
    }
}
