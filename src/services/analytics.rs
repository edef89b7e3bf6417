//! Aggregates over every learner's recorded attempts for one module.
//!
//! This is a full scan of the user table. Fine at the scale this service targets.

use std::collections::BTreeMap;

use crate::db::models::{User, UserModule};
use crate::repositories::{self, EntityStore};
use crate::schemas::analytics::{ElementStats, ModuleAnalyticsResponse, QuizAnalyticsResponse};
use crate::services::attempts::{load_module, AttemptError};

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct AttemptSummary {
    pub(crate) total_attempts: i64,
    pub(crate) total_passed: i64,
    pub(crate) pass_rate: i64,
    pub(crate) average_score: i64,
    pub(crate) average_time: i64,
    pub(crate) per_element: BTreeMap<String, ElementStats>,
}

pub(crate) fn summarize<'a>(
    attempts: impl IntoIterator<Item = &'a UserModule>,
    passing_threshold: i32,
) -> AttemptSummary {
    let mut summary = AttemptSummary::default();
    let mut score_total: i64 = 0;
    // Any stored i64 durations must sum without overflow.
    let mut time_total: i128 = 0;

    for attempt in attempts {
        summary.total_attempts += 1;
        if attempt.score >= passing_threshold {
            summary.total_passed += 1;
        }
        score_total += i64::from(attempt.score);
        time_total += i128::from(attempt.time_passed);

        for (element_id, answer) in &attempt.answers {
            let stats = summary.per_element.entry(element_id.clone()).or_default();
            stats.attempts += 1;
            if answer.correct {
                stats.correct += 1;
            }
        }
    }

    for stats in summary.per_element.values_mut() {
        stats.percent_correct = stats.correct as f64 / stats.attempts as f64 * 100.0;
    }

    if summary.total_attempts > 0 {
        summary.pass_rate = summary.total_passed * 100 / summary.total_attempts;
        summary.average_score = score_total / summary.total_attempts;
        summary.average_time = i64::try_from(time_total / i128::from(summary.total_attempts))
            .unwrap_or(i64::MAX);
    }

    summary
}

async fn collect_attempts(
    store: &dyn EntityStore,
    module_id: i64,
) -> Result<Vec<UserModule>, AttemptError> {
    let users: Vec<User> = repositories::list(store).await?;
    Ok(users
        .into_iter()
        .flat_map(|user| user.modules)
        .filter(|attempt| attempt.module_id == module_id)
        .collect())
}

/// Pass/fail counted against the module's own `min_passing`.
pub(crate) async fn module_analytics(
    store: &dyn EntityStore,
    module_id: i64,
) -> Result<ModuleAnalyticsResponse, AttemptError> {
    let module = load_module(store, module_id).await?;
    let attempts = collect_attempts(store, module_id).await?;
    let summary = summarize(&attempts, module.min_passing);

    Ok(ModuleAnalyticsResponse {
        module,
        total_attempts: summary.total_attempts,
        total_passed: summary.total_passed,
        pass_rate: summary.pass_rate,
        average_score: summary.average_score,
        average_time: summary.average_time,
        element_stats: summary.per_element,
    })
}

/// Pass/fail counted against a fixed threshold rather than the module's `min_passing`.
/// Does not require the module to exist.
pub(crate) async fn quiz_analytics(
    store: &dyn EntityStore,
    module_id: i64,
    passing_threshold: i32,
) -> Result<QuizAnalyticsResponse, AttemptError> {
    let attempts = collect_attempts(store, module_id).await?;
    let summary = summarize(&attempts, passing_threshold);

    Ok(QuizAnalyticsResponse {
        total_attempts: summary.total_attempts,
        total_passed: summary.total_passed,
        pass_rate: summary.pass_rate,
        average_score: summary.average_score,
        average_time: summary.average_time,
        question_stats: summary.per_element,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Answer, Module};
    use crate::repositories::memory::MemoryEntityStore;

    fn attempt(module_id: i64, score: i32, time_passed: i64, answers: &[(&str, bool)]) -> UserModule {
        UserModule {
            module_id,
            score,
            time_passed,
            answers: answers
                .iter()
                .map(|(id, correct)| (id.to_string(), Answer { correct: *correct, ..Answer::default() }))
                .collect(),
            ..UserModule::default()
        }
    }

    #[test]
    fn pass_rate_and_average_truncate() {
        let attempts = vec![attempt(1, 100, 60, &[]), attempt(1, 50, 30, &[]), attempt(1, 80, 31, &[])];
        let summary = summarize(&attempts, 70);

        assert_eq!(summary.total_attempts, 3);
        assert_eq!(summary.total_passed, 2);
        assert_eq!(summary.pass_rate, 66);
        assert_eq!(summary.average_score, 76);
        assert_eq!(summary.average_time, 40);
    }

    #[test]
    fn extreme_durations_average_without_overflow() {
        let attempts = vec![attempt(1, 100, i64::MAX, &[]), attempt(1, 100, 10, &[])];
        let summary = summarize(&attempts, 70);

        assert_eq!(summary.total_attempts, 2);
        assert_eq!(summary.average_time, i64::MAX / 2 + 5);
    }

    #[test]
    fn no_attempts_yield_zeroes() {
        let summary = summarize(&[], 70);
        assert_eq!(summary, AttemptSummary::default());
    }

    #[test]
    fn per_element_counts_answers_present() {
        let attempts = vec![
            attempt(1, 100, 0, &[("10", true), ("11", true)]),
            attempt(1, 50, 0, &[("10", false), ("11", true)]),
            attempt(1, 0, 0, &[("10", false)]),
        ];
        let summary = summarize(&attempts, 70);

        let first = &summary.per_element["10"];
        assert_eq!((first.attempts, first.correct), (3, 1));
        assert!((first.percent_correct - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(summary.per_element["11"].percent_correct, 100.0);
    }

    async fn seeded_store() -> (MemoryEntityStore, Module) {
        let store = MemoryEntityStore::new();
        let mut module = Module { min_passing: 80, ..Module::default() };
        repositories::create(&store, &mut module).await.unwrap();

        for (index, score) in [100, 75, 50].into_iter().enumerate() {
            let mut user = User { username: format!("learner-{index}"), ..User::default() };
            user.modules.push(attempt(module.id, score, 10, &[("1", score == 100)]));
            user.modules.push(attempt(module.id + 1_000, 100, 10, &[]));
            repositories::create(&store, &mut user).await.unwrap();
        }

        (store, module)
    }

    #[tokio::test]
    async fn module_analytics_uses_min_passing() {
        let (store, module) = seeded_store().await;

        let analytics = module_analytics(&store, module.id).await.unwrap();
        assert_eq!(analytics.total_attempts, 3);
        assert_eq!(analytics.total_passed, 1);
        assert_eq!(analytics.pass_rate, 33);
        assert_eq!(analytics.average_score, 75);
        assert_eq!(analytics.element_stats["1"].correct, 1);
        assert_eq!(analytics.module.id, module.id);
    }

    #[tokio::test]
    async fn quiz_analytics_uses_fixed_threshold() {
        let (store, module) = seeded_store().await;

        let analytics = quiz_analytics(&store, module.id, 70).await.unwrap();
        assert_eq!(analytics.total_passed, 2);
        assert_eq!(analytics.pass_rate, 66);
        assert_eq!(analytics.question_stats["1"].attempts, 3);
    }

    #[tokio::test]
    async fn module_analytics_requires_module() {
        let store = MemoryEntityStore::new();
        assert!(matches!(module_analytics(&store, 5).await, Err(AttemptError::ModuleNotFound)));
        assert_eq!(quiz_analytics(&store, 5, 70).await.unwrap().total_attempts, 0);
    }
}
