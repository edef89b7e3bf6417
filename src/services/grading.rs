//! Scoring of a submitted module attempt.
//!
//! Grading is pure: it takes the module's resolved elements in presentation order and the
//! learner's answers, and returns the raw score, the max score and the answers with their
//! `correct` flags set.

use std::collections::BTreeMap;

use regex::Regex;
use thiserror::Error;

use crate::core::config::{GradingSettings, MissingElementPolicy};
use crate::db::models::{Answer, Choice, Element, ModuleElement};
use crate::db::types::ElementKind;

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct GradingOptions {
    pub(crate) missing_elements: MissingElementPolicy,
    pub(crate) text_regex_matching: bool,
}

impl GradingOptions {
    pub(crate) fn from_settings(settings: &GradingSettings) -> Self {
        Self {
            missing_elements: settings.missing_elements,
            text_regex_matching: settings.text_regex_matching,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum GradingError {
    #[error("element {0} referenced by the module does not exist")]
    MissingElement(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GradeOutcome {
    pub(crate) score: i32,
    pub(crate) max_score: i32,
    pub(crate) answers: BTreeMap<String, Answer>,
}

impl GradeOutcome {
    pub(crate) fn percentage(&self) -> i32 {
        percentage(self.score, self.max_score)
    }
}

pub(crate) fn percentage(score: i32, max_score: i32) -> i32 {
    if max_score > 0 {
        score * 100 / max_score
    } else {
        0
    }
}

pub(crate) fn passed(percentage: i32, min_passing: i32) -> bool {
    percentage >= min_passing
}

pub(crate) fn grade(
    items: &[(ModuleElement, Option<Element>)],
    mut answers: BTreeMap<String, Answer>,
    options: GradingOptions,
) -> Result<GradeOutcome, GradingError> {
    for answer in answers.values_mut() {
        answer.correct = false;
    }

    let mut score = 0;
    let mut max_score = 0;

    for (link, element) in items {
        let Some(element) = element else {
            match options.missing_elements {
                MissingElementPolicy::Exclude => continue,
                MissingElementPolicy::Penalize => {
                    max_score += 1;
                    continue;
                }
                MissingElementPolicy::Reject => {
                    return Err(GradingError::MissingElement(link.element_id));
                }
            }
        };

        let kind = element.kind();
        if !kind.is_graded() {
            continue;
        }
        max_score += 1;

        let Some(answer) = answers.get_mut(&link.element_id.to_string()) else {
            continue;
        };

        if is_correct(kind, element, answer, options) {
            answer.correct = true;
            score += 1;
        }
    }

    Ok(GradeOutcome { score, max_score, answers })
}

fn is_correct(kind: ElementKind, element: &Element, answer: &Answer, options: GradingOptions) -> bool {
    match kind {
        ElementKind::Single | ElementKind::Multiple => choices_match(&answer.answer, &element.choices),
        ElementKind::Text => text_matches(&element.text_regex, &answer.answer_text, options),
        ElementKind::Essay => !answer.answer_essay.is_empty(),
        ElementKind::Project => answer.project_id > 0,
        ElementKind::Content | ElementKind::Unknown => false,
    }
}

/// Positional comparison over the shorter of the two lists. Choices past the end of the
/// submission are not checked.
fn choices_match(selected: &[bool], choices: &[Choice]) -> bool {
    selected.iter().zip(choices).all(|(picked, choice)| *picked == choice.correct)
}

fn text_matches(pattern: &str, text: &str, options: GradingOptions) -> bool {
    if pattern.is_empty() || text.is_empty() {
        return false;
    }
    if !options.text_regex_matching {
        return true;
    }

    match Regex::new(pattern) {
        Ok(regex) => regex.is_match(text),
        Err(err) => {
            tracing::warn!(error = %err, pattern, "element has an invalid text regex");
            false
        }
    }
}
