use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::db::types::ElementKind;

/// A stored entity kind. The numeric id is the store key and is not part of the stored
/// document; it is filled back in on load.
pub(crate) trait Entity: Serialize + serde::de::DeserializeOwned + Send + Sync {
    const KIND: &'static str;

    fn id(&self) -> i64;
    fn set_id(&mut self, id: i64);
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Module {
    pub(crate) id: i64,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) time_limit: i64,
    pub(crate) max_attempts: i64,
    pub(crate) min_passing: i32,
    pub(crate) sort_key: i64,
    pub(crate) course_id: i64,
    pub(crate) owner_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Choice {
    pub(crate) text: String,
    pub(crate) correct: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Element {
    pub(crate) id: i64,
    pub(crate) text: String,
    #[serde(rename = "type")]
    pub(crate) element_type: String,
    pub(crate) image_location: String,
    pub(crate) image_caption: String,
    pub(crate) image_credit: String,
    pub(crate) video_location: String,
    pub(crate) video_caption: String,
    pub(crate) video_credit: String,
    pub(crate) choices: Vec<Choice>,
    pub(crate) text_regex: String,
    pub(crate) essay_regex: String,
    pub(crate) project_id: i64,
    pub(crate) owner_id: i64,
}

impl Element {
    pub(crate) fn kind(&self) -> ElementKind {
        ElementKind::parse(&self.element_type)
    }

    /// Copy with every choice's `correct` flag cleared.
    pub(crate) fn sanitized(&self) -> Self {
        let mut element = self.clone();
        for choice in &mut element.choices {
            choice.correct = false;
        }
        element
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ModuleElement {
    pub(crate) id: i64,
    pub(crate) module_id: i64,
    pub(crate) element_id: i64,
    pub(crate) sort_key: i64,
}

/// A learner's answer to one element. `correct` is owned by grading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Answer {
    pub(crate) answer: Vec<bool>,
    pub(crate) answer_text: String,
    pub(crate) answer_essay: String,
    pub(crate) project_id: i64,
    pub(crate) correct: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct UserModule {
    pub(crate) user_id: i64,
    pub(crate) module_id: i64,
    pub(crate) answers: BTreeMap<String, Answer>,
    pub(crate) date: String,
    pub(crate) score: i32,
    pub(crate) time_passed: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct User {
    pub(crate) id: i64,
    pub(crate) username: String,
    pub(crate) email: String,
    pub(crate) password: String,
    pub(crate) firstname: String,
    pub(crate) lastname: String,
    pub(crate) roles: Vec<String>,
    pub(crate) modules: Vec<UserModule>,
    pub(crate) bio: String,
    pub(crate) avatar: String,
    pub(crate) created_on: String,
}

impl User {
    pub(crate) fn module_attempt(&self, module_id: i64) -> Option<&UserModule> {
        self.modules.iter().find(|entry| entry.module_id == module_id)
    }

    /// Replace the attempt for the same module in place, or append it.
    pub(crate) fn upsert_module_attempt(&mut self, attempt: UserModule) {
        match self.modules.iter_mut().find(|entry| entry.module_id == attempt.module_id) {
            Some(existing) => *existing = attempt,
            None => self.modules.push(attempt),
        }
    }

    /// Returns whether an attempt was removed.
    pub(crate) fn remove_module_attempt(&mut self, module_id: i64) -> bool {
        let before = self.modules.len();
        self.modules.retain(|entry| entry.module_id != module_id);
        self.modules.len() != before
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Role {
    pub(crate) id: i64,
    pub(crate) name: String,
    pub(crate) numeric_value: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Route {
    pub(crate) id: i64,
    pub(crate) name: String,
    #[serde(rename = "numeric_value", alias = "permission_level")]
    pub(crate) permission_level: u32,
}

impl Entity for Module {
    const KIND: &'static str = "module";

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

impl Entity for Element {
    const KIND: &'static str = "element";

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

impl Entity for ModuleElement {
    const KIND: &'static str = "module_element";

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

impl Entity for User {
    const KIND: &'static str = "user";

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

impl Entity for Role {
    const KIND: &'static str = "role";

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

impl Entity for Route {
    const KIND: &'static str = "route";

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn answer_keeps_grading_flag_through_json() {
        let answer = Answer {
            answer: vec![true, false],
            answer_text: "ok".to_string(),
            correct: true,
            ..Answer::default()
        };

        let encoded = serde_json::to_value(&answer).expect("encode");
        assert_eq!(encoded["correct"], true);
        let decoded: Answer = serde_json::from_value(encoded).expect("decode");
        assert_eq!(decoded, answer);
    }

    #[test]
    fn partial_answer_payload_fills_defaults() {
        let answer: Answer = serde_json::from_value(json!({"answer_text": "x"})).expect("decode");
        assert!(answer.answer.is_empty());
        assert_eq!(answer.project_id, 0);
        assert!(!answer.correct);
    }

    #[test]
    fn element_type_uses_wire_name() {
        let element: Element =
            serde_json::from_value(json!({"type": "single", "choices": [{"text": "a", "correct": true}]}))
                .expect("decode");
        assert_eq!(element.kind(), ElementKind::Single);
        assert!(element.choices[0].correct);
        assert!(!element.sanitized().choices[0].correct);
        assert_eq!(serde_json::to_value(&element).unwrap()["type"], "single");
    }

    #[test]
    fn route_level_accepts_both_field_names() {
        let legacy: Route = serde_json::from_value(json!({"name": "/a_GET", "numeric_value": 2}))
            .expect("legacy");
        let named: Route =
            serde_json::from_value(json!({"name": "/a_GET", "permission_level": 4})).expect("named");
        assert_eq!(legacy.permission_level, 2);
        assert_eq!(named.permission_level, 4);
    }

    #[test]
    fn upsert_replaces_matching_module_only() {
        let mut user = User::default();
        user.upsert_module_attempt(UserModule { module_id: 1, score: 10, ..UserModule::default() });
        user.upsert_module_attempt(UserModule { module_id: 2, score: 20, ..UserModule::default() });
        user.upsert_module_attempt(UserModule { module_id: 1, score: 90, ..UserModule::default() });

        assert_eq!(user.modules.len(), 2);
        assert_eq!(user.module_attempt(1).map(|entry| entry.score), Some(90));
        assert!(user.remove_module_attempt(1));
        assert!(!user.remove_module_attempt(1));
        assert_eq!(user.modules.len(), 1);
    }
}
