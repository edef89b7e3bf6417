use serde::Deserialize;
use validator::Validate;

use crate::db::models::{Choice, Element, Module, ModuleElement};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ModulePayload {
    #[validate(length(min = 1, max = 200, message = "name must be 1 to 200 characters"))]
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) description: String,
    #[serde(default)]
    #[validate(range(min = 0, message = "time_limit must be non-negative"))]
    pub(crate) time_limit: i64,
    #[serde(default)]
    #[validate(range(min = 0, message = "max_attempts must be non-negative"))]
    pub(crate) max_attempts: i64,
    #[serde(default)]
    #[validate(range(min = 0, max = 100, message = "min_passing must be between 0 and 100"))]
    pub(crate) min_passing: i32,
    #[serde(default)]
    pub(crate) sort_key: i64,
    #[serde(default)]
    pub(crate) course_id: i64,
    #[serde(default)]
    pub(crate) owner_id: i64,
}

impl ModulePayload {
    pub(crate) fn into_module(self, id: i64) -> Module {
        Module {
            id,
            name: self.name,
            description: self.description,
            time_limit: self.time_limit,
            max_attempts: self.max_attempts,
            min_passing: self.min_passing,
            sort_key: self.sort_key,
            course_id: self.course_id,
            owner_id: self.owner_id,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ElementPayload {
    #[serde(default)]
    pub(crate) text: String,
    #[serde(default, rename = "type")]
    #[validate(length(max = 32, message = "type is too long"))]
    pub(crate) element_type: String,
    #[serde(default)]
    pub(crate) image_location: String,
    #[serde(default)]
    pub(crate) image_caption: String,
    #[serde(default)]
    pub(crate) image_credit: String,
    #[serde(default)]
    pub(crate) video_location: String,
    #[serde(default)]
    pub(crate) video_caption: String,
    #[serde(default)]
    pub(crate) video_credit: String,
    #[serde(default)]
    pub(crate) choices: Vec<Choice>,
    #[serde(default)]
    pub(crate) text_regex: String,
    #[serde(default)]
    pub(crate) essay_regex: String,
    #[serde(default)]
    pub(crate) project_id: i64,
    #[serde(default)]
    pub(crate) owner_id: i64,
}

impl ElementPayload {
    pub(crate) fn into_element(self, id: i64) -> Element {
        Element {
            id,
            text: self.text,
            element_type: self.element_type,
            image_location: self.image_location,
            image_caption: self.image_caption,
            image_credit: self.image_credit,
            video_location: self.video_location,
            video_caption: self.video_caption,
            video_credit: self.video_credit,
            choices: self.choices,
            text_regex: self.text_regex,
            essay_regex: self.essay_regex,
            project_id: self.project_id,
            owner_id: self.owner_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModuleElementPayload {
    pub(crate) module_id: i64,
    pub(crate) element_id: i64,
    #[serde(default)]
    pub(crate) sort_key: i64,
}

impl ModuleElementPayload {
    pub(crate) fn into_link(self) -> ModuleElement {
        ModuleElement {
            id: 0,
            module_id: self.module_id,
            element_id: self.element_id,
            sort_key: self.sort_key,
        }
    }
}
