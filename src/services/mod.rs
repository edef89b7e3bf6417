pub(crate) mod analytics;
pub(crate) mod attempts;
pub(crate) mod grading;
pub(crate) mod permissions;
pub(crate) mod progress;
pub(crate) mod sessions;
