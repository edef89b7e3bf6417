pub(crate) mod attempts;
pub(crate) mod auth;
pub(crate) mod content;
pub(crate) mod errors;
pub(crate) mod extractors;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod progress;
pub(crate) mod roles;
pub(crate) mod router;
pub(crate) mod routes;
pub(crate) mod users;
pub(crate) mod validation;
