use serde_json::json;

use super::{list_where, EntityStore, StoreError};
use crate::db::models::User;

pub(crate) async fn find_by_username(
    store: &dyn EntityStore,
    username: &str,
) -> Result<Option<User>, StoreError> {
    let mut matches: Vec<User> = list_where(store, json!({ "username": username })).await?;
    Ok(if matches.is_empty() { None } else { Some(matches.swap_remove(0)) })
}
