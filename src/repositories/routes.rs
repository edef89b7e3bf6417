use std::collections::HashSet;

use serde_json::json;

use super::{create, list, list_where, EntityStore, StoreError};
use crate::db::models::Route;

pub(crate) async fn find_by_name(
    store: &dyn EntityStore,
    name: &str,
) -> Result<Option<Route>, StoreError> {
    let mut matches: Vec<Route> = list_where(store, json!({ "name": name })).await?;
    Ok(if matches.is_empty() { None } else { Some(matches.swap_remove(0)) })
}

/// Inserts every identity the store lacks with permission level 0. Returns how many were added.
pub(crate) async fn sync(store: &dyn EntityStore, identities: &[String]) -> Result<usize, StoreError> {
    let known: HashSet<String> =
        list::<Route>(store).await?.into_iter().map(|route| route.name).collect();

    let mut inserted = 0;
    for identity in identities {
        if known.contains(identity) {
            continue;
        }

        let mut route = Route { name: identity.clone(), permission_level: 0, ..Route::default() };
        create(store, &mut route).await?;
        tracing::info!(route = %identity, "registered route as public");
        inserted += 1;
    }

    Ok(inserted)
}
