use serde_json::json;

use super::{list_where, EntityStore, StoreError};
use crate::db::models::ModuleElement;

/// Links of a module in presentation order. Equal sort keys keep store order.
pub(crate) async fn for_module(
    store: &dyn EntityStore,
    module_id: i64,
) -> Result<Vec<ModuleElement>, StoreError> {
    let mut links: Vec<ModuleElement> =
        list_where(store, json!({ "module_id": module_id })).await?;
    links.sort_by_key(|link| link.sort_key);
    Ok(links)
}
