use super::{find, module_elements, EntityStore, StoreError};
use crate::db::models::{Element, ModuleElement};

/// A module's links in order, each with its element when it still exists.
pub(crate) async fn resolve_for_module(
    store: &dyn EntityStore,
    module_id: i64,
) -> Result<Vec<(ModuleElement, Option<Element>)>, StoreError> {
    let links = module_elements::for_module(store, module_id).await?;
    let mut resolved = Vec::with_capacity(links.len());

    for link in links {
        let element = find::<Element>(store, link.element_id).await?;
        if element.is_none() {
            tracing::warn!(
                module_id,
                element_id = link.element_id,
                "module element points at a missing element"
            );
        }
        resolved.push((link, element));
    }

    Ok(resolved)
}
