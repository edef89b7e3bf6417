use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    routing::{delete, get, post, put},
    Json,
};

use crate::api::errors::ApiError;
use crate::api::extractors::AppJson;
use crate::api::router::RouteTable;
use crate::api::validation::{parse_id, validate_payload};
use crate::core::state::AppState;
use crate::db::models::{Element, Module, ModuleElement};
use crate::repositories::{self, module_elements};
use crate::schemas::content::{ElementPayload, ModuleElementPayload, ModulePayload};
use crate::schemas::MessageResponse;

pub(crate) fn routes(table: RouteTable) -> RouteTable {
    table
        .route(Method::POST, "/module", post(create_module))
        .route(Method::GET, "/module", get(list_modules))
        .route(Method::GET, "/module/:id", get(get_module))
        .route(Method::PUT, "/module/:id", put(update_module))
        .route(Method::POST, "/element", post(create_element))
        .route(Method::GET, "/element/:id", get(get_element))
        .route(Method::PUT, "/element/:id", put(update_element))
        .route(Method::POST, "/moduleelement", post(link_element))
        .route(Method::GET, "/module/:id/moduleelement", get(list_links))
        .route(Method::DELETE, "/moduleelement/:id", delete(unlink_element))
}

async fn create_module(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ModulePayload>,
) -> Result<(StatusCode, Json<Module>), ApiError> {
    validate_payload(&payload)?;

    let mut module = payload.into_module(0);
    repositories::create(state.store(), &mut module).await?;
    tracing::info!(module_id = module.id, name = %module.name, "module created");

    Ok((StatusCode::CREATED, Json(module)))
}

async fn list_modules(State(state): State<AppState>) -> Result<Json<Vec<Module>>, ApiError> {
    let mut modules: Vec<Module> = repositories::list(state.store()).await?;
    modules.sort_by_key(|module| module.sort_key);
    Ok(Json(modules))
}

async fn get_module(
    State(state): State<AppState>,
    Path(module_id): Path<String>,
) -> Result<Json<Module>, ApiError> {
    let module_id = parse_id(&module_id, "module")?;
    repositories::find::<Module>(state.store(), module_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Module not found".to_string()))
}

async fn update_module(
    State(state): State<AppState>,
    Path(module_id): Path<String>,
    AppJson(payload): AppJson<ModulePayload>,
) -> Result<Json<Module>, ApiError> {
    let module_id = parse_id(&module_id, "module")?;
    validate_payload(&payload)?;

    let module = payload.into_module(module_id);
    if !repositories::save(state.store(), &module).await? {
        return Err(ApiError::NotFound("Module not found".to_string()));
    }
    Ok(Json(module))
}

async fn create_element(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ElementPayload>,
) -> Result<(StatusCode, Json<Element>), ApiError> {
    validate_payload(&payload)?;

    let mut element = payload.into_element(0);
    repositories::create(state.store(), &mut element).await?;
    tracing::info!(element_id = element.id, kind = %element.element_type, "element created");

    Ok((StatusCode::CREATED, Json(element)))
}

async fn get_element(
    State(state): State<AppState>,
    Path(element_id): Path<String>,
) -> Result<Json<Element>, ApiError> {
    let element_id = parse_id(&element_id, "element")?;
    repositories::find::<Element>(state.store(), element_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Element not found".to_string()))
}

async fn update_element(
    State(state): State<AppState>,
    Path(element_id): Path<String>,
    AppJson(payload): AppJson<ElementPayload>,
) -> Result<Json<Element>, ApiError> {
    let element_id = parse_id(&element_id, "element")?;
    validate_payload(&payload)?;

    let element = payload.into_element(element_id);
    if !repositories::save(state.store(), &element).await? {
        return Err(ApiError::NotFound("Element not found".to_string()));
    }
    Ok(Json(element))
}

async fn link_element(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ModuleElementPayload>,
) -> Result<(StatusCode, Json<ModuleElement>), ApiError> {
    let mut link = payload.into_link();

    if repositories::find::<Module>(state.store(), link.module_id).await?.is_none() {
        return Err(ApiError::NotFound("Module not found".to_string()));
    }
    if repositories::find::<Element>(state.store(), link.element_id).await?.is_none() {
        return Err(ApiError::NotFound("Element not found".to_string()));
    }

    repositories::create(state.store(), &mut link).await?;
    Ok((StatusCode::CREATED, Json(link)))
}

async fn list_links(
    State(state): State<AppState>,
    Path(module_id): Path<String>,
) -> Result<Json<Vec<ModuleElement>>, ApiError> {
    let module_id = parse_id(&module_id, "module")?;
    Ok(Json(module_elements::for_module(state.store(), module_id).await?))
}

async fn unlink_element(
    State(state): State<AppState>,
    Path(link_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let link_id = parse_id(&link_id, "module element")?;
    if !repositories::remove::<ModuleElement>(state.store(), link_id).await? {
        return Err(ApiError::NotFound("Module element not found".to_string()));
    }
    Ok(Json(MessageResponse::new("Module element removed")))
}
