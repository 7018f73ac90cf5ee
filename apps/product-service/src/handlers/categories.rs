//! Category handlers. `GET /categories?parent_id=` narrows the list to
//! direct children; without it every active category is returned.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use catalog_core::{Category, CreateCategoryRequest, UpdateCategoryRequest};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CategoryQuery {
    pub parent_id: Option<String>,
}

pub async fn list_categories(
    State(state): State<AppState>,
    query: Result<Query<CategoryQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Category>>> {
    let Query(query) = query?;
    Ok(Json(
        state
            .catalog
            .list_categories(query.parent_id.as_deref())
            .await?,
    ))
}

pub async fn create_category(
    State(state): State<AppState>,
    payload: Result<Json<CreateCategoryRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let Json(request) = payload?;
    let category = state.catalog.create_category(request).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Category>> {
    Ok(Json(state.catalog.get_category(&id).await?))
}

pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateCategoryRequest>, JsonRejection>,
) -> ApiResult<Json<Category>> {
    let Json(request) = payload?;
    Ok(Json(state.catalog.update_category(&id, request).await?))
}

pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.catalog.delete_category(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
