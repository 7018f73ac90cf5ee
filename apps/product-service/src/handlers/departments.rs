use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use catalog_core::{CreateDepartmentRequest, Department, UpdateDepartmentRequest};

use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_departments(State(state): State<AppState>) -> ApiResult<Json<Vec<Department>>> {
    Ok(Json(state.catalog.list_departments().await?))
}

pub async fn create_department(
    State(state): State<AppState>,
    payload: Result<Json<CreateDepartmentRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Department>)> {
    let Json(request) = payload?;
    let department = state.catalog.create_department(request).await?;
    Ok((StatusCode::CREATED, Json(department)))
}

pub async fn get_department(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Department>> {
    Ok(Json(state.catalog.get_department(&id).await?))
}

pub async fn update_department(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateDepartmentRequest>, JsonRejection>,
) -> ApiResult<Json<Department>> {
    let Json(request) = payload?;
    Ok(Json(state.catalog.update_department(&id, request).await?))
}

pub async fn delete_department(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.catalog.delete_department(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
