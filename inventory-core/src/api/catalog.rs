use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::catalog::NameInput;
use crate::models::{Category, Unit};
use crate::AppState;

pub async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(state.categories.list().await?))
}

pub async fn create_category(
    State(state): State<AppState>,
    Json(input): Json<NameInput>,
) -> AppResult<(StatusCode, Json<Category>)> {
    let category = state.categories.add(&input.name).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<NameInput>,
) -> AppResult<Json<Category>> {
    Ok(Json(state.categories.edit(id, &input.name).await?))
}

pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.categories.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_units(State(state): State<AppState>) -> AppResult<Json<Vec<Unit>>> {
    Ok(Json(state.units.list().await?))
}

pub async fn create_unit(
    State(state): State<AppState>,
    Json(input): Json<NameInput>,
) -> AppResult<(StatusCode, Json<Unit>)> {
    let unit = state.units.add(&input.name).await?;
    Ok((StatusCode::CREATED, Json(unit)))
}

pub async fn update_unit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<NameInput>,
) -> AppResult<Json<Unit>> {
    Ok(Json(state.units.edit(id, &input.name).await?))
}

pub async fn delete_unit(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
    state.units.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
