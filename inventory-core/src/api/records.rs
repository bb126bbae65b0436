use axum::extract::{Path, State};
use axum::Extension;
use axum::http::StatusCode;
use axum::response::Json;
use uuid::Uuid;

use super::middleware::CurrentUser;
use crate::error::AppResult;
use crate::models::product::{CreateProduct, UpdateProduct};
use crate::models::purchase_return::{CreatePurchaseReturn, UpdateReturnStatus};
use crate::models::voucher::{CreatePurchase, CreateSale, UpdateVoucher};
use crate::models::{Product, Purchase, PurchaseReturn, Sale};
use crate::AppState;

// Products

pub async fn list_products(State(state): State<AppState>) -> AppResult<Json<Vec<Product>>> {
    Ok(Json(state.products.list().await?))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Product>> {
    Ok(Json(state.products.get(id).await?))
}

pub async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<CreateProduct>,
) -> AppResult<(StatusCode, Json<Product>)> {
    let product = state.products.add_product(input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateProduct>,
) -> AppResult<Json<Product>> {
    Ok(Json(state.products.edit_product(id, patch).await?))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.products.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Sales

pub async fn list_sales(State(state): State<AppState>) -> AppResult<Json<Vec<Sale>>> {
    Ok(Json(state.sales.list().await?))
}

pub async fn get_sale(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<Sale>> {
    Ok(Json(state.sales.get(id).await?))
}

pub async fn create_sale(
    State(state): State<AppState>,
    Json(input): Json<CreateSale>,
) -> AppResult<(StatusCode, Json<Sale>)> {
    let sale = state.sales.record_sale(input).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

pub async fn update_sale(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateVoucher>,
) -> AppResult<Json<Sale>> {
    Ok(Json(state.sales.edit_sale(id, patch).await?))
}

pub async fn delete_sale(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
    state.sales.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Purchases

pub async fn list_purchases(State(state): State<AppState>) -> AppResult<Json<Vec<Purchase>>> {
    Ok(Json(state.purchases.list().await?))
}

pub async fn get_purchase(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Purchase>> {
    Ok(Json(state.purchases.get(id).await?))
}

pub async fn create_purchase(
    State(state): State<AppState>,
    Json(input): Json<CreatePurchase>,
) -> AppResult<(StatusCode, Json<Purchase>)> {
    let purchase = state.purchases.record_purchase(input).await?;
    Ok((StatusCode::CREATED, Json(purchase)))
}

pub async fn update_purchase(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateVoucher>,
) -> AppResult<Json<Purchase>> {
    Ok(Json(state.purchases.edit_purchase(id, patch).await?))
}

pub async fn delete_purchase(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.purchases.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Purchase returns

pub async fn list_purchase_returns(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<PurchaseReturn>>> {
    Ok(Json(state.purchase_returns.list().await?))
}

pub async fn get_purchase_return(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PurchaseReturn>> {
    Ok(Json(state.purchase_returns.get(id).await?))
}

pub async fn create_purchase_return(
    State(state): State<AppState>,
    Json(input): Json<CreatePurchaseReturn>,
) -> AppResult<(StatusCode, Json<PurchaseReturn>)> {
    let created = state.purchase_returns.create(input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Defaults `processed_by` to the caller's email.
pub async fn update_purchase_return_status(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(mut update): Json<UpdateReturnStatus>,
) -> AppResult<Json<PurchaseReturn>> {
    if update.processed_by.is_none() {
        update.processed_by = Some(user.email);
    }
    Ok(Json(state.purchase_returns.update_status(id, update).await?))
}

pub async fn delete_purchase_return(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.purchase_returns.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
