use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mercato_catalog::Product;
use mercato_sales::SaleError;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/products", get(list_products).post(create_product))
        .route(
            "/api/products/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/api/products/barcode/{barcode}", get(get_product_by_barcode))
        .route("/api/products/{id}/stock", post(adjust_stock))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ProductPayload {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub stock_quantity: i64,
    pub barcode: String,
}

#[derive(Debug, Deserialize)]
pub struct StockAdjustment {
    /// Negative to remove units, positive to restock.
    pub delta: i64,
}

#[derive(Debug, Serialize)]
pub struct StockResponse {
    pub id: Uuid,
    pub stock_quantity: i64,
}

fn validate(payload: &ProductPayload) -> Result<(), AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name must not be empty".to_string()));
    }
    if payload.barcode.trim().is_empty() {
        return Err(AppError::BadRequest("barcode must not be empty".to_string()));
    }
    if payload.price_cents < 0 {
        return Err(AppError::BadRequest("price_cents must not be negative".to_string()));
    }
    if payload.stock_quantity < 0 {
        return Err(AppError::BadRequest("stock_quantity must not be negative".to_string()));
    }
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/products
pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(state.catalog.list_products().await?))
}

/// GET /api/products/{id}
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Product>, AppError> {
    let product = state
        .catalog
        .find_product(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product not found: {id}")))?;
    Ok(Json(product))
}

/// GET /api/products/barcode/{barcode}
pub async fn get_product_by_barcode(
    State(state): State<AppState>,
    Path(barcode): Path<String>,
) -> Result<Json<Product>, AppError> {
    let product = state
        .catalog
        .find_product_by_barcode(&barcode)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product not found: {barcode}")))?;
    Ok(Json(product))
}

/// POST /api/products
pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<ProductPayload>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    validate(&payload)?;
    let product = Product {
        id: Uuid::new_v4(),
        name: payload.name,
        description: payload.description,
        price_cents: payload.price_cents,
        stock_quantity: payload.stock_quantity,
        barcode: payload.barcode,
    };
    state.catalog.save_product(&product).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /api/products/{id}
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProductPayload>,
) -> Result<Json<Product>, AppError> {
    validate(&payload)?;
    if state.catalog.find_product(id).await?.is_none() {
        return Err(AppError::NotFound(format!("product not found: {id}")));
    }
    let product = Product {
        id,
        name: payload.name,
        description: payload.description,
        price_cents: payload.price_cents,
        stock_quantity: payload.stock_quantity,
        barcode: payload.barcode,
    };
    state.catalog.save_product(&product).await?;
    Ok(Json(product))
}

/// POST /api/products/{id}/stock
///
/// Atomic stock adjustment: 409 when the result would go negative.
pub async fn adjust_stock(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(adjustment): Json<StockAdjustment>,
) -> Result<Json<StockResponse>, AppError> {
    let stock_quantity = state.catalog.adjust_stock(id, adjustment.delta).await?;
    Ok(Json(StockResponse { id, stock_quantity }))
}

/// DELETE /api/products/{id}
///
/// Refused with 409 while any recorded sale still references the product.
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    match state.engine.delete_product(id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(SaleError::ProductNotFound(_)) => {
            Err(AppError::NotFound(format!("product not found: {id}")))
        }
        Err(err) => Err(err.into()),
    }
}
