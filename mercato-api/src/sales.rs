use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use mercato_sales::{Sale, SaleRequest};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/sales", get(list_sales).post(create_sale))
        .route("/api/sales/{id}", get(get_sale).delete(cancel_sale))
        .route("/api/sales/customer/{customer_id}", get(list_sales_by_customer))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/sales
///
/// Runs the whole order through the transaction engine. Any validation
/// failure — unknown customer, unknown product, insufficient stock —
/// answers 400 with the specific reason and leaves stock and ledger
/// untouched.
pub async fn create_sale(
    State(state): State<AppState>,
    Json(request): Json<SaleRequest>,
) -> Result<(StatusCode, Json<Sale>), AppError> {
    let sale = state.engine.create_sale(request).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

/// GET /api/sales
pub async fn list_sales(State(state): State<AppState>) -> Result<Json<Vec<Sale>>, AppError> {
    Ok(Json(state.ledger.list_sales().await?))
}

/// GET /api/sales/{id}
pub async fn get_sale(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Sale>, AppError> {
    let sale = state
        .ledger
        .find_sale(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("sale not found: {id}")))?;
    Ok(Json(sale))
}

/// GET /api/sales/customer/{customer_id}
pub async fn list_sales_by_customer(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
) -> Result<Json<Vec<Sale>>, AppError> {
    Ok(Json(state.ledger.find_sales_by_customer(customer_id).await?))
}

/// DELETE /api/sales/{id}
///
/// Cancels the sale: stock restored and ledger entry removed atomically.
/// 404 when the sale does not exist.
pub async fn cancel_sale(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.engine.cancel_sale(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
