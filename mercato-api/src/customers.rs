use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mercato_core::pii::Masked;
use mercato_parties::{Customer, CustomerType};
use mercato_sales::SaleError;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/customers", get(list_customers).post(create_customer))
        .route(
            "/api/customers/{id}",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
        .route("/api/customers/type/{customer_type}", get(list_customers_by_type))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CustomerPayload {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub customer_type: CustomerType,
}

/// Contact fields wear `Masked` so debug-logging a response cannot leak
/// them; serialization still carries the real value.
#[derive(Debug, Serialize)]
pub struct CustomerResponse {
    pub id: Uuid,
    pub name: String,
    pub email: Option<Masked<String>>,
    pub phone: Option<Masked<String>>,
    pub address: Option<String>,
    pub customer_type: CustomerType,
}

impl From<Customer> for CustomerResponse {
    fn from(customer: Customer) -> Self {
        Self {
            id: customer.id,
            name: customer.name,
            email: customer.email.map(Masked),
            phone: customer.phone.map(Masked),
            address: customer.address,
            customer_type: customer.customer_type,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteCustomerParams {
    /// Cancel the customer's sales (restoring stock) before deleting.
    #[serde(default)]
    pub cascade: bool,
}

fn validate(payload: &CustomerPayload) -> Result<(), AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name must not be empty".to_string()));
    }
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/customers
pub async fn list_customers(
    State(state): State<AppState>,
) -> Result<Json<Vec<CustomerResponse>>, AppError> {
    let customers = state.directory.list_customers().await?;
    Ok(Json(customers.into_iter().map(CustomerResponse::from).collect()))
}

/// GET /api/customers/{id}
pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CustomerResponse>, AppError> {
    let customer = state
        .directory
        .find_customer(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("customer not found: {id}")))?;
    Ok(Json(customer.into()))
}

/// GET /api/customers/type/{customer_type}
pub async fn list_customers_by_type(
    State(state): State<AppState>,
    Path(customer_type): Path<String>,
) -> Result<Json<Vec<CustomerResponse>>, AppError> {
    let customer_type: CustomerType = customer_type.parse().map_err(AppError::BadRequest)?;
    let customers = state.directory.list_customers_by_type(customer_type).await?;
    Ok(Json(customers.into_iter().map(CustomerResponse::from).collect()))
}

/// POST /api/customers
pub async fn create_customer(
    State(state): State<AppState>,
    Json(payload): Json<CustomerPayload>,
) -> Result<(StatusCode, Json<CustomerResponse>), AppError> {
    validate(&payload)?;
    let customer = Customer {
        id: Uuid::new_v4(),
        name: payload.name,
        email: payload.email,
        phone: payload.phone,
        address: payload.address,
        customer_type: payload.customer_type,
    };
    state.directory.save_customer(&customer).await?;
    Ok((StatusCode::CREATED, Json(customer.into())))
}

/// PUT /api/customers/{id}
pub async fn update_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CustomerPayload>,
) -> Result<Json<CustomerResponse>, AppError> {
    validate(&payload)?;
    if state.directory.find_customer(id).await?.is_none() {
        return Err(AppError::NotFound(format!("customer not found: {id}")));
    }
    let customer = Customer {
        id,
        name: payload.name,
        email: payload.email,
        phone: payload.phone,
        address: payload.address,
        customer_type: payload.customer_type,
    };
    state.directory.save_customer(&customer).await?;
    Ok(Json(customer.into()))
}

/// DELETE /api/customers/{id}?cascade=true
///
/// Refused with 409 while the customer has recorded sales, unless
/// `cascade` is set — then each sale is cancelled first, restoring stock.
pub async fn delete_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<DeleteCustomerParams>,
) -> Result<StatusCode, AppError> {
    match state.engine.delete_customer(id, params.cascade).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(SaleError::CustomerNotFound(_)) => {
            Err(AppError::NotFound(format!("customer not found: {id}")))
        }
        Err(err) => Err(err.into()),
    }
}
