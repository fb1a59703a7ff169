use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::database::order_repository::Order;
use crate::error::AppError;
use crate::middleware::error::body_rejection;
use crate::middleware::logging::CurrentRequestId;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmDeliveryRequest {
    #[serde(default)]
    pub order_id: String,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub success: bool,
    pub order: Order,
}

#[derive(Debug, Serialize)]
pub struct OrdersResponse {
    pub success: bool,
    pub orders: Vec<Order>,
}

/// POST /delivery/confirm
pub async fn confirm_delivery(
    State(state): State<AppState>,
    request_id: CurrentRequestId,
    payload: Result<Json<ConfirmDeliveryRequest>, JsonRejection>,
) -> Result<Json<OrderResponse>, AppError> {
    let Json(request) = payload.map_err(|e| request_id.tag(body_rejection(e)))?;

    let order = state
        .delivery
        .confirm_delivery(&request.order_id)
        .await
        .map_err(|e| request_id.tag(e))?;

    Ok(Json(OrderResponse {
        success: true,
        order,
    }))
}

/// GET /order/{order_id}
pub async fn get_order(
    State(state): State<AppState>,
    request_id: CurrentRequestId,
    Path(order_id): Path<String>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state
        .orders
        .find_by_id(&order_id)
        .await
        .map_err(|e| request_id.tag(e.into()))?
        .ok_or_else(|| request_id.tag(AppError::not_found(order_id.as_str())))?;

    Ok(Json(OrderResponse {
        success: true,
        order,
    }))
}

/// GET /orders
pub async fn list_orders(
    State(state): State<AppState>,
    request_id: CurrentRequestId,
) -> Result<Json<OrdersResponse>, AppError> {
    let orders = state
        .orders
        .list()
        .await
        .map_err(|e| request_id.tag(e.into()))?;

    Ok(Json(OrdersResponse {
        success: true,
        orders,
    }))
}
