//! HTTP server for the commerce backend API.
//!
//! This module provides the HTTP surface over the order service: order
//! creation, retrieval, history, payment attempts, and lifecycle events.
//! Service results map onto status codes — state-machine rejections surface
//! as 409 or 422 depending on the reason, version conflicts as retriable
//! 409s, and store outages as 503s.

use axum::{
	extract::{Path, State},
	http::StatusCode,
	response::{IntoResponse, Json, Response},
	routing::{get, post},
	Router,
};
use commerce_config::ApiConfig;
use commerce_core::{
	CreateOrderRequest, CreatePaymentRequest, OrderService, ServiceError,
};
use commerce_lifecycle::RejectionReason;
use commerce_types::OrderEvent;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Reference to the order service for processing requests.
	pub service: Arc<OrderService>,
}

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
	/// Additional error context
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
	/// Suggested retry delay in seconds
	#[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
	pub retry_after: Option<u64>,
}

/// Structured API error with its HTTP status mapping.
#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	body: ErrorResponse,
}

impl ApiError {
	/// Returns the HTTP status this error maps to.
	pub fn status(&self) -> StatusCode {
		self.status
	}

	/// Returns the error code carried in the response body.
	pub fn code(&self) -> &str {
		&self.body.error
	}
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		let (status, code, retry_after) = match &err {
			ServiceError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND", None),
			ServiceError::Rejected(RejectionReason::PreconditionFailed { .. }) => {
				(StatusCode::UNPROCESSABLE_ENTITY, "PRECONDITION_FAILED", None)
			},
			ServiceError::Rejected(RejectionReason::TerminalState { .. }) => {
				(StatusCode::CONFLICT, "TERMINAL_STATE", None)
			},
			ServiceError::Rejected(RejectionReason::InvalidTransition { .. }) => {
				(StatusCode::CONFLICT, "INVALID_TRANSITION", None)
			},
			ServiceError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT", Some(1)),
			ServiceError::Validation(_) => {
				(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_FAILED", None)
			},
			ServiceError::Store(_) => {
				(StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE", None)
			},
		};

		Self {
			status,
			body: ErrorResponse {
				error: code.to_string(),
				message: err.to_string(),
				details: None,
				retry_after,
			},
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		(self.status, Json(self.body)).into_response()
	}
}

/// Request body for applying a lifecycle event to an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyEventRequest {
	/// The lifecycle event to apply.
	pub event: OrderEvent,
	/// Actor recorded in the audit trail, if known.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub actor: Option<String>,
}

/// Starts the HTTP server for the API.
///
/// This function creates and configures the HTTP server with routing,
/// middleware, and error handling for the order endpoints.
pub async fn start_server(
	api_config: ApiConfig,
	service: Arc<OrderService>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app_state = AppState { service };

	// Build the router with /api base path
	let app = Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/orders", post(handle_create_order))
				.route("/orders/{id}", get(handle_get_order))
				.route("/orders/{id}/history", get(handle_order_history))
				.route("/orders/{id}/events", post(handle_apply_event))
				.route("/orders/{id}/payments", post(handle_create_payment)),
		)
		.layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
		.with_state(app_state);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Commerce API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

/// Handles POST /api/orders requests.
async fn handle_create_order(
	State(state): State<AppState>,
	Json(request): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
	let record = state.service.create_order(request).await?;
	Ok((StatusCode::CREATED, Json(record)))
}

/// Handles GET /api/orders/{id} requests.
async fn handle_get_order(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
	let record = state.service.get_order(&id).await?;
	Ok(Json(record))
}

/// Handles GET /api/orders/{id}/history requests.
///
/// Returns the append-only audit trail in commit order.
async fn handle_order_history(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
	let history = state.service.order_history(&id).await?;
	Ok(Json(history))
}

/// Handles POST /api/orders/{id}/events requests.
///
/// Applies a lifecycle event and returns the refreshed order on success.
async fn handle_apply_event(
	Path(id): Path<String>,
	State(state): State<AppState>,
	Json(request): Json<ApplyEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
	let record = state
		.service
		.apply_event(&id, request.event, request.actor)
		.await?;
	Ok(Json(record))
}

/// Handles POST /api/orders/{id}/payments requests.
async fn handle_create_payment(
	Path(id): Path<String>,
	State(state): State<AppState>,
	Json(request): Json<CreatePaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
	let payment = state.service.create_payment_attempt(&id, request).await?;
	Ok((StatusCode::CREATED, Json(payment)))
}
