//! Order service for the commerce backend.
//!
//! This module provides the orchestration layer of the order lifecycle. It
//! owns the only write path for orders and payments: every transition is
//! loaded from the stores, decided by the pure state machine, and committed
//! atomically with its history entry and payment update. Concurrent
//! transitions against the same order serialize through the store's
//! optimistic version check; the loser surfaces a retriable conflict and the
//! service never retries on its own.

use chrono::Utc;
use commerce_lifecycle::{decide, RejectionReason, Transition};
use commerce_storage::{StoreBackend, StoreError};
use commerce_types::{
	IdGenerator, IdPrefix, Order, OrderEvent, OrderItem, OrderRecord, OrderStatusHistory, Payment,
	PaymentStatus,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by the order service.
#[derive(Debug, Error)]
pub enum ServiceError {
	/// The requested order or payment does not exist.
	#[error("Not found")]
	NotFound,
	/// The state machine rejected the transition. Never retried.
	#[error("Transition rejected: {0}")]
	Rejected(#[from] RejectionReason),
	/// A concurrent write won the version check. Safe to retry the whole
	/// call with fresh state.
	#[error("Conflict: {0}")]
	Conflict(String),
	/// The request itself is malformed (bad quantities, negative amounts).
	#[error("Validation failed: {0}")]
	Validation(String),
	/// The store failed at the I/O level. Surfaced, not retried.
	#[error("Store error: {0}")]
	Store(StoreError),
}

impl From<StoreError> for ServiceError {
	fn from(err: StoreError) -> Self {
		match err {
			StoreError::NotFound => ServiceError::NotFound,
			StoreError::Conflict(message) => ServiceError::Conflict(message),
			StoreError::PaymentTerminal { .. } | StoreError::InvalidPaymentTransition { .. } => {
				ServiceError::Conflict(err.to_string())
			},
			other => ServiceError::Store(other),
		}
	}
}

/// Request to create a new order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
	/// Identifier of the user placing the order.
	pub user_id: i64,
	/// Payment method chosen at checkout.
	pub payment_method: String,
	/// Shipping address to snapshot onto the order.
	pub shipping_address: serde_json::Value,
	/// Shipping cost for the order.
	pub shipping_cost: Decimal,
	/// Tax amount for the order.
	pub tax_amount: Decimal,
	/// Optional notes.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub notes: Option<String>,
	/// Line items to purchase.
	pub items: Vec<CreateOrderItem>,
}

/// A line item in an order-creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderItem {
	/// Identifier of the product.
	pub product_id: i64,
	/// Product name to snapshot.
	pub product_name: String,
	/// Number of units. Must be positive.
	pub quantity: u32,
	/// Price per unit. Must be non-negative.
	pub unit_price: Decimal,
	/// Product attributes to snapshot.
	#[serde(default)]
	pub product_snapshot: serde_json::Value,
}

/// Request to record a payment attempt against an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
	/// Amount of the attempt; defaults to the order total.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub amount: Option<Decimal>,
	/// External processor transaction identifier, if already known.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub transaction_id: Option<String>,
	/// Masked payment-detail snapshot.
	#[serde(default)]
	pub payment_details: serde_json::Value,
	/// Gateway response snapshot.
	#[serde(default)]
	pub gateway_response: serde_json::Value,
}

/// Service that orchestrates order lifecycle transitions.
///
/// The service is the only writer of orders and payments. It coordinates the
/// stores and the state machine but holds no mutable state of its own, so a
/// single instance serves concurrent requests.
pub struct OrderService {
	store: Arc<dyn StoreBackend>,
	ids: Arc<IdGenerator>,
}

impl OrderService {
	/// Creates a new OrderService over the given store backend.
	pub fn new(store: Arc<dyn StoreBackend>, ids: Arc<IdGenerator>) -> Self {
		Self { store, ids }
	}

	/// Creates an order: validates the request, computes line and order
	/// totals, snapshots the shipping address, and persists the order with
	/// its items and initial history entry atomically.
	pub async fn create_order(
		&self,
		request: CreateOrderRequest,
	) -> Result<OrderRecord, ServiceError> {
		if request.items.is_empty() {
			return Err(ServiceError::Validation(
				"order must contain at least one item".to_string(),
			));
		}
		if request.shipping_cost < Decimal::ZERO || request.tax_amount < Decimal::ZERO {
			return Err(ServiceError::Validation(
				"shipping cost and tax amount must be non-negative".to_string(),
			));
		}

		let order_id = self.ids.next(IdPrefix::Order);
		let now = Utc::now();

		let mut subtotal = Decimal::ZERO;
		let mut items = Vec::with_capacity(request.items.len());
		for item in request.items {
			if item.quantity == 0 {
				return Err(ServiceError::Validation(format!(
					"quantity for product {} must be positive",
					item.product_id
				)));
			}
			if item.unit_price < Decimal::ZERO {
				return Err(ServiceError::Validation(format!(
					"unit price for product {} must be non-negative",
					item.product_id
				)));
			}

			let total_price = Decimal::from(item.quantity) * item.unit_price;
			subtotal += total_price;
			items.push(OrderItem {
				order_id: order_id.clone(),
				product_id: item.product_id,
				product_name: item.product_name,
				quantity: item.quantity,
				unit_price: item.unit_price,
				total_price,
				product_snapshot: item.product_snapshot,
				created_at: now,
			});
		}

		let order = Order {
			id: order_id.clone(),
			user_id: request.user_id,
			status: commerce_types::OrderStatus::Pending,
			subtotal,
			shipping_cost: request.shipping_cost,
			tax_amount: request.tax_amount,
			total_amount: subtotal + request.shipping_cost + request.tax_amount,
			payment_method: request.payment_method,
			payment_status: PaymentStatus::Pending,
			shipping_address: request.shipping_address,
			tracking_number: None,
			notes: request.notes,
			cancelled_at: None,
			shipped_at: None,
			delivered_at: None,
			created_at: now,
			updated_at: now,
		};

		self.store.create_order(order, items).await?;
		tracing::info!(order_id = %order_id, "Created order");

		Ok(self.store.get_order(&order_id).await?)
	}

	/// Retrieves an order with its items.
	pub async fn get_order(&self, order_id: &str) -> Result<OrderRecord, ServiceError> {
		Ok(self.store.get_order(order_id).await?)
	}

	/// Returns the order's status history in commit order.
	pub async fn order_history(
		&self,
		order_id: &str,
	) -> Result<Vec<OrderStatusHistory>, ServiceError> {
		Ok(self.store.history(order_id).await?)
	}

	/// Records a new payment attempt against an order.
	///
	/// The attempt starts at `pending`; its outcome arrives later as a
	/// lifecycle event. Terminal orders accept no further attempts.
	pub async fn create_payment_attempt(
		&self,
		order_id: &str,
		request: CreatePaymentRequest,
	) -> Result<Payment, ServiceError> {
		let record = self.store.get_order(order_id).await?;
		if record.order.status.is_terminal() {
			return Err(ServiceError::Validation(format!(
				"order {} is {}, no further payment attempts accepted",
				order_id, record.order.status
			)));
		}

		let now = Utc::now();
		let payment = Payment {
			id: self.ids.next(IdPrefix::Payment),
			order_id: order_id.to_string(),
			amount: request.amount.unwrap_or(record.order.total_amount),
			payment_method: record.order.payment_method.clone(),
			status: PaymentStatus::Pending,
			transaction_id: request.transaction_id,
			payment_details: request.payment_details,
			gateway_response: request.gateway_response,
			processed_at: None,
			failed_at: None,
			failure_reason: None,
			created_at: now,
			updated_at: now,
		};

		self.store.create_payment(payment.clone()).await?;
		tracing::info!(order_id = %order_id, payment_id = %payment.id, "Recorded payment attempt");
		Ok(payment)
	}

	/// Applies a lifecycle event to an order.
	///
	/// Loads the order and its latest payment, asks the state machine for a
	/// decision, and commits the accepted transition atomically against the
	/// loaded version. A rejection is surfaced without writing anything; a
	/// lost version check surfaces as [`ServiceError::Conflict`].
	pub async fn apply_event(
		&self,
		order_id: &str,
		event: OrderEvent,
		actor: Option<String>,
	) -> Result<OrderRecord, ServiceError> {
		let record = self.store.get_order(order_id).await?;
		let payment = self.store.latest_payment_for_order(order_id).await?;

		let transition = match decide(&record.order, payment.as_ref(), &event) {
			Ok(transition) => transition,
			Err(reason) => {
				tracing::debug!(
					order_id = %order_id,
					event = %event,
					status = %record.order.status,
					reason = %reason,
					"Rejected transition"
				);
				return Err(ServiceError::Rejected(reason));
			},
		};

		verify_transition_consistency(&transition)?;

		let updated = self
			.store
			.commit_transition(
				order_id,
				record.version,
				transition.patch,
				transition.history.clone(),
				actor,
				transition.payment_update,
			)
			.await?;

		tracing::info!(
			order_id = %order_id,
			event = %event,
			from = %record.order.status,
			to = %updated.order.status,
			"Applied transition"
		);
		Ok(updated)
	}
}

/// Checks the cross-entity consistency of an accepted transition before it
/// is committed: when the transition moves the payment, the order's payment
/// status mirror must move to the same value, and the patch never touches
/// totals.
fn verify_transition_consistency(transition: &Transition) -> Result<(), ServiceError> {
	if let Some(ref update) = transition.payment_update {
		if transition.patch.payment_status != Some(update.status) {
			return Err(ServiceError::Validation(format!(
				"transition would desynchronize payment status: order mirror {:?}, payment {}",
				transition.patch.payment_status, update.status
			)));
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use commerce_storage::implementations::memory::MemoryStore;
	use commerce_types::OrderStatus;
	use rust_decimal_macros::dec;

	fn service() -> OrderService {
		OrderService::new(Arc::new(MemoryStore::new()), Arc::new(IdGenerator::new()))
	}

	fn checkout_request() -> CreateOrderRequest {
		CreateOrderRequest {
			user_id: 42,
			payment_method: "credit_card".to_string(),
			shipping_address: serde_json::json!({
				"street": "1 Rua Augusta",
				"city": "Lisbon",
				"country": "PT"
			}),
			shipping_cost: dec!(5.00),
			tax_amount: dec!(9.50),
			notes: None,
			items: vec![
				CreateOrderItem {
					product_id: 1,
					product_name: "Mechanical keyboard".to_string(),
					quantity: 1,
					unit_price: dec!(80.00),
					product_snapshot: serde_json::json!({"layout": "ISO"}),
				},
				CreateOrderItem {
					product_id: 2,
					product_name: "USB cable".to_string(),
					quantity: 2,
					unit_price: dec!(7.50),
					product_snapshot: serde_json::Value::Null,
				},
			],
		}
	}

	#[tokio::test]
	async fn create_order_computes_totals() {
		let service = service();
		let record = service.create_order(checkout_request()).await.unwrap();

		assert_eq!(record.order.subtotal, dec!(95.00));
		assert_eq!(record.order.total_amount, dec!(109.50));
		assert!(record.order.totals_consistent());
		assert_eq!(record.order.status, OrderStatus::Pending);
		assert_eq!(record.items.len(), 2);
		assert_eq!(record.items[1].total_price, dec!(15.00));
		assert!(record.order.id.starts_with("ORD-"));
	}

	#[tokio::test]
	async fn create_order_rejects_bad_requests() {
		let service = service();

		let mut empty = checkout_request();
		empty.items.clear();
		assert!(matches!(
			service.create_order(empty).await,
			Err(ServiceError::Validation(_))
		));

		let mut zero_quantity = checkout_request();
		zero_quantity.items[0].quantity = 0;
		assert!(matches!(
			service.create_order(zero_quantity).await,
			Err(ServiceError::Validation(_))
		));

		let mut negative_shipping = checkout_request();
		negative_shipping.shipping_cost = dec!(-1.00);
		assert!(matches!(
			service.create_order(negative_shipping).await,
			Err(ServiceError::Validation(_))
		));
	}

	#[tokio::test]
	async fn payment_succeeded_scenario() {
		let service = service();
		let record = service.create_order(checkout_request()).await.unwrap();
		let order_id = record.order.id.clone();

		let payment = service
			.create_payment_attempt(&order_id, CreatePaymentRequest {
				amount: None,
				transaction_id: Some("txn_123".to_string()),
				payment_details: serde_json::json!({"last4": "4242"}),
				gateway_response: serde_json::Value::Null,
			})
			.await
			.unwrap();
		assert!(payment.id.starts_with("PAY-"));
		assert_eq!(payment.amount, dec!(109.50));
		assert_eq!(payment.status, PaymentStatus::Pending);

		let updated = service
			.apply_event(&order_id, OrderEvent::PaymentSucceeded, None)
			.await
			.unwrap();
		assert_eq!(updated.order.status, OrderStatus::Paid);
		assert_eq!(updated.order.payment_status, PaymentStatus::Succeeded);

		let stored_payment = service
			.store
			.latest_payment_for_order(&order_id)
			.await
			.unwrap()
			.unwrap();
		assert_eq!(stored_payment.status, PaymentStatus::Succeeded);
		assert!(stored_payment.processed_at.is_some());

		let history = service.order_history(&order_id).await.unwrap();
		assert_eq!(history.len(), 2);
		assert_eq!(history[1].from_status, Some(OrderStatus::Pending));
		assert_eq!(history[1].to_status, OrderStatus::Paid);
	}

	#[tokio::test]
	async fn full_lifecycle_keeps_history_chained() {
		let service = service();
		let record = service.create_order(checkout_request()).await.unwrap();
		let order_id = record.order.id.clone();
		service
			.create_payment_attempt(&order_id, CreatePaymentRequest {
				amount: None,
				transaction_id: None,
				payment_details: serde_json::Value::Null,
				gateway_response: serde_json::Value::Null,
			})
			.await
			.unwrap();

		let events = [
			OrderEvent::PaymentSucceeded,
			OrderEvent::FulfillmentStarted,
			OrderEvent::Shipped {
				tracking_number: Some("TRK42".to_string()),
			},
			OrderEvent::Delivered,
		];
		for event in events {
			let updated = service
				.apply_event(&order_id, event, Some("ops".to_string()))
				.await
				.unwrap();
			// Totals hold after every accepted transition.
			assert!(updated.order.totals_consistent());
		}

		let final_record = service.get_order(&order_id).await.unwrap();
		assert_eq!(final_record.order.status, OrderStatus::Delivered);
		assert!(final_record.order.shipped_at.is_some());
		assert!(final_record.order.delivered_at.is_some());
		assert!(final_record.order.shipped_at <= final_record.order.delivered_at);
		assert_eq!(final_record.order.tracking_number.as_deref(), Some("TRK42"));

		// History chain: from_status of entry n equals to_status of entry n-1.
		let history = service.order_history(&order_id).await.unwrap();
		let statuses: Vec<_> = history.iter().map(|h| h.to_status).collect();
		assert_eq!(
			statuses,
			vec![
				OrderStatus::Pending,
				OrderStatus::Paid,
				OrderStatus::Processing,
				OrderStatus::Shipped,
				OrderStatus::Delivered,
			]
		);
		for pair in history.windows(2) {
			assert_eq!(pair[1].from_status, Some(pair[0].to_status));
		}
		assert_eq!(history[1].changed_by.as_deref(), Some("ops"));
	}

	#[tokio::test]
	async fn shipped_without_tracking_leaves_order_unchanged() {
		let service = service();
		let record = service.create_order(checkout_request()).await.unwrap();
		let order_id = record.order.id.clone();
		service
			.create_payment_attempt(&order_id, CreatePaymentRequest {
				amount: None,
				transaction_id: None,
				payment_details: serde_json::Value::Null,
				gateway_response: serde_json::Value::Null,
			})
			.await
			.unwrap();
		service
			.apply_event(&order_id, OrderEvent::PaymentSucceeded, None)
			.await
			.unwrap();
		service
			.apply_event(&order_id, OrderEvent::FulfillmentStarted, None)
			.await
			.unwrap();

		let result = service
			.apply_event(
				&order_id,
				OrderEvent::Shipped {
					tracking_number: None,
				},
				None,
			)
			.await;
		assert!(matches!(
			result,
			Err(ServiceError::Rejected(RejectionReason::PreconditionFailed { .. }))
		));

		let record = service.get_order(&order_id).await.unwrap();
		assert_eq!(record.order.status, OrderStatus::Processing);
		assert_eq!(service.order_history(&order_id).await.unwrap().len(), 3);
	}

	#[tokio::test]
	async fn cancel_after_shipment_is_rejected_without_mutation() {
		let service = service();
		let record = service.create_order(checkout_request()).await.unwrap();
		let order_id = record.order.id.clone();
		service
			.create_payment_attempt(&order_id, CreatePaymentRequest {
				amount: None,
				transaction_id: None,
				payment_details: serde_json::Value::Null,
				gateway_response: serde_json::Value::Null,
			})
			.await
			.unwrap();
		for event in [
			OrderEvent::PaymentSucceeded,
			OrderEvent::FulfillmentStarted,
			OrderEvent::Shipped {
				tracking_number: Some("TRK1".to_string()),
			},
		] {
			service.apply_event(&order_id, event, None).await.unwrap();
		}

		let before = service.get_order(&order_id).await.unwrap();
		let result = service
			.apply_event(&order_id, OrderEvent::CancelRequested { note: None }, None)
			.await;
		assert!(matches!(result, Err(ServiceError::Rejected(_))));

		let after = service.get_order(&order_id).await.unwrap();
		assert_eq!(after.version, before.version);
		assert_eq!(after.order.status, OrderStatus::Shipped);
		assert!(after.order.cancelled_at.is_none());
	}

	#[tokio::test]
	async fn refund_after_delivery() {
		let service = service();
		let record = service.create_order(checkout_request()).await.unwrap();
		let order_id = record.order.id.clone();
		service
			.create_payment_attempt(&order_id, CreatePaymentRequest {
				amount: None,
				transaction_id: None,
				payment_details: serde_json::Value::Null,
				gateway_response: serde_json::Value::Null,
			})
			.await
			.unwrap();
		for event in [
			OrderEvent::PaymentSucceeded,
			OrderEvent::FulfillmentStarted,
			OrderEvent::Shipped {
				tracking_number: Some("TRK1".to_string()),
			},
			OrderEvent::Delivered,
		] {
			service.apply_event(&order_id, event, None).await.unwrap();
		}

		let refunded = service
			.apply_event(
				&order_id,
				OrderEvent::RefundRequested {
					note: Some("damaged in transit".to_string()),
				},
				Some("support".to_string()),
			)
			.await
			.unwrap();
		assert_eq!(refunded.order.status, OrderStatus::Refunded);
		assert_eq!(refunded.order.payment_status, PaymentStatus::Refunded);

		let payment = service
			.store
			.latest_payment_for_order(&order_id)
			.await
			.unwrap()
			.unwrap();
		assert_eq!(payment.status, PaymentStatus::Refunded);
	}

	#[tokio::test]
	async fn payment_attempt_rejected_for_terminal_order() {
		let service = service();
		let record = service.create_order(checkout_request()).await.unwrap();
		let order_id = record.order.id.clone();
		service
			.apply_event(&order_id, OrderEvent::CancelRequested { note: None }, None)
			.await
			.unwrap();

		assert!(matches!(
			service
				.create_payment_attempt(&order_id, CreatePaymentRequest {
					amount: None,
					transaction_id: None,
					payment_details: serde_json::Value::Null,
					gateway_response: serde_json::Value::Null,
				})
				.await,
			Err(ServiceError::Validation(_))
		));
	}

	#[tokio::test]
	async fn concurrent_events_commit_exactly_once() {
		let service = Arc::new(service());
		let record = service.create_order(checkout_request()).await.unwrap();
		let order_id = record.order.id.clone();
		service
			.create_payment_attempt(&order_id, CreatePaymentRequest {
				amount: None,
				transaction_id: None,
				payment_details: serde_json::Value::Null,
				gateway_response: serde_json::Value::Null,
			})
			.await
			.unwrap();

		let mut handles = Vec::new();
		for _ in 0..2 {
			let service = Arc::clone(&service);
			let order_id = order_id.clone();
			handles.push(tokio::spawn(async move {
				service
					.apply_event(&order_id, OrderEvent::PaymentSucceeded, None)
					.await
			}));
		}

		let mut successes = 0;
		for handle in handles {
			match handle.await.unwrap() {
				Ok(_) => successes += 1,
				// The loser sees either a stale-version conflict or, with
				// fresh state, an invalid transition from `paid`.
				Err(ServiceError::Conflict(_)) | Err(ServiceError::Rejected(_)) => {},
				Err(other) => panic!("unexpected error: {}", other),
			}
		}
		assert_eq!(successes, 1);

		let record = service.get_order(&order_id).await.unwrap();
		assert_eq!(record.order.status, OrderStatus::Paid);
		assert_eq!(service.order_history(&order_id).await.unwrap().len(), 2);
	}

	#[tokio::test]
	async fn unknown_order_is_not_found() {
		let service = service();
		assert!(matches!(
			service.get_order("ORD-2099010100001").await,
			Err(ServiceError::NotFound)
		));
		assert!(matches!(
			service
				.apply_event("ORD-2099010100001", OrderEvent::Delivered, None)
				.await,
			Err(ServiceError::NotFound)
		));
	}
}
