//! In-memory storage backend for the commerce backend.
//!
//! This module provides a memory-based implementation of the store traits,
//! useful for testing and development scenarios where persistence is not
//! required. One lock guards the whole record set, so a committed transition
//! is atomic across the order row, its history, and the payment row.

use crate::implementations::state::StoreState;
use crate::{OrderStore, PaymentStore, StoreBackend, StoreError};
use async_trait::async_trait;
use commerce_types::{
	ConfigSchema, HistoryDraft, ImplementationRegistry, Order, OrderItem, OrderPatch, OrderRecord,
	OrderStatusHistory, Payment, PaymentStatus, PaymentUpdate, Schema, ValidationError,
};
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory store implementation.
///
/// All records live in a [`StoreState`] behind a read-write lock. Writers
/// take the lock exclusively, which serializes per-order mutation; the
/// version check inside `commit_transition` still rejects transitions built
/// against stale reads.
pub struct MemoryStore {
	state: RwLock<StoreState>,
}

impl MemoryStore {
	/// Creates a new empty MemoryStore.
	pub fn new() -> Self {
		Self {
			state: RwLock::new(StoreState::new()),
		}
	}
}

impl Default for MemoryStore {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl OrderStore for MemoryStore {
	async fn create_order(&self, order: Order, items: Vec<OrderItem>) -> Result<(), StoreError> {
		let mut state = self.state.write().await;
		state.create_order(order, items)
	}

	async fn get_order(&self, id: &str) -> Result<OrderRecord, StoreError> {
		let state = self.state.read().await;
		state.get_order(id)
	}

	async fn history(&self, id: &str) -> Result<Vec<OrderStatusHistory>, StoreError> {
		let state = self.state.read().await;
		state.history(id)
	}

	async fn commit_transition(
		&self,
		id: &str,
		expected_version: u64,
		patch: OrderPatch,
		history: HistoryDraft,
		actor: Option<String>,
		payment_update: Option<PaymentUpdate>,
	) -> Result<OrderRecord, StoreError> {
		let mut state = self.state.write().await;
		state.commit_transition(id, expected_version, patch, history, actor, payment_update)
	}
}

#[async_trait]
impl PaymentStore for MemoryStore {
	async fn create_payment(&self, payment: Payment) -> Result<(), StoreError> {
		let mut state = self.state.write().await;
		state.create_payment(payment)
	}

	async fn get_payment(&self, id: &str) -> Result<Payment, StoreError> {
		let state = self.state.read().await;
		state.get_payment(id)
	}

	async fn latest_payment_for_order(
		&self,
		order_id: &str,
	) -> Result<Option<Payment>, StoreError> {
		let state = self.state.read().await;
		state.latest_payment_for_order(order_id)
	}

	async fn update_payment_status(
		&self,
		id: &str,
		new_status: PaymentStatus,
		failure_reason: Option<String>,
	) -> Result<Payment, StoreError> {
		let mut state = self.state.write().await;
		state.update_payment_status(id, new_status, failure_reason)
	}
}

/// Registry for the memory store implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = crate::StoreFactory;

	fn factory() -> Self::Factory {
		create_store
	}
}

impl crate::StoreRegistry for Registry {}

/// Configuration schema for MemoryStore.
pub struct MemoryStoreSchema;

impl ConfigSchema for MemoryStoreSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// Memory storage has no required configuration
		let schema = Schema::new(vec![], vec![]);
		schema.validate(config)
	}
}

/// Factory function to create a memory store from configuration.
///
/// Configuration parameters:
/// - None required for memory storage
pub fn create_store(config: &toml::Value) -> Result<Arc<dyn StoreBackend>, StoreError> {
	MemoryStoreSchema
		.validate(config)
		.map_err(|e| StoreError::Configuration(e.to_string()))?;
	Ok(Arc::new(MemoryStore::new()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;
	use commerce_types::OrderStatus;
	use rust_decimal_macros::dec;

	fn sample_order(id: &str) -> Order {
		let now = Utc::now();
		Order {
			id: id.to_string(),
			user_id: 1,
			status: OrderStatus::Pending,
			subtotal: dec!(90.00),
			shipping_cost: dec!(5.00),
			tax_amount: dec!(5.00),
			total_amount: dec!(100.00),
			payment_method: "credit_card".to_string(),
			payment_status: PaymentStatus::Pending,
			shipping_address: serde_json::json!({"city": "Lisbon"}),
			tracking_number: None,
			notes: None,
			cancelled_at: None,
			shipped_at: None,
			delivered_at: None,
			created_at: now,
			updated_at: now,
		}
	}

	fn sample_payment(id: &str, order_id: &str, status: PaymentStatus) -> Payment {
		let now = Utc::now();
		Payment {
			id: id.to_string(),
			order_id: order_id.to_string(),
			amount: dec!(100.00),
			payment_method: "credit_card".to_string(),
			status,
			transaction_id: None,
			payment_details: serde_json::json!({}),
			gateway_response: serde_json::json!({}),
			processed_at: None,
			failed_at: None,
			failure_reason: None,
			created_at: now,
			updated_at: now,
		}
	}

	fn paid_patch() -> (OrderPatch, HistoryDraft) {
		(
			OrderPatch {
				status: Some(OrderStatus::Paid),
				payment_status: Some(PaymentStatus::Succeeded),
				..Default::default()
			},
			HistoryDraft {
				from_status: Some(OrderStatus::Pending),
				to_status: OrderStatus::Paid,
				note: None,
			},
		)
	}

	#[tokio::test]
	async fn create_and_get_order() {
		let store = MemoryStore::new();
		store
			.create_order(sample_order("ORD-2024010100001"), vec![])
			.await
			.unwrap();

		let record = store.get_order("ORD-2024010100001").await.unwrap();
		assert_eq!(record.order.status, OrderStatus::Pending);
		assert_eq!(record.version, 1);

		// Creation writes the initial history entry.
		let history = store.history("ORD-2024010100001").await.unwrap();
		assert_eq!(history.len(), 1);
		assert_eq!(history[0].from_status, None);
		assert_eq!(history[0].to_status, OrderStatus::Pending);

		assert!(matches!(
			store.get_order("ORD-2024010100002").await,
			Err(StoreError::NotFound)
		));
	}

	#[tokio::test]
	async fn duplicate_order_id_conflicts() {
		let store = MemoryStore::new();
		store
			.create_order(sample_order("ORD-2024010100001"), vec![])
			.await
			.unwrap();
		assert!(matches!(
			store
				.create_order(sample_order("ORD-2024010100001"), vec![])
				.await,
			Err(StoreError::Conflict(_))
		));
	}

	#[tokio::test]
	async fn commit_transition_checks_and_increments_version() {
		let store = MemoryStore::new();
		store
			.create_order(sample_order("ORD-2024010100001"), vec![])
			.await
			.unwrap();

		let (patch, history) = paid_patch();
		let record = store
			.commit_transition(
				"ORD-2024010100001",
				1,
				patch.clone(),
				history.clone(),
				Some("system".to_string()),
				None,
			)
			.await
			.unwrap();
		assert_eq!(record.version, 2);
		assert_eq!(record.order.status, OrderStatus::Paid);

		// The same base version cannot commit twice.
		let result = store
			.commit_transition("ORD-2024010100001", 1, patch, history, None, None)
			.await;
		assert!(matches!(result, Err(StoreError::Conflict(_))));
	}

	#[tokio::test]
	async fn commit_transition_updates_payment_atomically() {
		let store = MemoryStore::new();
		store
			.create_order(sample_order("ORD-2024010100001"), vec![])
			.await
			.unwrap();
		store
			.create_payment(sample_payment(
				"PAY-2024010100001",
				"ORD-2024010100001",
				PaymentStatus::Pending,
			))
			.await
			.unwrap();

		let (patch, history) = paid_patch();
		store
			.commit_transition(
				"ORD-2024010100001",
				1,
				patch,
				history,
				None,
				Some(PaymentUpdate {
					payment_id: "PAY-2024010100001".to_string(),
					status: PaymentStatus::Succeeded,
					failure_reason: None,
				}),
			)
			.await
			.unwrap();

		let payment = store.get_payment("PAY-2024010100001").await.unwrap();
		assert_eq!(payment.status, PaymentStatus::Succeeded);
		assert!(payment.processed_at.is_some());
	}

	#[tokio::test]
	async fn rejected_payment_update_leaves_order_untouched() {
		let store = MemoryStore::new();
		store
			.create_order(sample_order("ORD-2024010100001"), vec![])
			.await
			.unwrap();
		store
			.create_payment(sample_payment(
				"PAY-2024010100001",
				"ORD-2024010100001",
				PaymentStatus::Failed,
			))
			.await
			.unwrap();

		let (patch, history) = paid_patch();
		let result = store
			.commit_transition(
				"ORD-2024010100001",
				1,
				patch,
				history,
				None,
				Some(PaymentUpdate {
					payment_id: "PAY-2024010100001".to_string(),
					status: PaymentStatus::Succeeded,
					failure_reason: None,
				}),
			)
			.await;
		assert!(matches!(result, Err(StoreError::PaymentTerminal { .. })));

		// No partial application: order row and history are unchanged.
		let record = store.get_order("ORD-2024010100001").await.unwrap();
		assert_eq!(record.version, 1);
		assert_eq!(record.order.status, OrderStatus::Pending);
		assert_eq!(store.history("ORD-2024010100001").await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn terminal_payment_rejects_updates() {
		let store = MemoryStore::new();
		store
			.create_payment(sample_payment(
				"PAY-2024010100001",
				"ORD-2024010100001",
				PaymentStatus::Succeeded,
			))
			.await
			.unwrap();

		// The one legal exit from a terminal payment.
		let refunded = store
			.update_payment_status("PAY-2024010100001", PaymentStatus::Refunded, None)
			.await
			.unwrap();
		assert_eq!(refunded.status, PaymentStatus::Refunded);

		assert!(matches!(
			store
				.update_payment_status("PAY-2024010100001", PaymentStatus::Succeeded, None)
				.await,
			Err(StoreError::PaymentTerminal { .. })
		));
	}

	#[tokio::test]
	async fn latest_payment_is_most_recent_attempt() {
		let store = MemoryStore::new();
		assert!(store
			.latest_payment_for_order("ORD-2024010100001")
			.await
			.unwrap()
			.is_none());

		store
			.create_payment(sample_payment(
				"PAY-2024010100001",
				"ORD-2024010100001",
				PaymentStatus::Failed,
			))
			.await
			.unwrap();
		store
			.create_payment(sample_payment(
				"PAY-2024010100002",
				"ORD-2024010100001",
				PaymentStatus::Pending,
			))
			.await
			.unwrap();

		let latest = store
			.latest_payment_for_order("ORD-2024010100001")
			.await
			.unwrap()
			.unwrap();
		assert_eq!(latest.id, "PAY-2024010100002");
	}

	#[tokio::test]
	async fn failed_payment_records_reason_and_timestamp() {
		let store = MemoryStore::new();
		store
			.create_payment(sample_payment(
				"PAY-2024010100001",
				"ORD-2024010100001",
				PaymentStatus::Pending,
			))
			.await
			.unwrap();

		let failed = store
			.update_payment_status(
				"PAY-2024010100001",
				PaymentStatus::Failed,
				Some("card declined".to_string()),
			)
			.await
			.unwrap();
		assert_eq!(failed.status, PaymentStatus::Failed);
		assert_eq!(failed.failure_reason.as_deref(), Some("card declined"));
		assert!(failed.failed_at.is_some());
		assert!(failed.processed_at.is_none());
	}
}
