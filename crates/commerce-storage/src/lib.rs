//! Storage module for the commerce backend.
//!
//! This module provides the durable-record abstractions for orders and
//! payments: trait contracts for the order store and payment store, a typed
//! error taxonomy, and pluggable backend implementations selected through a
//! factory/registry pattern.
//!
//! All writes for a single transition go through
//! [`OrderStore::commit_transition`], which is atomic: the order patch, the
//! history append, and the optional payment update either all apply or none
//! do, guarded by an optimistic version check on the order row.

use async_trait::async_trait;
use commerce_types::{
	HistoryDraft, ImplementationRegistry, Order, OrderItem, OrderPatch, OrderRecord,
	OrderStatusHistory, Payment, PaymentStatus, PaymentUpdate,
};
use std::sync::Arc;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;

	pub(crate) mod state;
}

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
	/// Error that occurs when a requested order or payment is not found.
	#[error("Not found")]
	NotFound,
	/// Error that occurs when a write loses the optimistic version check or
	/// collides with an existing identifier. Safe to retry with fresh state.
	#[error("Conflict: {0}")]
	Conflict(String),
	/// Error that occurs when updating a payment already in a terminal status.
	#[error("Payment {id} is already terminal ({status})")]
	PaymentTerminal {
		id: String,
		status: PaymentStatus,
	},
	/// Error that occurs when a payment-status update is not a legal
	/// transition on the payment axis.
	#[error("Invalid payment transition from {from} to {to}")]
	InvalidPaymentTransition {
		from: PaymentStatus,
		to: PaymentStatus,
	},
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend I/O.
	#[error("Store unavailable: {0}")]
	Unavailable(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the durable record of orders, items, and status history.
///
/// All mutation happens through `create_order` and `commit_transition`;
/// there is no path that updates an order row without the version check or
/// without producing its history entry.
#[async_trait]
pub trait OrderStore: Send + Sync {
	/// Persists a new order with its items and the initial history entry
	/// (`from_status = None`) atomically. A duplicate identifier is a
	/// [`StoreError::Conflict`].
	async fn create_order(&self, order: Order, items: Vec<OrderItem>) -> Result<(), StoreError>;

	/// Retrieves an order with its items and current version.
	async fn get_order(&self, id: &str) -> Result<OrderRecord, StoreError>;

	/// Returns the append-only status history for an order, in commit order.
	async fn history(&self, id: &str) -> Result<Vec<OrderStatusHistory>, StoreError>;

	/// Commits one accepted transition atomically.
	///
	/// Compares `expected_version` against the stored version and fails with
	/// [`StoreError::Conflict`] on mismatch; otherwise applies the patch,
	/// increments the version, appends exactly one history entry, and applies
	/// the payment update if present. On any failure prior state is left
	/// untouched.
	async fn commit_transition(
		&self,
		id: &str,
		expected_version: u64,
		patch: OrderPatch,
		history: HistoryDraft,
		actor: Option<String>,
		payment_update: Option<PaymentUpdate>,
	) -> Result<OrderRecord, StoreError>;
}

/// Trait defining the durable record of payment attempts.
#[async_trait]
pub trait PaymentStore: Send + Sync {
	/// Persists a new payment attempt. A duplicate identifier is a
	/// [`StoreError::Conflict`].
	async fn create_payment(&self, payment: Payment) -> Result<(), StoreError>;

	/// Retrieves a payment attempt by identifier.
	async fn get_payment(&self, id: &str) -> Result<Payment, StoreError>;

	/// Returns the most recent payment attempt for an order, if any.
	async fn latest_payment_for_order(
		&self,
		order_id: &str,
	) -> Result<Option<Payment>, StoreError>;

	/// Transitions a payment's status forward.
	///
	/// A payment already in a terminal status (`succeeded`, `failed`,
	/// `refunded`) rejects further updates with
	/// [`StoreError::PaymentTerminal`]; transitions the payment axis forbids
	/// are rejected with [`StoreError::InvalidPaymentTransition`]. `processed_at` /
	/// `failed_at` are stamped at commit time.
	async fn update_payment_status(
		&self,
		id: &str,
		new_status: PaymentStatus,
		failure_reason: Option<String>,
	) -> Result<Payment, StoreError>;
}

/// A backend serving both stores over one shared backing state.
///
/// Implementing both traits over the same state is what makes the combined
/// order-plus-payment commit in `commit_transition` genuinely atomic.
pub trait StoreBackend: OrderStore + PaymentStore {}

impl<T: OrderStore + PaymentStore> StoreBackend for T {}

/// Type alias for store factory functions.
///
/// This is the function signature that all storage backends must provide to
/// create instances of their store.
pub type StoreFactory = fn(&toml::Value) -> Result<Arc<dyn StoreBackend>, StoreError>;

/// Registry trait for storage backends.
///
/// This trait extends the base ImplementationRegistry to specify that
/// storage backends must provide a StoreFactory.
pub trait StoreRegistry: ImplementationRegistry<Factory = StoreFactory> {}

/// Get all registered storage backends.
///
/// Returns a vector of (name, factory) tuples for all available backends.
/// The service binary uses this to resolve the configured backend name.
pub fn get_all_implementations() -> Vec<(&'static str, StoreFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}
