//! Shared record state for the in-process storage backends.
//!
//! Both backends keep the full record set in memory behind a lock; the file
//! backend additionally snapshots this state to disk after each write. All
//! mutation methods validate first and mutate second, so a returned error
//! means prior state is untouched — that is what makes the backends' commits
//! atomic under their outer lock.

use chrono::Utc;
use commerce_lifecycle::payment::is_valid_payment_transition;
use commerce_types::{
	HistoryDraft, Order, OrderItem, OrderPatch, OrderRecord, OrderStatusHistory, Payment,
	PaymentStatus, PaymentUpdate,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::StoreError;

/// An order row with its items and version counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredOrder {
	pub order: Order,
	pub items: Vec<OrderItem>,
	pub version: u64,
}

impl StoredOrder {
	fn record(&self) -> OrderRecord {
		OrderRecord {
			order: self.order.clone(),
			items: self.items.clone(),
			version: self.version,
		}
	}
}

/// The complete record set: orders, histories, and payment attempts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct StoreState {
	orders: HashMap<String, StoredOrder>,
	history: HashMap<String, Vec<OrderStatusHistory>>,
	payments: HashMap<String, Payment>,
	/// Payment ids per order, in creation order.
	payments_by_order: HashMap<String, Vec<String>>,
}

impl StoreState {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn create_order(&mut self, order: Order, items: Vec<OrderItem>) -> Result<(), StoreError> {
		if self.orders.contains_key(&order.id) {
			return Err(StoreError::Conflict(format!(
				"order {} already exists",
				order.id
			)));
		}

		let initial = OrderStatusHistory {
			order_id: order.id.clone(),
			from_status: None,
			to_status: order.status,
			note: None,
			changed_by: None,
			created_at: Utc::now(),
		};

		self.history.insert(order.id.clone(), vec![initial]);
		self.orders.insert(
			order.id.clone(),
			StoredOrder {
				order,
				items,
				version: 1,
			},
		);
		Ok(())
	}

	pub fn get_order(&self, id: &str) -> Result<OrderRecord, StoreError> {
		self.orders
			.get(id)
			.map(StoredOrder::record)
			.ok_or(StoreError::NotFound)
	}

	pub fn history(&self, id: &str) -> Result<Vec<OrderStatusHistory>, StoreError> {
		if !self.orders.contains_key(id) {
			return Err(StoreError::NotFound);
		}
		Ok(self.history.get(id).cloned().unwrap_or_default())
	}

	pub fn commit_transition(
		&mut self,
		id: &str,
		expected_version: u64,
		patch: OrderPatch,
		history: HistoryDraft,
		actor: Option<String>,
		payment_update: Option<PaymentUpdate>,
	) -> Result<OrderRecord, StoreError> {
		// Validate everything before touching any row.
		let stored = self.orders.get(id).ok_or(StoreError::NotFound)?;
		if stored.version != expected_version {
			return Err(StoreError::Conflict(format!(
				"order {} is at version {}, transition was built against {}",
				id, stored.version, expected_version
			)));
		}

		if let Some(ref update) = payment_update {
			let payment = self
				.payments
				.get(&update.payment_id)
				.ok_or(StoreError::NotFound)?;
			check_payment_transition(payment, update.status)?;
		}

		let now = Utc::now();

		let stored = self.orders.get_mut(id).ok_or(StoreError::NotFound)?;
		stored.order.apply_patch(&patch, now);
		stored.version += 1;

		self.history
			.entry(id.to_string())
			.or_default()
			.push(OrderStatusHistory {
				order_id: id.to_string(),
				from_status: history.from_status,
				to_status: history.to_status,
				note: history.note,
				changed_by: actor,
				created_at: now,
			});

		if let Some(update) = payment_update {
			let payment = self
				.payments
				.get_mut(&update.payment_id)
				.ok_or(StoreError::NotFound)?;
			apply_payment_status(payment, update.status, update.failure_reason);
		}

		self.get_order(id)
	}

	pub fn create_payment(&mut self, payment: Payment) -> Result<(), StoreError> {
		if self.payments.contains_key(&payment.id) {
			return Err(StoreError::Conflict(format!(
				"payment {} already exists",
				payment.id
			)));
		}

		self.payments_by_order
			.entry(payment.order_id.clone())
			.or_default()
			.push(payment.id.clone());
		self.payments.insert(payment.id.clone(), payment);
		Ok(())
	}

	pub fn get_payment(&self, id: &str) -> Result<Payment, StoreError> {
		self.payments.get(id).cloned().ok_or(StoreError::NotFound)
	}

	pub fn latest_payment_for_order(&self, order_id: &str) -> Result<Option<Payment>, StoreError> {
		let latest = self
			.payments_by_order
			.get(order_id)
			.and_then(|ids| ids.last())
			.and_then(|id| self.payments.get(id))
			.cloned();
		Ok(latest)
	}

	pub fn update_payment_status(
		&mut self,
		id: &str,
		new_status: PaymentStatus,
		failure_reason: Option<String>,
	) -> Result<Payment, StoreError> {
		let payment = self.payments.get(id).ok_or(StoreError::NotFound)?;
		check_payment_transition(payment, new_status)?;

		let payment = self.payments.get_mut(id).ok_or(StoreError::NotFound)?;
		apply_payment_status(payment, new_status, failure_reason);
		Ok(payment.clone())
	}
}

/// Rejects updates to terminal payments and illegal payment transitions.
///
/// The transition table rules first: `succeeded -> refunded` is the one legal
/// exit from a terminal status. Everything else out of a terminal payment is
/// reported as terminal, the rest as an invalid transition.
fn check_payment_transition(payment: &Payment, to: PaymentStatus) -> Result<(), StoreError> {
	if is_valid_payment_transition(payment.status, to) {
		return Ok(());
	}
	if payment.status.is_terminal() {
		Err(StoreError::PaymentTerminal {
			id: payment.id.clone(),
			status: payment.status,
		})
	} else {
		Err(StoreError::InvalidPaymentTransition {
			from: payment.status,
			to,
		})
	}
}

/// Applies a validated status change, stamping the outcome timestamp.
fn apply_payment_status(
	payment: &mut Payment,
	new_status: PaymentStatus,
	failure_reason: Option<String>,
) {
	let now = Utc::now();
	payment.status = new_status;
	payment.updated_at = now;
	match new_status {
		PaymentStatus::Succeeded => {
			if payment.processed_at.is_none() {
				payment.processed_at = Some(now);
			}
		},
		PaymentStatus::Failed => {
			if payment.failed_at.is_none() {
				payment.failed_at = Some(now);
			}
			payment.failure_reason = failure_reason;
		},
		_ => {},
	}
}
