//! Order types for the commerce backend.
//!
//! This module defines the order aggregate: the order row itself, its line
//! items, the status enum governing the fulfillment lifecycle, and the patch
//! type used to apply state-machine-approved field updates.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::PaymentStatus;

/// Represents a customer order with its fulfillment and payment state.
///
/// An order is created from a checkout request and carries a snapshot of the
/// shipping address and monetary totals frozen at creation time. Its status
/// is mutated only through state-machine-approved transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
	/// Unique identifier in the format `ORD-YYYYMMDDNNNNN`. Immutable.
	pub id: String,
	/// Identifier of the user who placed the order.
	pub user_id: i64,
	/// Current fulfillment status of the order.
	pub status: OrderStatus,
	/// Sum of all line item totals.
	pub subtotal: Decimal,
	/// Shipping cost charged for this order.
	pub shipping_cost: Decimal,
	/// Tax amount charged for this order.
	pub tax_amount: Decimal,
	/// Grand total; always `subtotal + shipping_cost + tax_amount`.
	pub total_amount: Decimal,
	/// Payment method chosen at checkout (e.g., "credit_card").
	pub payment_method: String,
	/// Payment status mirror, kept consistent with the latest payment attempt.
	pub payment_status: PaymentStatus,
	/// Complete shipping address snapshot taken at creation. Never re-derived
	/// from the live address.
	pub shipping_address: serde_json::Value,
	/// Carrier tracking number, set when the order ships.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub tracking_number: Option<String>,
	/// Free-form notes attached to the order.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub notes: Option<String>,
	/// Timestamp of cancellation, if the order was cancelled.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cancelled_at: Option<DateTime<Utc>>,
	/// Timestamp of shipment, if the order has shipped.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub shipped_at: Option<DateTime<Utc>>,
	/// Timestamp of delivery, if the order has been delivered.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub delivered_at: Option<DateTime<Utc>>,
	/// Timestamp when this order was created.
	pub created_at: DateTime<Utc>,
	/// Timestamp when this order was last updated.
	pub updated_at: DateTime<Utc>,
}

impl Order {
	/// Checks the totals invariant: `total_amount == subtotal + shipping_cost + tax_amount`.
	pub fn totals_consistent(&self) -> bool {
		self.total_amount == self.subtotal + self.shipping_cost + self.tax_amount
	}

	/// Applies a field patch in place.
	///
	/// Timestamps are set-at-most-once: a patch never overwrites an already
	/// set `cancelled_at`, `shipped_at`, or `delivered_at`.
	pub fn apply_patch(&mut self, patch: &OrderPatch, now: DateTime<Utc>) {
		if let Some(status) = patch.status {
			self.status = status;
		}
		if let Some(payment_status) = patch.payment_status {
			self.payment_status = payment_status;
		}
		if let Some(ref tracking) = patch.tracking_number {
			self.tracking_number = Some(tracking.clone());
		}
		if let Some(ref notes) = patch.notes {
			self.notes = Some(notes.clone());
		}
		if patch.set_cancelled_at && self.cancelled_at.is_none() {
			self.cancelled_at = Some(now);
		}
		if patch.set_shipped_at && self.shipped_at.is_none() {
			self.shipped_at = Some(now);
		}
		if patch.set_delivered_at && self.delivered_at.is_none() {
			self.delivered_at = Some(now);
		}
		self.updated_at = now;
	}
}

/// Represents a line item within an order.
///
/// Items carry a denormalized snapshot of the product taken at order time and
/// are never mutated after creation. They are owned by their order and are
/// deleted with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
	/// Identifier of the owning order.
	pub order_id: String,
	/// Identifier of the purchased product.
	pub product_id: i64,
	/// Product name snapshot at time of order.
	pub product_name: String,
	/// Number of units purchased. Always positive.
	pub quantity: u32,
	/// Price per unit at time of order. Non-negative.
	pub unit_price: Decimal,
	/// Line total; always `quantity * unit_price`.
	pub total_price: Decimal,
	/// Product attribute snapshot at time of order.
	pub product_snapshot: serde_json::Value,
	/// Timestamp when this item was created.
	pub created_at: DateTime<Utc>,
}

/// An order together with its items and the store-level version counter.
///
/// The version increments on every committed transition and backs the
/// optimistic concurrency check: a transition built against a stale version
/// fails with a conflict instead of committing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
	/// The order row.
	pub order: Order,
	/// Line items belonging to the order.
	pub items: Vec<OrderItem>,
	/// Monotonically increasing version, checked-and-incremented on write.
	pub version: u64,
}

/// Status of an order in the fulfillment lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
	/// Order has been created but payment has not completed.
	Pending,
	/// Payment has succeeded; order awaits fulfillment.
	Paid,
	/// Fulfillment has started (picking, packing).
	Processing,
	/// Order has been handed to the carrier.
	Shipped,
	/// Order has been delivered to the customer.
	Delivered,
	/// Order was cancelled before shipment.
	Cancelled,
	/// Order was refunded after payment.
	Refunded,
}

impl OrderStatus {
	/// Returns true if no further transition is permitted from this status.
	pub fn is_terminal(&self) -> bool {
		matches!(
			self,
			OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Refunded
		)
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			OrderStatus::Pending => "pending",
			OrderStatus::Paid => "paid",
			OrderStatus::Processing => "processing",
			OrderStatus::Shipped => "shipped",
			OrderStatus::Delivered => "delivered",
			OrderStatus::Cancelled => "cancelled",
			OrderStatus::Refunded => "refunded",
		};
		write!(f, "{}", s)
	}
}

/// Field updates produced by an accepted transition.
///
/// A patch only ever moves an order forward: timestamps are flagged for
/// setting rather than carried as values so the store stamps them at commit
/// time, and an already set timestamp is never overwritten.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OrderPatch {
	/// New order status, if the transition changes it.
	pub status: Option<OrderStatus>,
	/// New payment status mirror, if the transition touches the payment.
	pub payment_status: Option<PaymentStatus>,
	/// Tracking number to record, for shipment transitions.
	pub tracking_number: Option<String>,
	/// Notes to record with the update.
	pub notes: Option<String>,
	/// Stamp `cancelled_at` at commit time.
	#[serde(default)]
	pub set_cancelled_at: bool,
	/// Stamp `shipped_at` at commit time.
	#[serde(default)]
	pub set_shipped_at: bool,
	/// Stamp `delivered_at` at commit time.
	#[serde(default)]
	pub set_delivered_at: bool,
}
