//! Order status history types.
//!
//! The status history is the append-only audit trail of an order: one entry
//! per accepted transition, never updated or deleted. It is the sole source
//! of truth for how an order reached its current state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::OrderStatus;

/// A single entry in an order's status history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusHistory {
	/// Identifier of the order this entry belongs to.
	pub order_id: String,
	/// Status before the transition. `None` only for the initial entry.
	pub from_status: Option<OrderStatus>,
	/// Status after the transition.
	pub to_status: OrderStatus,
	/// Optional note recorded with the transition.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub note: Option<String>,
	/// Actor who triggered the transition, if known.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub changed_by: Option<String>,
	/// Timestamp when the entry was committed.
	pub created_at: DateTime<Utc>,
}

/// The history entry an accepted transition asks the store to append.
///
/// The store fills in the order identifier, actor, and commit timestamp when
/// it materializes the entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryDraft {
	/// Status the order is transitioning from.
	pub from_status: Option<OrderStatus>,
	/// Status the order is transitioning to.
	pub to_status: OrderStatus,
	/// Optional note to record.
	pub note: Option<String>,
}
