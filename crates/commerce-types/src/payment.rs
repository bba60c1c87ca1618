//! Payment types for the commerce backend.
//!
//! This module defines payment attempt records and the payment status axis.
//! An order may accumulate multiple payment attempts (retries after failure);
//! each attempt is its own record and is only ever transitioned forward.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents a single payment attempt against an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
	/// Unique identifier in the format `PAY-YYYYMMDDNNNNN`.
	pub id: String,
	/// Identifier of the order this attempt pays for.
	pub order_id: String,
	/// Amount charged by this attempt.
	pub amount: Decimal,
	/// Payment method used (e.g., "credit_card").
	pub payment_method: String,
	/// Current status of this attempt.
	pub status: PaymentStatus,
	/// External payment processor transaction identifier.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub transaction_id: Option<String>,
	/// Masked payment-detail snapshot (never raw card data).
	pub payment_details: serde_json::Value,
	/// Gateway response snapshot.
	pub gateway_response: serde_json::Value,
	/// Timestamp when the attempt succeeded. Mutually exclusive with `failed_at`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub processed_at: Option<DateTime<Utc>>,
	/// Timestamp when the attempt failed. Mutually exclusive with `processed_at`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub failed_at: Option<DateTime<Utc>>,
	/// Failure reason; set iff status is `failed`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub failure_reason: Option<String>,
	/// Timestamp when this attempt was created.
	pub created_at: DateTime<Utc>,
	/// Timestamp when this attempt was last updated.
	pub updated_at: DateTime<Utc>,
}

/// Status of a payment attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
	/// Attempt recorded, gateway outcome not yet known.
	Pending,
	/// Funds authorized but not yet captured.
	Authorized,
	/// Funds captured, awaiting final confirmation.
	Captured,
	/// Payment completed successfully.
	Succeeded,
	/// Payment failed.
	Failed,
	/// A succeeded payment was refunded.
	Refunded,
}

impl PaymentStatus {
	/// Returns true if no further status update is permitted.
	pub fn is_terminal(&self) -> bool {
		matches!(
			self,
			PaymentStatus::Succeeded | PaymentStatus::Failed | PaymentStatus::Refunded
		)
	}
}

impl fmt::Display for PaymentStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			PaymentStatus::Pending => "pending",
			PaymentStatus::Authorized => "authorized",
			PaymentStatus::Captured => "captured",
			PaymentStatus::Succeeded => "succeeded",
			PaymentStatus::Failed => "failed",
			PaymentStatus::Refunded => "refunded",
		};
		write!(f, "{}", s)
	}
}

/// A payment status update carried by an accepted order transition.
///
/// The order service applies this in the same atomic commit as the order
/// patch so the order's payment status mirror never drifts from the payment
/// row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentUpdate {
	/// Identifier of the payment to update.
	pub payment_id: String,
	/// Status to transition the payment to.
	pub status: PaymentStatus,
	/// Failure reason, for transitions to `failed`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub failure_reason: Option<String>,
}
