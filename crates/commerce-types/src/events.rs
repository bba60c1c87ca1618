//! Lifecycle event types applied to orders.
//!
//! Events are the requests the order service feeds to the state machine.
//! They name what happened (or what a caller wants to happen), never the
//! resulting status; the state machine alone decides the outcome.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An event requesting a transition in the order lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
	/// The active payment attempt completed successfully.
	PaymentSucceeded,
	/// A cancellation was requested before shipment.
	CancelRequested {
		/// Optional reason recorded in the audit trail.
		#[serde(skip_serializing_if = "Option::is_none")]
		note: Option<String>,
	},
	/// Fulfillment (picking, packing) started for a paid order.
	FulfillmentStarted,
	/// The order was handed to the carrier.
	Shipped {
		/// Carrier tracking number. Required for the transition to be accepted.
		#[serde(skip_serializing_if = "Option::is_none")]
		tracking_number: Option<String>,
	},
	/// The carrier confirmed delivery.
	Delivered,
	/// A refund was requested for a paid (or later) order.
	RefundRequested {
		/// Optional reason recorded in the audit trail.
		#[serde(skip_serializing_if = "Option::is_none")]
		note: Option<String>,
	},
}

impl fmt::Display for OrderEvent {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			OrderEvent::PaymentSucceeded => "payment_succeeded",
			OrderEvent::CancelRequested { .. } => "cancel_requested",
			OrderEvent::FulfillmentStarted => "fulfillment_started",
			OrderEvent::Shipped { .. } => "shipped",
			OrderEvent::Delivered => "delivered",
			OrderEvent::RefundRequested { .. } => "refund_requested",
		};
		write!(f, "{}", s)
	}
}
