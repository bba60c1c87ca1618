//! Order state machine for the commerce backend.
//!
//! This module contains the pure decision logic for the order lifecycle:
//! given the current order, its most recent payment attempt, and a requested
//! event, [`decide`] either produces the [`Transition`] to commit or a typed
//! [`RejectionReason`]. The function performs no I/O and is total over its
//! input domain: every (status, event) pair has a defined outcome, and a
//! rejection has no side effects by construction.
//!
//! Order statuses move `pending -> paid -> processing -> shipped ->
//! delivered`, with `cancelled` reachable from `pending`/`paid`/`processing`
//! and `refunded` reachable from `paid` or later via an explicit refund
//! event. Once shipped, cancellation is no longer possible; the only exit is
//! the refund flow.

use commerce_types::{
	HistoryDraft, Order, OrderEvent, OrderPatch, OrderStatus, Payment, PaymentStatus,
	PaymentUpdate,
};
use thiserror::Error;

/// Payment-status transition rules.
pub mod payment;

/// The outcome of an accepted transition.
///
/// Carries everything the order service needs to persist atomically: the
/// field patch for the order row, the history entry to append, and the
/// payment-status update when the transition touches the payment axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
	/// Field updates to apply to the order.
	pub patch: OrderPatch,
	/// The audit-trail entry this transition produces.
	pub history: HistoryDraft,
	/// Payment update to commit alongside the order, if any.
	pub payment_update: Option<PaymentUpdate>,
}

impl Transition {
	/// Builds a transition moving the order from one status to another.
	fn new(from: OrderStatus, to: OrderStatus, note: Option<String>) -> Self {
		Self {
			patch: OrderPatch {
				status: Some(to),
				notes: note.clone(),
				..Default::default()
			},
			history: HistoryDraft {
				from_status: Some(from),
				to_status: to,
				note,
			},
			payment_update: None,
		}
	}
}

/// Reasons a requested transition is rejected.
///
/// Rejections are decisions, not faults: they are surfaced to the caller
/// as-is and are never retried automatically.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RejectionReason {
	/// The event is not legal from the order's current status.
	#[error("invalid transition: event '{event}' not allowed from status '{from}'")]
	InvalidTransition {
		/// Status the order was in when the event arrived.
		from: OrderStatus,
		/// Name of the rejected event.
		event: String,
	},
	/// The order is in a terminal status; nothing may follow.
	#[error("order is in terminal status '{status}'")]
	TerminalState {
		/// The terminal status.
		status: OrderStatus,
	},
	/// The event is legal from this status but a required condition is unmet.
	#[error("precondition failed: {message}")]
	PreconditionFailed {
		/// What was missing or inconsistent.
		message: String,
	},
}

impl RejectionReason {
	fn invalid(order: &Order, event: &OrderEvent) -> Self {
		RejectionReason::InvalidTransition {
			from: order.status,
			event: event.to_string(),
		}
	}

	fn terminal(order: &Order) -> Self {
		RejectionReason::TerminalState {
			status: order.status,
		}
	}

	fn precondition(message: impl Into<String>) -> Self {
		RejectionReason::PreconditionFailed {
			message: message.into(),
		}
	}
}

/// Decides whether the requested event is a legal transition.
///
/// `payment` is the order's most recent payment attempt, if any. The decision
/// is pure: accepted transitions describe the writes to perform, rejected
/// ones carry a typed reason and imply no store mutation.
pub fn decide(
	order: &Order,
	payment: Option<&Payment>,
	event: &OrderEvent,
) -> Result<Transition, RejectionReason> {
	match event {
		OrderEvent::PaymentSucceeded => decide_payment_succeeded(order, payment, event),
		OrderEvent::CancelRequested { note } => decide_cancel(order, event, note.clone()),
		OrderEvent::FulfillmentStarted => decide_fulfillment(order, event),
		OrderEvent::Shipped { tracking_number } => {
			decide_shipped(order, event, tracking_number.as_deref())
		},
		OrderEvent::Delivered => decide_delivered(order, event),
		OrderEvent::RefundRequested { note } => {
			decide_refund(order, payment, event, note.clone())
		},
	}
}

fn decide_payment_succeeded(
	order: &Order,
	payment: Option<&Payment>,
	event: &OrderEvent,
) -> Result<Transition, RejectionReason> {
	match order.status {
		OrderStatus::Pending => {
			let payment = payment.ok_or_else(|| {
				RejectionReason::precondition("no payment attempt recorded for this order")
			})?;

			match payment.status {
				PaymentStatus::Failed | PaymentStatus::Refunded => {
					Err(RejectionReason::precondition(format!(
						"payment {} is {}, cannot mark order paid",
						payment.id, payment.status
					)))
				},
				current => {
					let mut transition =
						Transition::new(OrderStatus::Pending, OrderStatus::Paid, None);
					transition.patch.payment_status = Some(PaymentStatus::Succeeded);
					// The gateway may have reported success before the event
					// arrived; only emit an update if the row needs to move.
					if current != PaymentStatus::Succeeded {
						transition.payment_update = Some(PaymentUpdate {
							payment_id: payment.id.clone(),
							status: PaymentStatus::Succeeded,
							failure_reason: None,
						});
					}
					Ok(transition)
				},
			}
		},
		status if status.is_terminal() => Err(RejectionReason::terminal(order)),
		_ => Err(RejectionReason::invalid(order, event)),
	}
}

fn decide_cancel(
	order: &Order,
	event: &OrderEvent,
	note: Option<String>,
) -> Result<Transition, RejectionReason> {
	match order.status {
		OrderStatus::Pending | OrderStatus::Paid | OrderStatus::Processing => {
			let mut transition = Transition::new(order.status, OrderStatus::Cancelled, note);
			transition.patch.set_cancelled_at = true;
			Ok(transition)
		},
		// Cancellation after shipment must go through the refund flow.
		OrderStatus::Shipped => Err(RejectionReason::invalid(order, event)),
		_ => Err(RejectionReason::terminal(order)),
	}
}

fn decide_fulfillment(order: &Order, event: &OrderEvent) -> Result<Transition, RejectionReason> {
	match order.status {
		OrderStatus::Paid => Ok(Transition::new(
			OrderStatus::Paid,
			OrderStatus::Processing,
			None,
		)),
		status if status.is_terminal() => Err(RejectionReason::terminal(order)),
		_ => Err(RejectionReason::invalid(order, event)),
	}
}

fn decide_shipped(
	order: &Order,
	event: &OrderEvent,
	tracking_number: Option<&str>,
) -> Result<Transition, RejectionReason> {
	match order.status {
		OrderStatus::Processing => {
			let tracking = tracking_number
				.filter(|t| !t.trim().is_empty())
				.ok_or_else(|| {
					RejectionReason::precondition("tracking number required to mark order shipped")
				})?;

			let mut transition =
				Transition::new(OrderStatus::Processing, OrderStatus::Shipped, None);
			transition.patch.tracking_number = Some(tracking.to_string());
			transition.patch.set_shipped_at = true;
			Ok(transition)
		},
		status if status.is_terminal() => Err(RejectionReason::terminal(order)),
		_ => Err(RejectionReason::invalid(order, event)),
	}
}

fn decide_delivered(order: &Order, event: &OrderEvent) -> Result<Transition, RejectionReason> {
	match order.status {
		OrderStatus::Shipped => {
			let mut transition =
				Transition::new(OrderStatus::Shipped, OrderStatus::Delivered, None);
			transition.patch.set_delivered_at = true;
			Ok(transition)
		},
		status if status.is_terminal() => Err(RejectionReason::terminal(order)),
		_ => Err(RejectionReason::invalid(order, event)),
	}
}

fn decide_refund(
	order: &Order,
	payment: Option<&Payment>,
	event: &OrderEvent,
	note: Option<String>,
) -> Result<Transition, RejectionReason> {
	match order.status {
		OrderStatus::Paid
		| OrderStatus::Processing
		| OrderStatus::Shipped
		| OrderStatus::Delivered => {
			let payment = payment.ok_or_else(|| {
				RejectionReason::precondition("no payment attempt recorded for this order")
			})?;

			if payment.status != PaymentStatus::Succeeded {
				return Err(RejectionReason::precondition(format!(
					"payment {} is {}, only succeeded payments can be refunded",
					payment.id, payment.status
				)));
			}

			let mut transition = Transition::new(order.status, OrderStatus::Refunded, note);
			transition.patch.payment_status = Some(PaymentStatus::Refunded);
			transition.payment_update = Some(PaymentUpdate {
				payment_id: payment.id.clone(),
				status: PaymentStatus::Refunded,
				failure_reason: None,
			});
			Ok(transition)
		},
		OrderStatus::Pending => Err(RejectionReason::invalid(order, event)),
		_ => Err(RejectionReason::terminal(order)),
	}
}
