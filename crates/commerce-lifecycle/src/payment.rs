//! Payment-status transition rules.
//!
//! The payment axis is independent of the order axis: `pending -> authorized
//! -> captured -> succeeded`, with `failed` reachable from
//! `pending`/`authorized` and `refunded` from `succeeded`. Gateways do not
//! always report intermediate states, so forward skips (e.g. `pending ->
//! succeeded`) are legal. Terminal payments never move again; a retry after
//! failure is a new payment attempt, not a resurrection.

use commerce_types::PaymentStatus;

/// Checks whether a payment may move from one status to another.
pub fn is_valid_payment_transition(from: PaymentStatus, to: PaymentStatus) -> bool {
	use PaymentStatus::*;

	match (from, to) {
		(Pending, Authorized) | (Pending, Captured) | (Pending, Succeeded) | (Pending, Failed) => {
			true
		},
		(Authorized, Captured) | (Authorized, Succeeded) | (Authorized, Failed) => true,
		(Captured, Succeeded) => true,
		(Succeeded, Refunded) => true,
		_ => false,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use PaymentStatus::*;

	#[test]
	fn forward_skips_are_allowed() {
		assert!(is_valid_payment_transition(Pending, Succeeded));
		assert!(is_valid_payment_transition(Pending, Captured));
		assert!(is_valid_payment_transition(Authorized, Succeeded));
	}

	#[test]
	fn failure_only_before_capture() {
		assert!(is_valid_payment_transition(Pending, Failed));
		assert!(is_valid_payment_transition(Authorized, Failed));
		assert!(!is_valid_payment_transition(Captured, Failed));
		assert!(!is_valid_payment_transition(Succeeded, Failed));
	}

	#[test]
	fn refund_only_from_succeeded() {
		assert!(is_valid_payment_transition(Succeeded, Refunded));
		assert!(!is_valid_payment_transition(Captured, Refunded));
		assert!(!is_valid_payment_transition(Failed, Refunded));
	}

	#[test]
	fn terminal_statuses_never_move() {
		for from in [Succeeded, Failed, Refunded] {
			for to in [Pending, Authorized, Captured, Succeeded, Failed] {
				assert!(!is_valid_payment_transition(from, to));
			}
		}
		// The single exception on the terminal side.
		assert!(is_valid_payment_transition(Succeeded, Refunded));
	}

	#[test]
	fn no_backward_movement() {
		assert!(!is_valid_payment_transition(Captured, Authorized));
		assert!(!is_valid_payment_transition(Authorized, Pending));
		assert!(!is_valid_payment_transition(Succeeded, Captured));
	}
}
