//! Date-sequenced identifier generation.
//!
//! Orders and payments are identified by `ORD-YYYYMMDDNNNNN` and
//! `PAY-YYYYMMDDNNNNN` strings: a prefix, the UTC date, and a five-digit
//! sequence that resets when the date changes. Uniqueness within a single
//! generator instance is this module's contract; cross-instance uniqueness
//! belongs to whoever deploys more than one.

use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// Identifier prefixes for the entities this generator serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdPrefix {
	/// Order identifiers (`ORD-`).
	Order,
	/// Payment identifiers (`PAY-`).
	Payment,
}

impl IdPrefix {
	/// Returns the string prefix used in generated identifiers.
	pub fn as_str(&self) -> &'static str {
		match self {
			IdPrefix::Order => "ORD",
			IdPrefix::Payment => "PAY",
		}
	}
}

/// Per-prefix sequence state.
#[derive(Debug, Clone, Copy)]
struct DaySequence {
	date: NaiveDate,
	next: u64,
}

/// Generates date-sequenced identifiers.
///
/// Each prefix keeps its own counter; counters start at 1 and reset whenever
/// the UTC date rolls over.
#[derive(Debug, Default)]
pub struct IdGenerator {
	sequences: Mutex<HashMap<IdPrefix, DaySequence>>,
}

impl IdGenerator {
	/// Creates a new generator with all sequences at their start.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the next identifier for the given prefix.
	pub fn next(&self, prefix: IdPrefix) -> String {
		self.next_for_date(prefix, Utc::now().date_naive())
	}

	/// Returns the next identifier for the given prefix and date.
	///
	/// Split out from [`next`](Self::next) so tests can drive the date
	/// rollover deterministically.
	pub fn next_for_date(&self, prefix: IdPrefix, date: NaiveDate) -> String {
		let mut sequences = self.sequences.lock().unwrap_or_else(|e| e.into_inner());
		let entry = sequences
			.entry(prefix)
			.or_insert(DaySequence { date, next: 1 });

		if entry.date != date {
			entry.date = date;
			entry.next = 1;
		}

		let sequence = entry.next;
		entry.next += 1;

		format!("{}-{}{:05}", prefix.as_str(), date.format("%Y%m%d"), sequence)
	}
}
