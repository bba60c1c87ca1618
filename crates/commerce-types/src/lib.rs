//! Common types module for the commerce backend.
//!
//! This module defines the core data types and structures shared by the
//! lifecycle, storage, and service layers. It provides a centralized location
//! for the order and payment data model to ensure consistency across all
//! components.

/// Lifecycle event types applied to orders.
pub mod events;
/// Append-only order status history types.
pub mod history;
/// Date-sequenced identifier generation for orders and payments.
pub mod ids;
/// Order, order item, and order patch types.
pub mod order;
/// Payment attempt types.
pub mod payment;
/// Registry trait for self-registering storage backends.
pub mod registry;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

// Re-export all types for convenient access
pub use events::*;
pub use history::*;
pub use ids::*;
pub use order::*;
pub use payment::*;
pub use registry::*;
pub use validation::*;
