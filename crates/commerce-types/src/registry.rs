//! Registry trait for self-registering implementations.
//!
//! This module provides the base trait that pluggable implementations (the
//! storage backends) use to register themselves with their configuration name
//! and factory function.

/// Base trait for implementation registries.
///
/// Each backend module must provide a Registry struct that implements this
/// trait, declaring the name used in configuration files and a factory
/// function that builds the backend from its configuration section.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation.
	///
	/// This should match the value of `storage.backend` in the TOML
	/// configuration, for example "memory" or "file".
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
