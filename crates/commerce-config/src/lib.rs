//! Configuration module for the commerce backend.
//!
//! This module provides structures and utilities for managing service
//! configuration. It supports loading configuration from TOML files and
//! provides validation to ensure all required configuration values are
//! properly set before anything is constructed from them.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		let message = err.message().to_string();
		ConfigError::Parse(message)
	}
}

/// Main configuration structure for the commerce backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Configuration specific to this service instance.
	pub service: ServiceConfig,
	/// Configuration for the storage backend.
	pub storage: StorageConfig,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Configuration specific to the service instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Unique identifier for this service instance.
	pub id: String,
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Name of the backend to construct ("memory", "file").
	pub backend: String,
	/// Backend-specific configuration, validated by the backend's own schema.
	#[serde(default = "empty_table")]
	pub config: toml::Value,
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server should be started.
	#[serde(default = "default_api_enabled")]
	pub enabled: bool,
	/// Host address to bind to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to listen on.
	#[serde(default = "default_api_port")]
	pub port: u16,
}

fn empty_table() -> toml::Value {
	toml::Value::Table(toml::map::Map::new())
}

fn default_api_enabled() -> bool {
	true
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	8080
}

impl Config {
	/// Parses configuration from a TOML string and validates it.
	pub fn from_str(content: &str) -> Result<Self, ConfigError> {
		let config: Config = toml::from_str(content)?;
		config.validate()?;
		Ok(config)
	}

	/// Loads configuration from a file.
	pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let content = std::fs::read_to_string(path)?;
		Self::from_str(&content)
	}

	/// Loads configuration from a file without blocking the runtime.
	pub async fn from_file_async(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let content = tokio::fs::read_to_string(path).await?;
		Self::from_str(&content)
	}

	/// Validates the configuration values.
	///
	/// Backend-specific configuration is not checked here; the selected
	/// backend validates its own section against its schema at construction.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.trim().is_empty() {
			return Err(ConfigError::Validation(
				"service.id must not be empty".to_string(),
			));
		}
		if self.storage.backend.trim().is_empty() {
			return Err(ConfigError::Validation(
				"storage.backend must not be empty".to_string(),
			));
		}
		if !self.storage.config.is_table() {
			return Err(ConfigError::Validation(
				"storage.config must be a table".to_string(),
			));
		}
		if let Some(ref api) = self.api {
			if api.enabled && api.port == 0 {
				return Err(ConfigError::Validation(
					"api.port must be non-zero".to_string(),
				));
			}
			if api.enabled && api.host.trim().is_empty() {
				return Err(ConfigError::Validation(
					"api.host must not be empty".to_string(),
				));
			}
		}
		Ok(())
	}
}
