//! File-backed storage backend for the commerce backend.
//!
//! This module persists the record set as a JSON snapshot on the filesystem,
//! providing simple single-process durability without an external database.
//! The working copy lives in memory behind the same lock discipline as the
//! memory backend; every successful write replaces the snapshot atomically
//! (write to a temporary file, then rename). If the snapshot write fails the
//! in-memory mutation is rolled back, so callers never observe state the
//! disk does not hold.

use crate::implementations::state::StoreState;
use crate::{OrderStore, PaymentStore, StoreBackend, StoreError};
use async_trait::async_trait;
use commerce_types::{
	ConfigSchema, Field, FieldType, HistoryDraft, ImplementationRegistry, Order, OrderItem,
	OrderPatch, OrderRecord, OrderStatusHistory, Payment, PaymentStatus, PaymentUpdate, Schema,
	ValidationError,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;

/// Name of the snapshot file inside the configured storage directory.
const SNAPSHOT_FILE: &str = "commerce.json";

/// File-backed store implementation.
pub struct FileStore {
	/// Working copy of the record set.
	state: RwLock<StoreState>,
	/// Path of the JSON snapshot file.
	snapshot_path: PathBuf,
}

impl FileStore {
	/// Creates a FileStore rooted at the given directory, loading an existing
	/// snapshot if one is present.
	pub fn open(base_path: &Path) -> Result<Self, StoreError> {
		std::fs::create_dir_all(base_path)
			.map_err(|e| StoreError::Unavailable(e.to_string()))?;

		let snapshot_path = base_path.join(SNAPSHOT_FILE);
		let state = match std::fs::read(&snapshot_path) {
			Ok(bytes) => serde_json::from_slice(&bytes)
				.map_err(|e| StoreError::Serialization(e.to_string()))?,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreState::new(),
			Err(e) => return Err(StoreError::Unavailable(e.to_string())),
		};

		Ok(Self {
			state: RwLock::new(state),
			snapshot_path,
		})
	}

	/// Writes the snapshot to a temporary file and renames it into place.
	async fn persist(&self, state: &StoreState) -> Result<(), StoreError> {
		let bytes = serde_json::to_vec_pretty(state)
			.map_err(|e| StoreError::Serialization(e.to_string()))?;

		let tmp_path = self.snapshot_path.with_extension("json.tmp");
		fs::write(&tmp_path, &bytes)
			.await
			.map_err(|e| StoreError::Unavailable(e.to_string()))?;
		fs::rename(&tmp_path, &self.snapshot_path)
			.await
			.map_err(|e| StoreError::Unavailable(e.to_string()))?;
		Ok(())
	}

	/// Runs a mutation against the working copy and persists the result.
	///
	/// The mutation only sticks if both it and the snapshot write succeed;
	/// otherwise the prior state is restored.
	async fn mutate<T, F>(&self, mutation: F) -> Result<T, StoreError>
	where
		F: FnOnce(&mut StoreState) -> Result<T, StoreError>,
	{
		let mut state = self.state.write().await;
		let backup = state.clone();

		let result = mutation(&mut state)?;

		if let Err(e) = self.persist(&state).await {
			tracing::error!(error = %e, "Failed to persist snapshot, rolling back");
			*state = backup;
			return Err(e);
		}

		Ok(result)
	}
}

#[async_trait]
impl OrderStore for FileStore {
	async fn create_order(&self, order: Order, items: Vec<OrderItem>) -> Result<(), StoreError> {
		self.mutate(|state| state.create_order(order, items)).await
	}

	async fn get_order(&self, id: &str) -> Result<OrderRecord, StoreError> {
		let state = self.state.read().await;
		state.get_order(id)
	}

	async fn history(&self, id: &str) -> Result<Vec<OrderStatusHistory>, StoreError> {
		let state = self.state.read().await;
		state.history(id)
	}

	async fn commit_transition(
		&self,
		id: &str,
		expected_version: u64,
		patch: OrderPatch,
		history: HistoryDraft,
		actor: Option<String>,
		payment_update: Option<PaymentUpdate>,
	) -> Result<OrderRecord, StoreError> {
		self.mutate(|state| {
			state.commit_transition(id, expected_version, patch, history, actor, payment_update)
		})
		.await
	}
}

#[async_trait]
impl PaymentStore for FileStore {
	async fn create_payment(&self, payment: Payment) -> Result<(), StoreError> {
		self.mutate(|state| state.create_payment(payment)).await
	}

	async fn get_payment(&self, id: &str) -> Result<Payment, StoreError> {
		let state = self.state.read().await;
		state.get_payment(id)
	}

	async fn latest_payment_for_order(
		&self,
		order_id: &str,
	) -> Result<Option<Payment>, StoreError> {
		let state = self.state.read().await;
		state.latest_payment_for_order(order_id)
	}

	async fn update_payment_status(
		&self,
		id: &str,
		new_status: PaymentStatus,
		failure_reason: Option<String>,
	) -> Result<Payment, StoreError> {
		self.mutate(|state| state.update_payment_status(id, new_status, failure_reason))
			.await
	}
}

/// Registry for the file store implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = crate::StoreFactory;

	fn factory() -> Self::Factory {
		create_store
	}
}

impl crate::StoreRegistry for Registry {}

/// Configuration schema for FileStore.
pub struct FileStoreSchema;

impl ConfigSchema for FileStoreSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("storage_path", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some(s) if !s.trim().is_empty() => Ok(()),
						_ => Err("storage_path must be a non-empty string".to_string()),
					}
				}),
			],
			vec![],
		);
		schema.validate(config)
	}
}

/// Factory function to create a file store from configuration.
///
/// Configuration parameters:
/// - `storage_path`: directory the JSON snapshot lives in (required)
pub fn create_store(config: &toml::Value) -> Result<Arc<dyn StoreBackend>, StoreError> {
	FileStoreSchema
		.validate(config)
		.map_err(|e| StoreError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.ok_or_else(|| StoreError::Configuration("storage_path is required".to_string()))?;

	Ok(Arc::new(FileStore::open(Path::new(storage_path))?))
}
