//! Persistence gateway between the engine and its backend.
//!
//! The gateway is a pure pass-through: no retries, no batching. Coalescing
//! and rollback live in the engine.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

use super::types::{OwnerKey, SelectionId};

/// Errors surfaced by a [`SelectionStore`] backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
	/// The backend rejected or failed a load call.
	#[error("selection load failed: {0}")]
	Load(String),

	/// The backend rejected or failed a save call.
	#[error("selection save failed: {0}")]
	Save(String),
}

/// Backend collaborator persisting whole-set snapshots per owner.
#[async_trait]
pub trait SelectionStore: Send + Sync {
	/// Returns the persisted membership set for `owner`.
	async fn load(&self, owner: &OwnerKey) -> Result<HashSet<SelectionId>, StoreError>;

	/// Replaces the persisted set for `owner` with `snapshot`.
	///
	/// Succeeds or fails atomically; partial writes are a backend bug.
	async fn save(&self, owner: &OwnerKey, snapshot: &HashSet<SelectionId>) -> Result<(), StoreError>;
}

/// In-process [`SelectionStore`] keyed by owner.
#[derive(Debug, Default)]
pub struct MemorySelectionStore {
	sets: Mutex<HashMap<OwnerKey, HashSet<SelectionId>>>,
}

impl MemorySelectionStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the persisted set for `owner`, if one was ever saved.
	pub fn get(&self, owner: &OwnerKey) -> Option<HashSet<SelectionId>> {
		self.sets.lock().get(owner).cloned()
	}
}

#[async_trait]
impl SelectionStore for MemorySelectionStore {
	async fn load(&self, owner: &OwnerKey) -> Result<HashSet<SelectionId>, StoreError> {
		Ok(self.sets.lock().get(owner).cloned().unwrap_or_default())
	}

	async fn save(&self, owner: &OwnerKey, snapshot: &HashSet<SelectionId>) -> Result<(), StoreError> {
		self.sets.lock().insert(owner.clone(), snapshot.clone());
		Ok(())
	}
}
