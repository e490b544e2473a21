//! Optimistic synchronization of owner-scoped selection sets.
//!
//! A consumer attaches an engine to an owner key, toggles item membership
//! against an in-memory working set, and the engine persists whole-set
//! snapshots to a backend after a quiet period, rolling back to the last
//! confirmed snapshot when a write fails.

/// Engine: state container, debounce driver, and persistence seam.
pub mod engine;

pub use engine::SelectionSync;
pub use engine::store::{MemorySelectionStore, SelectionStore, StoreError};
pub use engine::types::{DEBOUNCE_WINDOW, GroupKey, OwnerKey, SelectionId, SyncStatus};
