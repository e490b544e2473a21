//! Engine test harness plus the suites for mutation, debounce, rollback,
//! and lifecycle behavior.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::advance;

use super::store::{SelectionStore, StoreError};
use super::types::{DEBOUNCE_WINDOW, OwnerKey, SelectionId, SyncPolicy, SyncStatus};
use super::*;


/// Scripted [`SelectionStore`] with call counters and completion barriers.
///
/// Loads and saves can be gated behind a [`Notify`] so tests control
/// completion order deterministically; ungated calls complete immediately.
pub(crate) struct MockStore {
	pub(crate) load_count: AtomicUsize,
	pub(crate) save_count: AtomicUsize,
	load_result: parking_lot::Mutex<Result<HashSet<SelectionId>, StoreError>>,
	/// Per-call scripted save outcomes; exhausted entries fall back to `Ok`.
	save_results: parking_lot::Mutex<VecDeque<Result<(), StoreError>>>,
	/// Snapshots received, in call order, captured at call time.
	pub(crate) saved: parking_lot::Mutex<Vec<HashSet<SelectionId>>>,
	gate_loads: AtomicBool,
	gate_saves: AtomicBool,
	notify: Arc<Notify>,
}

impl MockStore {
	pub(crate) fn new() -> Arc<Self> {
		Arc::new(Self {
			load_count: AtomicUsize::new(0),
			save_count: AtomicUsize::new(0),
			load_result: parking_lot::Mutex::new(Ok(HashSet::new())),
			save_results: parking_lot::Mutex::new(VecDeque::new()),
			saved: parking_lot::Mutex::new(Vec::new()),
			gate_loads: AtomicBool::new(false),
			gate_saves: AtomicBool::new(false),
			notify: Arc::new(Notify::new()),
		})
	}

	pub(crate) fn with_load(set: HashSet<SelectionId>) -> Arc<Self> {
		let store = Self::new();
		*store.load_result.lock() = Ok(set);
		store
	}

	pub(crate) fn fail_loads(&self, msg: &str) {
		*self.load_result.lock() = Err(StoreError::Load(msg.to_string()));
	}

	/// Scripts the outcome of the next save calls, in order.
	pub(crate) fn script_saves(&self, outcomes: impl IntoIterator<Item = Result<(), StoreError>>) {
		self.save_results.lock().extend(outcomes);
	}

	pub(crate) fn gate_loads(&self) {
		self.gate_loads.store(true, Ordering::SeqCst);
	}

	pub(crate) fn gate_saves(&self) {
		self.gate_saves.store(true, Ordering::SeqCst);
	}

	/// Allows one pending gated call to proceed.
	pub(crate) fn proceed(&self) {
		self.notify.notify_one();
	}

	/// Allows all pending gated calls to proceed immediately.
	pub(crate) fn proceed_all(&self) {
		for _ in 0..100 {
			self.notify.notify_one();
		}
	}
}

#[async_trait]
impl SelectionStore for MockStore {
	async fn load(&self, _owner: &OwnerKey) -> Result<HashSet<SelectionId>, StoreError> {
		self.load_count.fetch_add(1, Ordering::SeqCst);
		if self.gate_loads.load(Ordering::SeqCst) {
			self.notify.notified().await;
		}
		self.load_result.lock().clone()
	}

	async fn save(&self, _owner: &OwnerKey, snapshot: &HashSet<SelectionId>) -> Result<(), StoreError> {
		self.save_count.fetch_add(1, Ordering::SeqCst);
		self.saved.lock().push(snapshot.clone());
		if self.gate_saves.load(Ordering::SeqCst) {
			self.notify.notified().await;
		}
		self.save_results.lock().pop_front().unwrap_or(Ok(()))
	}
}

/// RAII guard that releases all gated store calls on drop, preventing hangs.
pub(crate) struct StoreGuard(pub(crate) Arc<MockStore>);

impl Drop for StoreGuard {
	fn drop(&mut self) {
		self.0.proceed_all();
	}
}

/// Yields to the runtime so the driver can observe wakes and completions.
///
/// Never blocks on a timer, so paused-time tests do not auto-advance here.
pub(crate) async fn settle() {
	for _ in 0..16 {
		tokio::task::yield_now().await;
	}
}

pub(crate) fn ids<const N: usize>(raw: [&str; N]) -> HashSet<SelectionId> {
	raw.into_iter().map(SelectionId::from).collect()
}

pub(crate) fn as_store(store: &Arc<MockStore>) -> Arc<dyn SelectionStore> {
	store.clone()
}

/// Attaches an engine for a fixed valid owner and waits out the initial load.
pub(crate) async fn attach_loaded(store: &Arc<MockStore>) -> SelectionSync {
	let engine = SelectionSync::attach("user123", as_store(store));
	settle().await;
	engine
}
