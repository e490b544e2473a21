//! Optimistic set-selection synchronization.
//!
//! Goals:
//! - mutations are synchronous and visible to the caller immediately
//! - bursts of mutations coalesce into one whole-set write after a quiet period
//! - failed writes roll back to the last confirmed snapshot
//! - teardown cancels the armed flush and discards in-flight completions

mod state;
pub mod store;
pub mod types;

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

use self::state::SelectionState;
use self::store::{SelectionStore, StoreError};
use self::types::{GroupKey, OwnerKey, SelectionId, SyncPolicy, SyncStatus};

/// Attached selection-sync engine scoped to one owner key.
///
/// Created by [`attach`](Self::attach); owned exclusively by a single
/// consumer for the duration of the attachment. Mutations apply to the
/// in-memory working set immediately and are persisted as whole-set
/// snapshots after a quiet period of [`types::DEBOUNCE_WINDOW`].
///
/// Dropping the engine detaches it: the armed flush is cancelled and any
/// in-flight load/save result is discarded on arrival.
pub struct SelectionSync {
	shared: Arc<Shared>,
	driver: Option<JoinHandle<()>>,
}

struct Shared {
	owner: OwnerKey,
	policy: SyncPolicy,
	store: Arc<dyn SelectionStore>,
	/// Never locked across an await point.
	state: Mutex<SelectionState>,
	/// Wakes the driver when the deadline moves.
	wake: Notify,
	cancel: CancellationToken,
	status_tx: watch::Sender<SyncStatus>,
}

impl SelectionSync {
	/// Attaches an engine for `owner`, loading the persisted set in the
	/// background. Must be called within a tokio runtime.
	///
	/// An invalid (empty or whitespace) owner key yields an inert engine:
	/// both sets start empty, the backend is never called, and mutations
	/// stay local. This is a defensive no-op path, not an error.
	pub fn attach(owner: impl Into<OwnerKey>, store: Arc<dyn SelectionStore>) -> Self {
		Self::attach_with_policy(owner.into(), store, SyncPolicy::default())
	}

	pub(crate) fn attach_with_policy(owner: OwnerKey, store: Arc<dyn SelectionStore>, policy: SyncPolicy) -> Self {
		if !owner.is_valid() {
			tracing::debug!("selection sync attached inert: invalid owner key");
			let (status_tx, _) = watch::channel(SyncStatus::Idle);
			let shared = Arc::new(Shared {
				owner,
				policy,
				store,
				state: Mutex::new(SelectionState::new_inert()),
				wake: Notify::new(),
				cancel: CancellationToken::new(),
				status_tx,
			});
			return Self {
				shared,
				driver: None,
			};
		}

		let (status_tx, _) = watch::channel(SyncStatus::Loading);
		let shared = Arc::new(Shared {
			owner,
			policy,
			store,
			state: Mutex::new(SelectionState::new()),
			wake: Notify::new(),
			cancel: CancellationToken::new(),
			status_tx,
		});
		let driver = tokio::spawn(drive(Arc::clone(&shared)));
		Self {
			shared,
			driver: Some(driver),
		}
	}

	/// Flips membership of `id` in the working set and re-arms the flush.
	///
	/// Empty identifiers are ignored. An odd number of toggles of one id
	/// nets to a single flip; an even number nets to no change.
	pub fn toggle(&self, id: impl Into<SelectionId>) {
		let id = id.into();
		if id.is_empty() {
			return;
		}
		{
			let mut state = self.shared.state.lock();
			state.toggle(id);
			self.shared.note_mutation(&mut state);
		}
		self.shared.wake.notify_one();
	}

	/// Unions `ids` into the working set (duplicates collapse, also across
	/// groups) and re-arms the flush.
	///
	/// An empty group is a strict no-op: no state change, no reschedule.
	/// `group` is informational only and carries no uniqueness constraint.
	pub fn add_group<I, T>(&self, group: impl Into<GroupKey>, ids: I)
	where
		I: IntoIterator<Item = T>,
		T: Into<SelectionId>,
	{
		let group = group.into();
		let applied = {
			let mut state = self.shared.state.lock();
			let applied = state.add_group(ids.into_iter().map(Into::into));
			if applied > 0 {
				self.shared.note_mutation(&mut state);
			}
			applied
		};
		if applied == 0 {
			return;
		}
		tracing::debug!(owner = %self.shared.owner, %group, ids = applied, "group selection applied");
		self.shared.wake.notify_one();
	}

	/// Snapshot of the current working set.
	pub fn selected(&self) -> HashSet<SelectionId> {
		self.shared.state.lock().working.clone()
	}

	pub fn contains(&self, id: impl Into<SelectionId>) -> bool {
		self.shared.state.lock().working.contains(&id.into())
	}

	pub fn len(&self) -> usize {
		self.shared.state.lock().working.len()
	}

	pub fn is_empty(&self) -> bool {
		self.shared.state.lock().working.is_empty()
	}

	/// Current engine status.
	pub fn status(&self) -> SyncStatus {
		*self.shared.status_tx.borrow()
	}

	/// Subscribe to status changes.
	pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
		self.shared.status_tx.subscribe()
	}

	/// Whether a flush deadline is currently armed.
	pub fn has_pending_flush(&self) -> bool {
		self.shared.state.lock().deadline.is_some()
	}

	/// Consumes the most recent save failure, if any.
	pub fn take_last_error(&self) -> Option<StoreError> {
		self.shared.state.lock().last_error.take()
	}

	pub fn owner(&self) -> &OwnerKey {
		&self.shared.owner
	}

	/// Detaches the engine: cancels the armed flush and the driver task.
	///
	/// Equivalent to dropping, as an explicit lifecycle call.
	pub fn detach(mut self) {
		self.teardown();
	}

	fn teardown(&mut self) {
		self.shared.cancel.cancel();
		if let Some(driver) = self.driver.take() {
			driver.abort();
		}
	}
}

impl Drop for SelectionSync {
	fn drop(&mut self) {
		self.teardown();
	}
}

impl std::fmt::Debug for SelectionSync {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SelectionSync")
			.field("owner", &self.shared.owner)
			.field("status", &self.status())
			.finish_non_exhaustive()
	}
}

impl Shared {
	/// Records a qualifying mutation, unless the engine is inert.
	fn note_mutation(&self, state: &mut SelectionState) {
		if !self.owner.is_valid() {
			return;
		}
		state.mark_dirty(Instant::now() + self.policy.debounce);
		self.publish(state.status);
	}

	fn publish(&self, status: SyncStatus) {
		self.status_tx.send_replace(status);
	}

	async fn initial_load(&self) {
		let loaded = tokio::select! {
			biased;
			_ = self.cancel.cancelled() => return,
			res = self.store.load(&self.owner) => res,
		};
		let status = {
			let mut state = self.state.lock();
			match loaded {
				Ok(set) => {
					tracing::debug!(owner = %self.owner, size = set.len(), "selection loaded");
					state.finish_load(set);
				}
				Err(e) => {
					tracing::warn!(owner = %self.owner, error = %e, "selection load failed; starting empty");
					state.finish_load(HashSet::new());
				}
			}
			state.status
		};
		self.publish(status);
	}

	/// Fires one flush if the armed deadline has truly elapsed.
	///
	/// A mutation may re-arm the deadline between the timer firing and this
	/// taking the lock; in that case nothing is transmitted and the driver
	/// re-evaluates.
	async fn flush(&self) {
		let flush = {
			let mut state = self.state.lock();
			match state.deadline {
				Some(at) if at <= Instant::now() => {
					let flush = state.begin_flush();
					Some(flush)
				}
				_ => None,
			}
		};
		let Some(flush) = flush else { return };
		self.publish(SyncStatus::Saving);

		let result = tokio::select! {
			biased;
			// Detached mid-save: the completion is discarded on arrival.
			_ = self.cancel.cancelled() => return,
			res = self.store.save(&self.owner, &flush.snapshot) => res,
		};

		let status = {
			let mut state = self.state.lock();
			match result {
				Ok(()) => {
					tracing::debug!(owner = %self.owner, size = flush.snapshot.len(), "selection snapshot persisted");
					state.finish_flush(flush);
				}
				Err(e) => {
					tracing::warn!(owner = %self.owner, error = %e, "selection save failed; rolled back");
					state.fail_flush(flush, e);
				}
			}
			state.status
		};
		self.publish(status);
	}
}

/// Background driver: one per attached engine.
///
/// Performs the initial load, then sleeps on the armed deadline and fires
/// serialized flushes. Every await is raced against the cancellation token
/// (cancel arm first) so nothing settles into state after teardown.
async fn drive(shared: Arc<Shared>) {
	shared.initial_load().await;

	loop {
		let deadline = shared.state.lock().deadline;
		match deadline {
			Some(at) => {
				tokio::select! {
					biased;
					_ = shared.cancel.cancelled() => return,
					// Deadline moved; re-read it.
					_ = shared.wake.notified() => {}
					_ = sleep_until(at) => shared.flush().await,
				}
			}
			None => {
				tokio::select! {
					biased;
					_ = shared.cancel.cancelled() => return,
					_ = shared.wake.notified() => {}
				}
			}
		}
	}
}

#[cfg(test)]
mod tests;
