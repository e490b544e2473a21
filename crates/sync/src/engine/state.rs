use std::collections::HashSet;

use tokio::time::Instant;

use super::store::StoreError;
use super::types::{FlushEpoch, SelectionId, SyncStatus};

/// Pure selection state: the two sets, the status machine, and the armed
/// flush deadline.
///
/// All transitions are synchronous; the driver owns every async edge and
/// applies results back through `finish_load` / `finish_flush` /
/// `fail_flush`.
pub(super) struct SelectionState {
	/// What the caller currently sees as selected.
	pub(super) working: HashSet<SelectionId>,
	/// Last set successfully persisted (or the initial load). Rollback target.
	pub(super) confirmed: HashSet<SelectionId>,
	pub(super) status: SyncStatus,
	/// Armed flush deadline; `None` when no flush is pending.
	pub(super) deadline: Option<Instant>,
	/// Bumped on every membership-changing mutation.
	pub(super) epoch: FlushEpoch,
	/// Most recent failed save, until consumed by the caller.
	pub(super) last_error: Option<StoreError>,
}

impl SelectionState {
	pub(super) fn new() -> Self {
		Self {
			working: HashSet::new(),
			confirmed: HashSet::new(),
			status: SyncStatus::Loading,
			deadline: None,
			epoch: FlushEpoch::default(),
			last_error: None,
		}
	}

	/// State for an engine attached with an invalid owner key: never loads,
	/// never persists, starts directly in `Idle`.
	pub(super) fn new_inert() -> Self {
		Self {
			status: SyncStatus::Idle,
			..Self::new()
		}
	}

	/// Applies the initial load result; both sets adopt `loaded`.
	///
	/// Mutations issued before the load completed are superseded by the
	/// loaded snapshot, so any deadline they armed is disarmed here.
	pub(super) fn finish_load(&mut self, loaded: HashSet<SelectionId>) {
		self.working.clone_from(&loaded);
		self.confirmed = loaded;
		self.status = SyncStatus::Idle;
		self.deadline = None;
	}

	/// Flips membership of `id` in the working set.
	pub(super) fn toggle(&mut self, id: SelectionId) {
		if !self.working.remove(&id) {
			self.working.insert(id);
		}
	}

	/// Unions `ids` into the working set, skipping empty ids.
	///
	/// Returns the number of ids applied; `0` means the call was a no-op and
	/// must not disturb the schedule.
	pub(super) fn add_group(&mut self, ids: impl IntoIterator<Item = SelectionId>) -> usize {
		let mut applied = 0;
		for id in ids {
			if id.is_empty() {
				continue;
			}
			self.working.insert(id);
			applied += 1;
		}
		applied
	}

	/// Records a qualifying mutation: bumps the epoch, re-arms the sliding
	/// deadline, and moves the status towards `Dirty`.
	///
	/// A save already in flight keeps `Saving`; its completion decides
	/// between `Idle` and `Dirty` by comparing epochs. An unfinished initial
	/// load keeps `Loading`, since its snapshot supersedes the mutation.
	pub(super) fn mark_dirty(&mut self, deadline: Instant) {
		self.epoch = self.epoch.next();
		self.deadline = Some(deadline);
		if !matches!(self.status, SyncStatus::Saving | SyncStatus::Loading) {
			self.status = SyncStatus::Dirty;
		}
	}

	/// Captures the flush snapshot and transitions to `Saving`.
	///
	/// The baseline is the confirmed set as it stands right now; a failed
	/// save restores exactly this value regardless of what the working set
	/// becomes while the write is in flight.
	pub(super) fn begin_flush(&mut self) -> FlushSnapshot {
		self.status = SyncStatus::Saving;
		self.deadline = None;
		self.last_error = None;
		FlushSnapshot {
			snapshot: self.working.clone(),
			baseline: self.confirmed.clone(),
			epoch: self.epoch,
		}
	}

	/// Installs a successful flush: the snapshot becomes the new baseline.
	///
	/// Mutations that landed during the save stay in the working set; the
	/// epoch mismatch keeps the status `Dirty` and their already-armed
	/// deadline drives the follow-up flush.
	pub(super) fn finish_flush(&mut self, flush: FlushSnapshot) {
		self.confirmed = flush.snapshot;
		self.status = if self.epoch == flush.epoch {
			SyncStatus::Idle
		} else {
			SyncStatus::Dirty
		};
	}

	/// Rolls back to the pre-flush baseline after a failed save.
	///
	/// Mutations made while the failed write was in flight are rolled back
	/// with everything else, so their pending deadline is disarmed too.
	/// Failed cycles re-arm only on the next mutation.
	pub(super) fn fail_flush(&mut self, flush: FlushSnapshot, err: StoreError) {
		self.working = flush.baseline;
		self.status = SyncStatus::Error;
		self.deadline = None;
		self.last_error = Some(err);
	}
}

/// Everything a flush needs to settle later: the transmitted snapshot, the
/// rollback baseline, and the epoch at capture time.
pub(super) struct FlushSnapshot {
	pub(super) snapshot: HashSet<SelectionId>,
	pub(super) baseline: HashSet<SelectionId>,
	pub(super) epoch: FlushEpoch,
}
