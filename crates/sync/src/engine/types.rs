use std::fmt;
use std::time::Duration;

/// Quiescence window between the last qualifying mutation and a flush.
///
/// Mutations arriving closer together than this coalesce into a single
/// whole-set write.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_secs(2);

/// Identity a selection set is scoped to (e.g. a user or profile id).
///
/// An owner key is usable when it contains at least one non-whitespace
/// character; anything else yields an inert engine that never touches the
/// backend (see [`crate::engine::SelectionSync::attach`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnerKey(String);

impl OwnerKey {
	pub fn new(raw: impl Into<String>) -> Self {
		Self(raw.into())
	}

	/// Whether this key can be persisted against.
	pub fn is_valid(&self) -> bool {
		!self.0.trim().is_empty()
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl From<&str> for OwnerKey {
	fn from(raw: &str) -> Self {
		Self(raw.to_string())
	}
}

impl From<String> for OwnerKey {
	fn from(raw: String) -> Self {
		Self(raw)
	}
}

impl From<Option<&str>> for OwnerKey {
	fn from(raw: Option<&str>) -> Self {
		Self(raw.unwrap_or_default().to_string())
	}
}

impl fmt::Display for OwnerKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Opaque canonical identifier for a selectable item.
///
/// Inputs are coerced to their string form once, here at the boundary;
/// membership always compares canonical strings, so `12345u64` and `"12345"`
/// name the same item. The empty id is the invalid sentinel and is ignored by
/// every mutation entry point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SelectionId(String);

impl SelectionId {
	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub(crate) fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl From<&str> for SelectionId {
	fn from(raw: &str) -> Self {
		Self(raw.to_string())
	}
}

impl From<String> for SelectionId {
	fn from(raw: String) -> Self {
		Self(raw)
	}
}

impl From<u64> for SelectionId {
	fn from(raw: u64) -> Self {
		Self(raw.to_string())
	}
}

impl From<i64> for SelectionId {
	fn from(raw: i64) -> Self {
		Self(raw.to_string())
	}
}

impl fmt::Display for SelectionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Informational label for a bulk selection (e.g. a weekday).
///
/// Carries no uniqueness constraint across calls; only used for tracing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey(String);

impl From<&str> for GroupKey {
	fn from(raw: &str) -> Self {
		Self(raw.to_string())
	}
}

impl From<String> for GroupKey {
	fn from(raw: String) -> Self {
		Self(raw)
	}
}

impl From<u32> for GroupKey {
	fn from(raw: u32) -> Self {
		Self(raw.to_string())
	}
}

impl fmt::Display for GroupKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Externally observable engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
	/// Initial load has not completed yet.
	Loading,
	/// Working set matches the confirmed set; no flush armed.
	Idle,
	/// Local mutations await the debounce deadline.
	Dirty,
	/// A whole-set write is in flight.
	Saving,
	/// The last write failed and the working set was rolled back.
	Error,
}

/// Generation counter for mutations.
///
/// Bumped on every membership-changing mutation; a flush records the epoch at
/// snapshot time to detect mutations that land while the save is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct FlushEpoch(u64);

impl FlushEpoch {
	pub(crate) fn next(self) -> Self {
		Self(self.0.wrapping_add(1))
	}
}

/// Debounce configuration for an attached engine.
///
/// The window is fixed at [`DEBOUNCE_WINDOW`] for callers; tests override it
/// through [`SelectionSync::attach_with_policy`].
///
/// [`SelectionSync::attach_with_policy`]: crate::engine::SelectionSync
#[derive(Debug, Clone, Copy)]
pub(crate) struct SyncPolicy {
	pub(crate) debounce: Duration,
}

impl Default for SyncPolicy {
	fn default() -> Self {
		Self {
			debounce: DEBOUNCE_WINDOW,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn owner_key_validity() {
		assert!(OwnerKey::from("user123").is_valid());
		assert!(!OwnerKey::from("").is_valid());
		assert!(!OwnerKey::from("   ").is_valid());
		assert!(!OwnerKey::from(None).is_valid());
		assert!(OwnerKey::from(Some("user123")).is_valid());
	}

	#[test]
	fn selection_id_coerces_numbers_to_canonical_strings() {
		assert_eq!(SelectionId::from(12345u64), SelectionId::from("12345"));
		assert_eq!(SelectionId::from(-7i64).as_str(), "-7");
	}

	#[test]
	fn flush_epoch_is_monotone() {
		let e = FlushEpoch::default();
		assert_ne!(e, e.next());
		assert_eq!(e.next(), e.next());
	}
}
