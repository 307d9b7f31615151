//! Bounded cache of verified credentials.

// self
use crate::{
	_prelude::*,
	auth::{CallerContext, Verified},
};

#[derive(Clone, Debug)]
struct CacheEntry {
	caller: CallerContext,
	valid_until: OffsetDateTime,
}

/// Short-lived cache keyed by credential fingerprint.
///
/// An entry never outlives `min(ttl, credential expiry)`, and the table never grows past
/// `capacity` entries.
#[derive(Debug)]
pub struct VerifiedCache {
	ttl: Duration,
	capacity: usize,
	entries: Mutex<HashMap<String, CacheEntry>>,
}
impl VerifiedCache {
	/// Creates a cache with the provided entry lifetime and size bound.
	pub fn new(ttl: Duration, capacity: usize) -> Self {
		Self { ttl, capacity, entries: Default::default() }
	}

	/// Returns the cached caller if the entry is still valid at `now`.
	pub fn get(&self, fingerprint: &str, now: OffsetDateTime) -> Option<CallerContext> {
		let mut entries = self.entries.lock();

		match entries.get(fingerprint) {
			Some(entry) if now < entry.valid_until => Some(entry.caller.clone()),
			Some(_) => {
				entries.remove(fingerprint);

				None
			},
			None => None,
		}
	}

	/// Remembers a successful verification observed at `now`.
	pub fn put(&self, fingerprint: String, verified: &Verified, now: OffsetDateTime) {
		let mut valid_until = now + self.ttl;

		if let Some(expires_at) = verified.expires_at {
			valid_until = valid_until.min(expires_at);
		}
		if valid_until <= now || self.capacity == 0 {
			return;
		}

		let mut entries = self.entries.lock();

		if entries.len() >= self.capacity && !entries.contains_key(&fingerprint) {
			entries.retain(|_, entry| now < entry.valid_until);

			if entries.len() >= self.capacity {
				return;
			}
		}

		entries.insert(fingerprint, CacheEntry { caller: verified.caller.clone(), valid_until });
	}

	/// Number of entries currently held, including not-yet-purged stale ones.
	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	/// Returns `true` when the cache holds no entries.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::auth::{RoleSet, SubjectId};

	const NOW: OffsetDateTime = macros::datetime!(2025-11-10 12:00 UTC);

	fn verified(expires_at: Option<OffsetDateTime>) -> Verified {
		let subject = SubjectId::new("alice").expect("Subject fixture should be valid.");

		Verified { caller: CallerContext::new(subject, RoleSet::default()), expires_at }
	}

	#[test]
	fn entries_never_outlive_credential_expiry() {
		let cache = VerifiedCache::new(Duration::minutes(10), 8);

		cache.put("fp".into(), &verified(Some(NOW + Duration::seconds(30))), NOW);

		assert!(cache.get("fp", NOW + Duration::seconds(29)).is_some());
		assert!(cache.get("fp", NOW + Duration::seconds(30)).is_none());
		assert!(cache.is_empty(), "Stale entries are purged on access.");
	}

	#[test]
	fn entries_expire_after_ttl() {
		let cache = VerifiedCache::new(Duration::seconds(5), 8);

		cache.put("fp".into(), &verified(None), NOW);

		assert!(cache.get("fp", NOW + Duration::seconds(4)).is_some());
		assert!(cache.get("fp", NOW + Duration::seconds(5)).is_none());
	}

	#[test]
	fn capacity_is_bounded() {
		let cache = VerifiedCache::new(Duration::seconds(5), 2);

		cache.put("a".into(), &verified(None), NOW);
		cache.put("b".into(), &verified(None), NOW);
		cache.put("c".into(), &verified(None), NOW);

		assert_eq!(cache.len(), 2);
		assert!(cache.get("c", NOW).is_none());

		cache.put("c".into(), &verified(None), NOW + Duration::seconds(6));

		assert!(cache.get("c", NOW + Duration::seconds(6)).is_some(), "Expired entries make room.");
	}
}
