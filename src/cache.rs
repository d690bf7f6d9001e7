use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;

use crate::context::Context;
use crate::thunk::Thunk;

/// Pluggable mapping from key to load handle. Storing handles rather than
/// values is what lets an in-flight batch deduplicate later requests for
/// the same key: the second caller receives the first caller's thunk.
///
/// Backends synchronize their own state; the loader serializes only the
/// lookup-then-install step of admission. Every operation receives the
/// caller's [`Context`] and may ignore it. Backends are free to evict
/// entries at will.
pub trait Cache<K, V, E>: Send + Sync {
	fn get(&self, ctx: &Context, key: &K) -> Option<Thunk<V, E>>;
	fn set(&self, ctx: &Context, key: K, thunk: Thunk<V, E>);
	/// Returns whether a mapping existed.
	fn delete(&self, ctx: &Context, key: &K) -> bool;
	fn clear(&self);
}

/// The default backend: a hash map behind a reader/writer lock. Suited to
/// request-scoped loaders; it never evicts, so a long-lived loader should
/// bring its own backend or use
/// [`clear_cache_on_batch`](crate::LoaderBuilder::clear_cache_on_batch).
pub struct InMemoryCache<K, V, E> {
	items: RwLock<HashMap<K, Thunk<V, E>>>,
}

impl<K, V, E> InMemoryCache<K, V, E> {
	pub fn new() -> Self {
		Self {
			items: RwLock::new(HashMap::new()),
		}
	}
}

impl<K, V, E> Default for InMemoryCache<K, V, E> {
	fn default() -> Self {
		Self::new()
	}
}

impl<K, V, E> Cache<K, V, E> for InMemoryCache<K, V, E>
where
	K: Eq + Hash + Send + Sync,
	V: Send + Sync,
	E: Send + Sync,
{
	fn get(&self, _ctx: &Context, key: &K) -> Option<Thunk<V, E>> {
		self.items.read().unwrap().get(key).cloned()
	}

	fn set(&self, _ctx: &Context, key: K, thunk: Thunk<V, E>) {
		self.items.write().unwrap().insert(key, thunk);
	}

	fn delete(&self, _ctx: &Context, key: &K) -> bool {
		self.items.write().unwrap().remove(key).is_some()
	}

	fn clear(&self) {
		self.items.write().unwrap().clear();
	}
}

/// A backend that remembers nothing: every `get` misses, so every load is
/// submitted to a batch. Batching without memoization.
#[derive(Default, Clone, Debug, Copy, PartialEq, Eq)]
pub struct NoCache;

impl<K, V, E> Cache<K, V, E> for NoCache
where
	K: Send + Sync,
	V: Send + Sync,
	E: Send + Sync,
{
	fn get(&self, _ctx: &Context, _key: &K) -> Option<Thunk<V, E>> {
		None
	}

	fn set(&self, _ctx: &Context, _key: K, _thunk: Thunk<V, E>) {}

	fn delete(&self, _ctx: &Context, _key: &K) -> bool {
		false
	}

	fn clear(&self) {}
}
