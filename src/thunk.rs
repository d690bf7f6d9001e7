use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::BatchError;

/// What a single-key load resolves to.
pub type LoadResult<V, E> = Result<V, BatchError<E>>;

/// One-shot result slot shared between the batcher (the only writer) and
/// any number of waiters. The token flips exactly once, after the write.
struct Slot<T> {
	cell: RwLock<Option<T>>,
	done: CancellationToken,
}

impl<T: Clone> Slot<T> {
	fn pending() -> Self {
		Self {
			cell: RwLock::new(None),
			done: CancellationToken::new(),
		}
	}

	fn resolved(value: T) -> Self {
		let slot = Self {
			cell: RwLock::new(Some(value)),
			done: CancellationToken::new(),
		};
		slot.done.cancel();
		slot
	}

	async fn write(&self, value: T) {
		*self.cell.write().await = Some(value);
		self.done.cancel();
	}

	async fn read(&self) -> T {
		self.done.cancelled().await;
		self.cell
			.read()
			.await
			.clone()
			.expect("slot signalled completion without a result")
	}
}

/// A deferred load result. Returned immediately by [`Loader::load`]; the
/// batch resolves in the background and `get` blocks until it does. Safe to
/// clone and to await any number of times from any number of tasks; every
/// call observes the same result.
///
/// [`Loader::load`]: crate::Loader::load
pub struct Thunk<V, E> {
	slot: Arc<Slot<LoadResult<V, E>>>,
}

impl<V, E> Clone for Thunk<V, E> {
	fn clone(&self) -> Self {
		Self {
			slot: self.slot.clone(),
		}
	}
}

impl<V: Clone, E: Clone> Thunk<V, E> {
	pub(crate) fn pending() -> Self {
		Self {
			slot: Arc::new(Slot::pending()),
		}
	}

	/// A handle that is already complete. This is what [`Loader::prime`]
	/// installs in the cache.
	///
	/// [`Loader::prime`]: crate::Loader::prime
	pub fn resolved(value: V) -> Self {
		Self {
			slot: Arc::new(Slot::resolved(Ok(value))),
		}
	}

	pub(crate) async fn complete(&self, result: LoadResult<V, E>) {
		self.slot.write(result).await;
	}

	/// Blocks until the batch containing this key has resolved, then
	/// returns its result.
	pub async fn get(&self) -> LoadResult<V, E> {
		self.slot.read().await
	}
}

/// The result of [`Loader::load_many`]: one entry per requested key, in
/// request order.
///
/// [`Loader::load_many`]: crate::Loader::load_many
#[derive(Debug, Clone, PartialEq)]
pub struct MultiResult<V, E> {
	pub data: Vec<LoadResult<V, E>>,
}

impl<V: Clone, E: Clone> MultiResult<V, E> {
	/// Per-key errors, positionally matching the requested keys. `None`
	/// when every key resolved successfully, so "no errors" is cheap to
	/// test without scanning an all-`None` vector.
	pub fn errors(&self) -> Option<Vec<Option<BatchError<E>>>> {
		if self.data.iter().all(|result| result.is_ok()) {
			return None;
		}

		Some(
			self.data
				.iter()
				.map(|result| result.as_ref().err().cloned())
				.collect(),
		)
	}

	pub fn len(&self) -> usize {
		self.data.len()
	}

	pub fn is_empty(&self) -> bool {
		self.data.is_empty()
	}
}

/// Deferred result of a [`Loader::load_many`] call. Same discipline as
/// [`Thunk`]: resolves once, observable many times.
///
/// [`Loader::load_many`]: crate::Loader::load_many
pub struct ThunkMany<V, E> {
	slot: Arc<Slot<MultiResult<V, E>>>,
}

impl<V, E> Clone for ThunkMany<V, E> {
	fn clone(&self) -> Self {
		Self {
			slot: self.slot.clone(),
		}
	}
}

impl<V: Clone, E: Clone> ThunkMany<V, E> {
	pub(crate) fn pending() -> Self {
		Self {
			slot: Arc::new(Slot::pending()),
		}
	}

	pub(crate) async fn complete(&self, result: MultiResult<V, E>) {
		self.slot.write(result).await;
	}

	/// Blocks until every requested key has resolved.
	pub async fn get(&self) -> MultiResult<V, E> {
		self.slot.read().await
	}
}
