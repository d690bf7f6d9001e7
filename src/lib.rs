//! Batching and caching for keyed loads against expensive backends, in the
//! shape popularized by facebook's dataloader
//! (<https://github.com/facebook/dataloader>).
//!
//! Callers ask for one key at a time; concurrent requests landing within a
//! short window are coalesced into a single [`BatchFn`] invocation with
//! unique keys, and each caller gets back a [`Thunk`] that resolves to its
//! own result. Results are memoized per key in a pluggable [`Cache`], which
//! also deduplicates requests against batches still in flight.

use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;

mod batcher;
pub mod cache;
pub mod context;
mod error;
mod loader;
pub mod log;
pub mod trace;
mod thunk;

#[cfg(test)]
mod tests;

pub use cache::{Cache, InMemoryCache, NoCache};
pub use context::{CancelReason, Context, Handler};
pub use error::BatchError;
pub use loader::{Loader, LoaderBuilder, LoaderOptions};
#[cfg(feature = "tracing")]
pub use log::TracingLogger;
pub use log::{Logger, NoopLogger};
pub use thunk::{LoadResult, MultiResult, Thunk, ThunkMany};
pub use trace::{NoopTracer, Tracer};

/// The batch function: resolves a set of unique keys against the backend in
/// one call.
///
/// The returned vector must contain exactly one result per key, in key
/// order; a mismatched length fails every key in the batch. An individual
/// key may fail via `Err` in its position without affecting the others.
/// Panics are caught by the batch task, logged, and surfaced to every
/// waiter as [`BatchError::Panic`].
pub trait BatchFn: Send + Sync + 'static {
	type Key: Clone + Eq + Hash + Debug + Send + Sync + 'static;
	type Value: Clone + Send + Sync + 'static;
	type Error: Clone + Send + Sync + 'static;

	fn load(
		&self,
		ctx: &Context,
		keys: &[Self::Key],
	) -> impl Future<Output = Vec<Result<Self::Value, Self::Error>>> + Send;
}
