use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::batcher::{self, BatchRunner, InputSender, Request};
use crate::cache::{Cache, InMemoryCache};
use crate::context::Context;
use crate::log::{self, Logger};
use crate::thunk::{MultiResult, Thunk, ThunkMany};
use crate::trace::{NoopTracer, Tracer};
use crate::BatchFn;

/// Tuning knobs for a [`Loader`]. Serde-deserializable so services can
/// embed it in their configuration.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct LoaderOptions {
	/// How long a batch window stays open when capacity is not reached.
	pub wait: Duration,

	/// Maximum keys per batch; reaching it seals the batch immediately.
	/// `0` means unbounded.
	pub batch_capacity: usize,

	/// Depth of the submission queue feeding a batch. `0` means unbounded.
	pub input_capacity: usize,

	/// Purge the cache every time a batch closes. Keeps request coalescing
	/// but disables long-term memoization.
	pub clear_cache_on_batch: bool,
}

impl Default for LoaderOptions {
	fn default() -> Self {
		Self {
			wait: Duration::from_millis(16),
			batch_capacity: 0,
			input_capacity: 1000,
			clear_cache_on_batch: false,
		}
	}
}

struct BatchState<F: BatchFn> {
	current: Option<CurrentBatch<F>>,
	count: usize,
}

/// The batch currently accepting submissions. Removing it from
/// [`BatchState`] and dropping it closes the input queue, which is what
/// seals the batch: the runner drains whatever was submitted and fires.
struct CurrentBatch<F: BatchFn> {
	id: u64,
	input: InputSender<F>,
	end_sleeper: CancellationToken,
}

struct Inner<F: BatchFn> {
	batch_fn: Arc<F>,

	// Admission lock: makes the lookup-then-install step atomic, so
	// concurrent loads of one key admit a single thunk and a batch never
	// sees duplicate keys. Backends synchronize their own state.
	cache_lock: Mutex<()>,
	cache: Box<dyn Cache<F::Key, F::Value, F::Error>>,

	// Guards the batch window. Taken strictly after the admission lock is
	// released; nothing ever holds it across a batch function invocation.
	batch: Mutex<BatchState<F>>,
	batch_id: AtomicU64,

	options: LoaderOptions,
	tracer: Arc<dyn Tracer<F::Key, F::Value, F::Error>>,
	logger: Arc<dyn Logger>,
}

impl<F: BatchFn> Inner<F> {
	/// Caller must hold the batch lock and have already sealed the current
	/// batch.
	fn reset(&self, state: &mut BatchState<F>) {
		state.count = 0;
		state.current = None;

		if self.options.clear_cache_on_batch {
			self.cache.clear();
		}
	}
}

/// Coalesces concurrent single-key loads into batches and memoizes results
/// per key. Cheap to clone; clones share the cache and the batch window.
///
/// Each loader owns a memoization cache keyed by request key. For backends
/// that serve many users with differing visibility, prefer one loader per
/// request over a long-lived shared one.
pub struct Loader<F: BatchFn> {
	inner: Arc<Inner<F>>,
}

impl<F: BatchFn> Clone for Loader<F> {
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

impl<F: BatchFn> Loader<F> {
	/// A loader with default options, the in-memory cache, and the default
	/// tracer and logger.
	pub fn new(batch_fn: F) -> Self {
		Self::builder(batch_fn).build()
	}

	pub fn builder(batch_fn: F) -> LoaderBuilder<F> {
		LoaderBuilder::new(batch_fn)
	}

	/// Resolves `key`, returning a [`Thunk`] immediately. The thunk blocks
	/// until the batch window containing the key closes and the batch
	/// function resolves.
	///
	/// The cache is consulted first; a hit returns the existing handle,
	/// whether in flight or completed. On a miss the fresh handle is
	/// installed and the key joins the current batch window, opening one
	/// (and arming its timer) if none exists.
	pub async fn load(&self, ctx: &Context, key: F::Key) -> Thunk<F::Value, F::Error> {
		let (trace_ctx, finish) = self.inner.tracer.trace_load(ctx, &key);

		let admission = self.inner.cache_lock.lock().await;
		if let Some(thunk) = self.inner.cache.get(&trace_ctx, &key) {
			drop(admission);
			finish(&thunk);
			return thunk;
		}

		let thunk = Thunk::pending();
		self.inner.cache.set(&trace_ctx, key.clone(), thunk.clone());
		drop(admission);

		let mut state = self.inner.batch.lock().await;
		if state.current.is_none() {
			state.current = Some(self.open_batch(ctx));
		}

		let current = state.current.as_ref().unwrap();
		current
			.input
			.send(Request {
				key,
				slot: thunk.clone(),
			})
			.await;

		if self.inner.options.batch_capacity > 0 {
			state.count += 1;
			if state.count == self.inner.options.batch_capacity {
				// Seal synchronously: another load may already be waiting
				// on the batch lock and must land in a fresh batch.
				let current = state.current.take().unwrap();
				current.end_sleeper.cancel();
				drop(current);
				self.inner.reset(&mut state);
			}
		}
		drop(state);

		finish(&thunk);
		thunk
	}

	/// Resolves many keys, returning a [`ThunkMany`] immediately. Every key
	/// is submitted through [`load`](Self::load) right away (duplicates are
	/// deduplicated by the cache), so the keys join the batch window at
	/// call time, not at first await.
	pub async fn load_many(&self, ctx: &Context, keys: Vec<F::Key>) -> ThunkMany<F::Value, F::Error> {
		let (trace_ctx, finish) = self.inner.tracer.trace_load_many(ctx, &keys);

		let thunk_many = ThunkMany::pending();

		let loader = self.clone();
		let slot = thunk_many.clone();
		tokio::spawn(async move {
			let data = futures::future::join_all(keys.into_iter().map(|key| {
				let loader = loader.clone();
				let ctx = trace_ctx.clone();
				async move { loader.load(&ctx, key).await.get().await }
			}))
			.await;

			slot.complete(MultiResult { data }).await;
		});

		finish(&thunk_many);
		thunk_many
	}

	/// Removes `key` from the cache, if present. Returns the loader for
	/// chaining.
	pub async fn clear(&self, ctx: &Context, key: &F::Key) -> &Self {
		let _admission = self.inner.cache_lock.lock().await;
		self.inner.cache.delete(ctx, key);
		self
	}

	/// Purges the cache. For events that invalidate an unknown set of
	/// keys. Returns the loader for chaining.
	pub async fn clear_all(&self) -> &Self {
		let _admission = self.inner.cache_lock.lock().await;
		self.inner.cache.clear();
		self
	}

	/// Installs an already-resolved value for `key`. Does nothing if the
	/// key is cached, in flight or completed. Returns the loader for
	/// chaining.
	pub async fn prime(&self, ctx: &Context, key: F::Key, value: F::Value) -> &Self {
		let _admission = self.inner.cache_lock.lock().await;
		if self.inner.cache.get(ctx, &key).is_none() {
			self.inner.cache.set(ctx, key, Thunk::resolved(value));
		}
		self
	}

	/// Caller must hold the batch lock. `ctx` is the opening submission's
	/// context; it is the one the batch function will observe.
	fn open_batch(&self, ctx: &Context) -> CurrentBatch<F> {
		let id = self.inner.batch_id.fetch_add(1, Ordering::SeqCst);
		let (input, receiver) = batcher::channel(self.inner.options.input_capacity);

		tokio::spawn(
			BatchRunner {
				input: receiver,
				batch_fn: self.inner.batch_fn.clone(),
				tracer: self.inner.tracer.clone(),
				logger: self.inner.logger.clone(),
				ctx: ctx.clone(),
			}
			.run(),
		);

		let end_sleeper = CancellationToken::new();
		tokio::spawn(self.clone().sleeper(id, end_sleeper.clone()));

		CurrentBatch {
			id,
			input,
			end_sleeper,
		}
	}

	/// Seals batch `id` once `wait` elapses, unless the capacity path got
	/// there first and cancelled us.
	async fn sleeper(self, id: u64, cancel: CancellationToken) {
		tokio::select! {
			_ = cancel.cancelled() => return,
			_ = tokio::time::sleep(self.inner.options.wait) => {}
		}

		let mut state = self.inner.batch.lock().await;
		// The capacity path may have sealed this batch and a later load
		// opened a new one; only touch the window if it is still ours.
		if state.current.as_ref().map(|current| current.id) == Some(id) {
			let current = state.current.take().unwrap();
			drop(current);
			self.inner.reset(&mut state);
		}
	}
}

/// Builds a [`Loader`] with a custom cache backend, tracer, logger, or
/// options.
pub struct LoaderBuilder<F: BatchFn> {
	batch_fn: F,
	cache: Box<dyn Cache<F::Key, F::Value, F::Error>>,
	options: LoaderOptions,
	tracer: Arc<dyn Tracer<F::Key, F::Value, F::Error>>,
	logger: Arc<dyn Logger>,
}

impl<F: BatchFn> LoaderBuilder<F> {
	fn new(batch_fn: F) -> Self {
		Self {
			batch_fn,
			cache: Box::new(InMemoryCache::new()),
			options: LoaderOptions::default(),
			tracer: Arc::new(NoopTracer),
			logger: log::default(),
		}
	}

	pub fn cache(mut self, cache: impl Cache<F::Key, F::Value, F::Error> + 'static) -> Self {
		self.cache = Box::new(cache);
		self
	}

	pub fn options(mut self, options: LoaderOptions) -> Self {
		self.options = options;
		self
	}

	pub fn wait(mut self, wait: Duration) -> Self {
		self.options.wait = wait;
		self
	}

	pub fn batch_capacity(mut self, capacity: usize) -> Self {
		self.options.batch_capacity = capacity;
		self
	}

	pub fn input_capacity(mut self, capacity: usize) -> Self {
		self.options.input_capacity = capacity;
		self
	}

	pub fn clear_cache_on_batch(mut self) -> Self {
		self.options.clear_cache_on_batch = true;
		self
	}

	pub fn tracer(mut self, tracer: impl Tracer<F::Key, F::Value, F::Error> + 'static) -> Self {
		self.tracer = Arc::new(tracer);
		self
	}

	pub fn logger(mut self, logger: impl Logger + 'static) -> Self {
		self.logger = Arc::new(logger);
		self
	}

	pub fn build(self) -> Loader<F> {
		Loader {
			inner: Arc::new(Inner {
				batch_fn: Arc::new(self.batch_fn),
				cache_lock: Mutex::new(()),
				cache: self.cache,
				batch: Mutex::new(BatchState {
					current: None,
					count: 0,
				}),
				batch_id: AtomicU64::new(0),
				options: self.options,
				tracer: self.tracer,
				logger: self.logger,
			}),
		}
	}
}
