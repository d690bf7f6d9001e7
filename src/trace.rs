use crate::context::Context;
use crate::thunk::{Thunk, ThunkMany};

pub type TraceLoadFinish<V, E> = Box<dyn FnOnce(&Thunk<V, E>) + Send>;
pub type TraceLoadManyFinish<V, E> = Box<dyn FnOnce(&ThunkMany<V, E>) + Send>;
pub type TraceBatchFinish<V, E> = Box<dyn FnOnce(&[Result<V, E>]) + Send>;

/// Observation hooks around loads and batch executions. Each hook returns
/// the context to thread into the downstream work (so spans can attach
/// metadata) and a finisher invoked when that work completes. The hooks
/// carry no semantic weight and must be safe to call from any task.
///
/// The batch finisher receives the batch function's raw output; on a panic
/// it receives an empty slice.
pub trait Tracer<K, V, E>: Send + Sync {
	fn trace_load(&self, ctx: &Context, key: &K) -> (Context, TraceLoadFinish<V, E>);

	fn trace_load_many(&self, ctx: &Context, keys: &[K]) -> (Context, TraceLoadManyFinish<V, E>);

	fn trace_batch(&self, ctx: &Context, keys: &[K]) -> (Context, TraceBatchFinish<V, E>);
}

/// The default tracer: hands back the caller's context and does nothing.
#[derive(Default, Clone, Debug, Copy)]
pub struct NoopTracer;

impl<K, V, E> Tracer<K, V, E> for NoopTracer {
	fn trace_load(&self, ctx: &Context, _key: &K) -> (Context, TraceLoadFinish<V, E>) {
		(ctx.clone(), Box::new(|_| {}))
	}

	fn trace_load_many(&self, ctx: &Context, _keys: &[K]) -> (Context, TraceLoadManyFinish<V, E>) {
		(ctx.clone(), Box::new(|_| {}))
	}

	fn trace_batch(&self, ctx: &Context, _keys: &[K]) -> (Context, TraceBatchFinish<V, E>) {
		(ctx.clone(), Box::new(|_| {}))
	}
}
