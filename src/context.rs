use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Why a [`Context`] became done.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CancelReason {
	Parent,
	Deadline,
	Cancel,
}

impl Display for CancelReason {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Parent => write!(f, "Parent"),
			Self::Deadline => write!(f, "Deadline"),
			Self::Cancel => write!(f, "Cancel"),
		}
	}
}

struct RawContext {
	token: CancellationToken,
	deadline: Option<Instant>,
	parent: Option<Context>,
	// Dropped with the last clone of the context, which releases the
	// handler's `done` wait.
	_alive: Option<oneshot::Sender<()>>,
}

impl RawContext {
	fn new() -> (Self, Handler) {
		let token = CancellationToken::new();
		let (alive, dropped) = oneshot::channel();

		(
			Self {
				token: token.clone(),
				deadline: None,
				parent: None,
				_alive: Some(alive),
			},
			Handler {
				guard: token.drop_guard(),
				dropped,
			},
		)
	}

	fn done(&self) -> Pin<Box<dyn Future<Output = CancelReason> + '_ + Send>> {
		Box::pin(async move {
			match (&self.parent, self.deadline) {
				(Some(parent), Some(deadline)) => {
					tokio::select! {
						_ = parent.done() => CancelReason::Parent,
						_ = tokio::time::sleep_until(deadline) => CancelReason::Deadline,
						_ = self.token.cancelled() => CancelReason::Cancel,
					}
				}
				(Some(parent), None) => {
					tokio::select! {
						_ = parent.done() => CancelReason::Parent,
						_ = self.token.cancelled() => CancelReason::Cancel,
					}
				}
				(None, Some(deadline)) => {
					tokio::select! {
						_ = tokio::time::sleep_until(deadline) => CancelReason::Deadline,
						_ = self.token.cancelled() => CancelReason::Cancel,
					}
				}
				(None, None) => {
					self.token.cancelled().await;
					CancelReason::Cancel
				}
			}
		})
	}

	fn is_done(&self) -> bool {
		self.token.is_cancelled()
			|| self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
			|| self.parent.as_ref().is_some_and(|parent| parent.is_done())
	}
}

/// The controlling half of a [`Context`]. Dropping the handler cancels the
/// context.
pub struct Handler {
	guard: DropGuard,
	dropped: oneshot::Receiver<()>,
}

impl Handler {
	/// Waits for every clone of the context to be dropped, without
	/// cancelling it.
	pub async fn done(&mut self) {
		let _ = (&mut self.dropped).await;
	}

	/// Cancels the context and waits for every clone of it to be dropped.
	pub async fn cancel(self) {
		drop(self.guard);

		let _ = self.dropped.await;
	}
}

/// A cancellation scope threaded through loads, cache operations, tracers
/// and the batch function. The loader itself treats it opaquely: a caller
/// going away never aborts a batch in progress.
#[derive(Clone)]
pub struct Context(Arc<RawContext>);

impl From<RawContext> for Context {
	fn from(ctx: RawContext) -> Self {
		Self(Arc::new(ctx))
	}
}

impl Context {
	pub fn new() -> (Self, Handler) {
		let (ctx, handler) = RawContext::new();
		(ctx.into(), handler)
	}

	pub fn with_deadline(deadline: Instant) -> (Self, Handler) {
		let (mut ctx, handler) = RawContext::new();
		ctx.deadline = Some(deadline);
		(ctx.into(), handler)
	}

	pub fn with_timeout(timeout: std::time::Duration) -> (Self, Handler) {
		Self::with_deadline(Instant::now() + timeout)
	}

	pub fn with_parent(parent: Context, deadline: Option<Instant>) -> (Self, Handler) {
		let (mut ctx, handler) = RawContext::new();
		ctx.parent = Some(parent);
		ctx.deadline = deadline;
		(ctx.into(), handler)
	}

	/// A context that is never cancelled and has no handler. The ambient
	/// scope for callers that do not care about cancellation.
	pub fn background() -> Self {
		RawContext {
			token: CancellationToken::new(),
			deadline: None,
			parent: None,
			_alive: None,
		}
		.into()
	}

	/// Resolves once the context is cancelled, its deadline passes, or a
	/// parent becomes done.
	pub async fn done(&self) -> CancelReason {
		self.0.done().await
	}

	pub fn is_done(&self) -> bool {
		self.0.is_done()
	}
}
