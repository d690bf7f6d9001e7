use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;

use crate::context::Context;
use crate::error::{panic_message, BatchError};
use crate::log::Logger;
use crate::thunk::Thunk;
use crate::trace::Tracer;
use crate::BatchFn;

/// One queued submission: the key and the slot its result lands in.
pub(crate) struct Request<F: BatchFn> {
	pub(crate) key: F::Key,
	pub(crate) slot: Thunk<F::Value, F::Error>,
}

/// Sender half of a batch input queue.
pub(crate) enum InputSender<F: BatchFn> {
	Bounded(mpsc::Sender<Request<F>>),
	Unbounded(mpsc::UnboundedSender<Request<F>>),
}

impl<F: BatchFn> InputSender<F> {
	/// Posts a request to the batch. The loader only submits to the batch
	/// it just ensured is current, so the runner is still draining.
	pub(crate) async fn send(&self, request: Request<F>) {
		match self {
			Self::Bounded(sender) => sender
				.send(request)
				.await
				.unwrap_or_else(|_| panic!("batch input closed while current")),
			Self::Unbounded(sender) => sender
				.send(request)
				.unwrap_or_else(|_| panic!("batch input closed while current")),
		}
	}
}

pub(crate) enum InputReceiver<F: BatchFn> {
	Bounded(mpsc::Receiver<Request<F>>),
	Unbounded(mpsc::UnboundedReceiver<Request<F>>),
}

impl<F: BatchFn> InputReceiver<F> {
	async fn recv(&mut self) -> Option<Request<F>> {
		match self {
			Self::Bounded(receiver) => receiver.recv().await,
			Self::Unbounded(receiver) => receiver.recv().await,
		}
	}
}

/// A capacity of `0` selects an unbounded queue.
pub(crate) fn channel<F: BatchFn>(capacity: usize) -> (InputSender<F>, InputReceiver<F>) {
	if capacity == 0 {
		let (sender, receiver) = mpsc::unbounded_channel();
		(InputSender::Unbounded(sender), InputReceiver::Unbounded(receiver))
	} else {
		let (sender, receiver) = mpsc::channel(capacity);
		(InputSender::Bounded(sender), InputReceiver::Bounded(receiver))
	}
}

/// The task behind one batch. Created together with the input queue when a
/// load opens a new batch window; runs until the loader seals the batch by
/// dropping the [`InputSender`], then invokes the batch function exactly
/// once and fans the results out to every slot.
pub(crate) struct BatchRunner<F: BatchFn> {
	pub(crate) input: InputReceiver<F>,
	pub(crate) batch_fn: Arc<F>,
	pub(crate) tracer: Arc<dyn Tracer<F::Key, F::Value, F::Error>>,
	pub(crate) logger: Arc<dyn Logger>,
	/// Context of the submission that opened this batch window. Later
	/// submitters' contexts are not consulted.
	pub(crate) ctx: Context,
}

impl<F: BatchFn> BatchRunner<F> {
	pub(crate) async fn run(mut self) {
		let mut keys = Vec::new();
		let mut requests = Vec::new();

		while let Some(request) = self.input.recv().await {
			keys.push(request.key.clone());
			requests.push(request);
		}

		let (ctx, finish) = self.tracer.trace_batch(&self.ctx, &keys);

		let outcome = AssertUnwindSafe(self.batch_fn.load(&ctx, &keys))
			.catch_unwind()
			.await;

		let results = match outcome {
			Ok(results) => results,
			Err(payload) => {
				let message = panic_message(payload.as_ref());
				let backtrace = std::backtrace::Backtrace::force_capture();
				self.logger
					.log(format_args!("Panic received in batch function: {message}\n{backtrace}"));

				let error = BatchError::Panic(message);
				for request in &requests {
					request.slot.complete(Err(error.clone())).await;
				}

				finish(&[]);
				return;
			}
		};

		if results.len() != keys.len() {
			let error = BatchError::MismatchedLength {
				expected: keys.len(),
				actual: results.len(),
				keys: format!("{keys:?}"),
			};
			for request in &requests {
				request.slot.complete(Err(error.clone())).await;
			}

			finish(&results);
			return;
		}

		for (request, result) in requests.iter().zip(results.iter()) {
			request
				.slot
				.complete(result.clone().map_err(BatchError::Resolver))
				.await;
		}

		finish(&results);
	}
}
