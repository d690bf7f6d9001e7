use std::any::Any;

/// Error observed by a single waiter. `Resolver` carries whatever the batch
/// function reported for that key; the other variants are produced by the
/// batcher and shared by every key in the affected batch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BatchError<E> {
	#[error("{0}")]
	Resolver(E),
	#[error("Panic received in batch function: {0}")]
	Panic(String),
	#[error("batch function returned {actual} results for {expected} keys: {keys}")]
	MismatchedLength {
		expected: usize,
		actual: usize,
		keys: String,
	},
}

impl<E> BatchError<E> {
	/// The error the batch function reported, if this is one.
	pub fn resolver(&self) -> Option<&E> {
		match self {
			Self::Resolver(err) => Some(err),
			_ => None,
		}
	}
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(message) = payload.downcast_ref::<&'static str>() {
		(*message).to_owned()
	} else if let Some(message) = payload.downcast_ref::<String>() {
		message.clone()
	} else {
		"unknown panic payload".to_owned()
	}
}
