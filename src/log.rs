use std::fmt;
use std::sync::Arc;

/// Sink for the loader's own diagnostics. The only thing the loader ever
/// reports is a batch function panic, with a backtrace attached.
pub trait Logger: Send + Sync {
	fn log(&self, args: fmt::Arguments<'_>);
}

/// Discards everything.
#[derive(Default, Clone, Debug, Copy)]
pub struct NoopLogger;

impl Logger for NoopLogger {
	fn log(&self, _args: fmt::Arguments<'_>) {}
}

/// Forwards to [`tracing::error!`]. This is the default logger; without a
/// subscriber installed it is silent.
#[cfg(feature = "tracing")]
#[derive(Default, Clone, Debug, Copy)]
pub struct TracingLogger;

#[cfg(feature = "tracing")]
impl Logger for TracingLogger {
	fn log(&self, args: fmt::Arguments<'_>) {
		tracing::error!("{}", args);
	}
}

pub(crate) fn default() -> Arc<dyn Logger> {
	#[cfg(feature = "tracing")]
	return Arc::new(TracingLogger);

	#[cfg(not(feature = "tracing"))]
	return Arc::new(NoopLogger);
}
