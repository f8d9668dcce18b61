use core::fmt;

/// Verbosity of the crate's diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
	Trace,
	Debug,
	Info,
	Warning,
	Error
}

impl LogLevel {
	/// The directive understood by `tracing_subscriber::EnvFilter` for this level.
	pub fn as_directive(&self) -> &'static str {
		match self {
			LogLevel::Trace => "trace",
			LogLevel::Debug => "debug",
			LogLevel::Info => "info",
			LogLevel::Warning => "warn",
			LogLevel::Error => "error"
		}
	}
}

impl fmt::Display for LogLevel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_directive())
	}
}

macro_rules! trace {
	($($arg:tt)+) => {{
		#[cfg(feature = "tracing")]
		tracing::trace!($($arg)+);
	}}
}
macro_rules! debug {
	($($arg:tt)+) => {{
		#[cfg(feature = "tracing")]
		tracing::debug!($($arg)+);
	}}
}
macro_rules! info {
	($($arg:tt)+) => {{
		#[cfg(feature = "tracing")]
		tracing::info!($($arg)+);
	}}
}
macro_rules! warning {
	($($arg:tt)+) => {{
		#[cfg(feature = "tracing")]
		tracing::warn!($($arg)+);
	}}
}
macro_rules! error {
	($($arg:tt)+) => {{
		#[cfg(feature = "tracing")]
		tracing::error!($($arg)+);
	}}
}
pub(crate) use debug;
pub(crate) use error;
pub(crate) use info;
pub(crate) use trace;
pub(crate) use warning;

/// Reads the default log level from the `TFLITE_LOG` environment variable, falling back to [`LogLevel::Warning`].
pub fn default_log_level() -> LogLevel {
	parse_log_level(std::env::var("TFLITE_LOG").ok().as_deref())
}

fn parse_log_level(value: Option<&str>) -> LogLevel {
	match value {
		Some("trace") | Some("verbose") => LogLevel::Trace,
		Some("debug") => LogLevel::Debug,
		Some("info") => LogLevel::Info,
		Some("error") | Some("fatal") => LogLevel::Error,
		_ => LogLevel::Warning
	}
}
