use std::{error::Error as StdError, fmt, io};

use tract_core::prelude::TractError;

/// Type alias for the `Result` type returned by `tflite-inspect` functions.
pub type Result<T, E = Error> = core::result::Result<T, E>;

struct ErrorInternal {
	code: ErrorCode,
	message: String,
	cause: Option<Box<dyn StdError + Send + Sync + 'static>>
}

/// An error returned by any `tflite-inspect` API.
pub struct Error {
	inner: Box<ErrorInternal>
}

impl fmt::Debug for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Error")
			.field("code", &self.inner.code)
			.field("message", &self.message())
			.field("cause", &self.inner.cause)
			.finish()
	}
}

impl Error {
	/// Wrap a foreign error in an [`Error`].
	pub fn wrap<T: StdError + Send + Sync + 'static>(err: T) -> Self {
		Self::new_internal(ErrorCode::GenericFailure, err.to_string(), Some(Box::new(err)))
	}

	/// Creates a custom [`Error`] with the given message.
	pub fn new(msg: impl Into<String>) -> Self {
		Self::new_internal(ErrorCode::GenericFailure, msg, None)
	}

	/// Creates a custom [`Error`] with the given [`ErrorCode`] and message.
	pub fn new_with_code(code: ErrorCode, msg: impl Into<String>) -> Self {
		Self::new_internal(code, msg, None)
	}

	pub(crate) fn with_cause<T: StdError + Send + Sync + 'static>(code: ErrorCode, msg: impl Into<String>, cause: T) -> Self {
		Self::new_internal(code, msg, Some(Box::new(cause)))
	}

	/// Wraps an error raised by the tract runtime, keeping its context chain in the message.
	pub(crate) fn from_tract(code: ErrorCode, context: &str, err: TractError) -> Self {
		Self::new_internal(code, format!("{context}: {err:#}"), Some(err.into()))
	}

	fn new_internal(code: ErrorCode, message: impl Into<String>, cause: Option<Box<dyn StdError + Send + Sync + 'static>>) -> Self {
		Self {
			inner: Box::new(ErrorInternal {
				code,
				message: message.into(),
				cause
			})
		}
	}

	pub fn code(&self) -> ErrorCode {
		self.inner.code
	}

	pub fn message(&self) -> &str {
		self.inner.message.as_str()
	}
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.inner.message)
	}
}

impl StdError for Error {
	fn source(&self) -> Option<&(dyn StdError + 'static)> {
		self.inner.cause.as_ref().map(|x| &**x as &dyn StdError)
	}
}

impl From<io::Error> for Error {
	fn from(err: io::Error) -> Self {
		let code = if err.kind() == io::ErrorKind::NotFound { ErrorCode::NoSuchFile } else { ErrorCode::GenericFailure };
		Error::with_cause(code, format!("I/O error: {err}"), err)
	}
}


/// Broad category of an [`Error`].
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCode {
	GenericFailure,
	InvalidArgument,
	/// The model path does not exist.
	NoSuchFile,
	/// The file is not a TensorFlow Lite model, or its contents are inconsistent.
	InvalidModel,
	/// The model uses an operator the runtime cannot translate or prepare.
	UnsupportedOperator,
	/// Tensor buffers could not be planned or allocated.
	AllocationFailed,
	/// An operation that requires allocated tensors was called before
	/// [`Interpreter::allocate_tensors`](crate::Interpreter::allocate_tensors).
	TensorsNotAllocated
}
