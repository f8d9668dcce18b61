use std::{fs, path::Path};

use super::Interpreter;
use crate::{
	error::{Error, ErrorCode, Result},
	model::Model
};

/// Creates an [`Interpreter`] using the builder pattern.
///
/// Once configured, use [`InterpreterBuilder::commit_from_file`] or [`InterpreterBuilder::commit_from_memory`] to
/// load a model and 'commit' the configuration into an [`Interpreter`].
///
/// ```no_run
/// # use tflite_inspect::Interpreter;
/// # fn main() -> tflite_inspect::Result<()> {
/// let mut interpreter = Interpreter::builder().with_memory_limit(64 * 1024 * 1024).commit_from_file("detect.tflite")?;
/// interpreter.allocate_tensors()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct InterpreterBuilder {
	memory_limit: Option<usize>
}

impl InterpreterBuilder {
	/// Creates a new interpreter builder with no memory limit.
	pub fn new() -> Self {
		Self::default()
	}

	/// Caps the size of the tensor arena. [`Interpreter::allocate_tensors`] fails with
	/// [`ErrorCode::AllocationFailed`] if the model needs more.
	pub fn with_memory_limit(mut self, bytes: usize) -> Self {
		self.memory_limit = Some(bytes);
		self
	}

	/// Loads a model from a file and builds the interpreter.
	pub fn commit_from_file<P>(self, model_path: P) -> Result<Interpreter>
	where
		P: AsRef<Path>
	{
		let model_path = model_path.as_ref();
		if !model_path.exists() {
			return Err(Error::new_with_code(ErrorCode::NoSuchFile, format!("File at `{}` does not exist", model_path.display())));
		}

		let bytes = fs::read(model_path)?;
		crate::info!(path = %model_path.display(), size = bytes.len(), "Loading model");
		self.commit(bytes)
	}

	/// Loads a model from memory and builds the interpreter. The bytes are copied into storage owned by the
	/// interpreter.
	pub fn commit_from_memory(self, model_bytes: &[u8]) -> Result<Interpreter> {
		self.commit(model_bytes.to_vec())
	}

	fn commit(self, bytes: Vec<u8>) -> Result<Interpreter> {
		let model = Model::from_bytes(bytes)?;
		crate::debug!(operator_codes = model.operator_codes().len(), size = model.size(), "Committed model");
		Ok(Interpreter::new_from_model(model, self.memory_limit))
	}
}
