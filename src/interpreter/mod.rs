//! Contains the [`Interpreter`], which loads a TensorFlow Lite model and prepares its tensors.

use core::{mem, slice};
use std::path::Path;

#[cfg(feature = "ndarray")]
use ndarray::{Array, ArrayView, CowArray, IxDyn};

mod builder;
mod runtime;

pub use self::builder::InterpreterBuilder;
use crate::{
	error::{Error, ErrorCode, Result},
	memory::{Arena, ArenaPlan},
	model::{Model, SignatureDef, TensorInfo},
	tensor::{PrimitiveTensorElementType, Shape, TensorDetails, TensorDetailsList}
};

/// A loaded TensorFlow Lite model together with the buffers backing its tensors.
///
/// The interpreter operates on the model's primary subgraph. Tensor buffers are not allocated until
/// [`Interpreter::allocate_tensors`] is called; until then, every query about tensor details or data fails with
/// [`ErrorCode::TensorsNotAllocated`].
///
/// ```no_run
/// # use tflite_inspect::Interpreter;
/// # fn main() -> tflite_inspect::Result<()> {
/// let mut interpreter = Interpreter::new("model.tflite")?;
/// interpreter.allocate_tensors()?;
/// println!("Input details:\n{}", interpreter.input_details()?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Interpreter {
	model: Model,
	/// Current shape of every tensor in the primary subgraph; inputs may be resized.
	shapes: Vec<Shape>,
	arena: Option<Arena>,
	memory_limit: Option<usize>
}

impl Interpreter {
	/// Loads the model at `model_path` with the default configuration.
	///
	/// Equivalent to `Interpreter::builder().commit_from_file(model_path)`.
	pub fn new(model_path: impl AsRef<Path>) -> Result<Self> {
		Self::builder().commit_from_file(model_path)
	}

	/// Creates a new [`InterpreterBuilder`] to configure how models are loaded.
	pub fn builder() -> InterpreterBuilder {
		InterpreterBuilder::new()
	}

	pub(crate) fn new_from_model(model: Model, memory_limit: Option<usize>) -> Self {
		let shapes = model.primary_subgraph().tensors.iter().map(|t| t.shape.clone()).collect();
		Self {
			model,
			shapes,
			arena: None,
			memory_limit
		}
	}

	/// The decoded model, for access to its metadata, subgraphs and operators.
	pub fn model(&self) -> &Model {
		&self.model
	}

	/// Named entry points declared by the model.
	pub fn signatures(&self) -> &[SignatureDef] {
		self.model.signatures()
	}

	/// Tensor indices of the primary subgraph's inputs, in declaration order.
	pub fn inputs(&self) -> &[usize] {
		&self.model.primary_subgraph().inputs
	}

	/// Tensor indices of the primary subgraph's outputs, in declaration order.
	pub fn outputs(&self) -> &[usize] {
		&self.model.primary_subgraph().outputs
	}

	/// Returns `true` once [`Interpreter::allocate_tensors`] has succeeded and no input has been resized since.
	pub fn is_allocated(&self) -> bool {
		self.arena.is_some()
	}

	/// Prepares the model with the runtime and allocates buffers for every non-constant tensor.
	///
	/// The runtime translates the graph and infers the shape of every output from the current input shapes, so after
	/// [`Interpreter::resize_tensor_input`] the outputs report their new shapes. Intermediate tensors the runtime fuses
	/// away keep their declared shape.
	///
	/// Calling this again without an intervening resize does nothing. Fails with [`ErrorCode::UnsupportedOperator`] if
	/// the runtime cannot translate an operator, and with [`ErrorCode::AllocationFailed`] if a shape is negative or too
	/// large, if a constant tensor's data does not match its declared size, if the runtime cannot plan the graph, or if
	/// the arena would exceed the configured memory limit.
	pub fn allocate_tensors(&mut self) -> Result<()> {
		if self.arena.is_some() {
			return Ok(());
		}

		let subgraph = self.model.primary_subgraph();
		for (index, tensor) in subgraph.tensors.iter().enumerate() {
			if !subgraph.inputs.contains(&index) {
				self.shapes[index] = tensor.shape.clone();
			}
		}
		self.check_shapes()?;

		let inferred = runtime::prepare(&self.model, &self.shapes)?;
		let subgraph = self.model.primary_subgraph();
		for (index, shape) in inferred.into_iter().enumerate() {
			let Some(shape) = shape else {
				continue;
			};
			if !subgraph.inputs.contains(&index) && !self.model.is_constant(&subgraph.tensors[index]) {
				if shape != self.shapes[index] {
					crate::debug!(tensor = index, from = %self.shapes[index], to = %shape, "Runtime inferred a new shape");
				}
				self.shapes[index] = shape;
			}
		}

		let sizes = self.check_shapes()?;
		let plan = ArenaPlan::new(sizes)?;
		let arena = Arena::allocate(plan, self.memory_limit)?;
		crate::info!(arena_size = arena.plan().size(), tensors = self.shapes.len(), "Allocated tensors");
		self.arena = Some(arena);
		Ok(())
	}

	/// Validates every current shape and constant buffer, returning the arena size needed by each non-constant tensor.
	fn check_shapes(&self) -> Result<Vec<Option<usize>>> {
		let tensors = &self.model.primary_subgraph().tensors;
		let mut sizes = Vec::with_capacity(tensors.len());
		for (index, (tensor, shape)) in tensors.iter().zip(&self.shapes).enumerate() {
			let num_elements = shape.num_elements().ok_or_else(|| {
				Error::new_with_code(ErrorCode::AllocationFailed, format!("Tensor {index} (`{}`) has unsatisfiable shape {shape}", tensor.name))
			})?;
			let byte_len = tensor.dtype.byte_len(num_elements);
			if byte_len.is_none() && tensor.dtype.byte_width().is_some() {
				return Err(Error::new_with_code(
					ErrorCode::AllocationFailed,
					format!("Tensor {index} (`{}`) of shape {shape} is too large to allocate", tensor.name)
				));
			}

			if self.model.is_constant(tensor) {
				self.check_constant(index, tensor, byte_len)?;
				sizes.push(None);
			} else {
				sizes.push(byte_len);
			}
		}
		Ok(sizes)
	}

	fn check_constant(&self, index: usize, tensor: &TensorInfo, expected: Option<usize>) -> Result<()> {
		// sparse tensors store compressed values, and variable-width types carry their own layout
		let (Some(expected), None) = (expected, &tensor.sparsity) else {
			return Ok(());
		};
		let actual = self.model.buffer_data(tensor.buffer).map_or(0, <[u8]>::len);
		if actual != expected {
			crate::error!(tensor = index, expected, actual, "Constant tensor size mismatch");
			return Err(Error::new_with_code(
				ErrorCode::AllocationFailed,
				format!("Constant tensor {index} (`{}`) holds {actual} bytes but its shape requires {expected}", tensor.name)
			));
		}
		Ok(())
	}

	/// Changes the shape of an input tensor.
	///
	/// `index` is the tensor's index, as found in [`Interpreter::inputs`]. The new shape must have the same rank as the
	/// declared shape, unless the model did not declare one. Tensors must be reallocated afterwards with
	/// [`Interpreter::allocate_tensors`] unless the shape did not change.
	pub fn resize_tensor_input(&mut self, index: usize, dims: &[i32]) -> Result<()> {
		self.resize_input(index, dims, false)
	}

	/// Like [`Interpreter::resize_tensor_input`], but only dimensions marked dynamic in the tensor's shape signature
	/// may change.
	pub fn resize_tensor_input_strict(&mut self, index: usize, dims: &[i32]) -> Result<()> {
		self.resize_input(index, dims, true)
	}

	fn resize_input(&mut self, index: usize, dims: &[i32], strict: bool) -> Result<()> {
		if !self.inputs().contains(&index) {
			return Err(Error::new_with_code(ErrorCode::InvalidArgument, format!("Tensor {index} is not an input of the model")));
		}
		if let Some(d) = dims.iter().find(|&&d| d < 0) {
			return Err(Error::new_with_code(ErrorCode::InvalidArgument, format!("Cannot resize input {index} to negative dimension {d}")));
		}

		let tensor = &self.model.primary_subgraph().tensors[index];
		let declared_rank = tensor.shape_signature.rank();
		if declared_rank != 0 && declared_rank != dims.len() {
			return Err(Error::new_with_code(
				ErrorCode::InvalidArgument,
				format!("Input {index} has rank {declared_rank}, but the new shape has rank {}", dims.len())
			));
		}
		if strict {
			let fixed_mismatch = tensor.shape_signature.iter().zip(dims).any(|(&declared, &new)| declared >= 0 && declared != new);
			if fixed_mismatch {
				return Err(Error::new_with_code(
					ErrorCode::InvalidArgument,
					format!("Input {index} can only change its dynamic dimensions (signature {})", tensor.shape_signature)
				));
			}
		}

		let shape = Shape::from(dims);
		if self.shapes[index] != shape {
			crate::debug!(tensor = index, from = %self.shapes[index], to = %shape, "Resized input");
			self.shapes[index] = shape;
			self.arena = None;
		}
		Ok(())
	}

	/// Descriptors of the model's input tensors, in declaration order.
	pub fn input_details(&self) -> Result<TensorDetailsList> {
		self.details_for(self.inputs())
	}

	/// Descriptors of the model's output tensors, in declaration order.
	pub fn output_details(&self) -> Result<TensorDetailsList> {
		self.details_for(self.outputs())
	}

	/// Descriptors of every tensor in the primary subgraph, in index order.
	pub fn tensor_details(&self) -> Result<TensorDetailsList> {
		self.ensure_allocated()?;
		Ok((0..self.shapes.len()).map(|i| self.details(i)).collect::<Vec<_>>().into())
	}

	fn details_for(&self, indices: &[usize]) -> Result<TensorDetailsList> {
		self.ensure_allocated()?;
		Ok(indices.iter().map(|&i| self.details(i)).collect::<Vec<_>>().into())
	}

	fn details(&self, index: usize) -> TensorDetails {
		let tensor = &self.model.primary_subgraph().tensors[index];
		TensorDetails {
			name: tensor.name.clone(),
			index,
			shape: self.shapes[index].clone(),
			shape_signature: tensor.shape_signature.clone(),
			dtype: tensor.dtype,
			quantization: tensor.quantization.summary(),
			quantization_parameters: tensor.quantization.clone(),
			sparsity_parameters: tensor.sparsity.clone()
		}
	}

	fn ensure_allocated(&self) -> Result<&Arena> {
		self.arena
			.as_ref()
			.ok_or_else(|| Error::new_with_code(ErrorCode::TensorsNotAllocated, "Tensors have not been allocated; call `allocate_tensors` first"))
	}

	fn tensor_info(&self, index: usize) -> Result<&TensorInfo> {
		let tensors = &self.model.primary_subgraph().tensors;
		tensors
			.get(index)
			.ok_or_else(|| Error::new_with_code(ErrorCode::InvalidArgument, format!("Tensor index {index} is out of range (have {})", tensors.len())))
	}

	/// Raw bytes of tensor `index`: the constant data stored in the model, or its region of the arena.
	pub fn tensor_data(&self, index: usize) -> Result<&[u8]> {
		let arena = self.ensure_allocated()?;
		let tensor = self.tensor_info(index)?;
		if self.model.is_constant(tensor) {
			return Ok(self.model.buffer_data(tensor.buffer).unwrap_or_default());
		}
		arena
			.region(index)
			.ok_or_else(|| Error::new_with_code(ErrorCode::InvalidArgument, format!("Tensor {index} of type {} has no buffer", tensor.dtype)))
	}

	fn check_type<T: PrimitiveTensorElementType>(&self, index: usize) -> Result<()> {
		let tensor = self.tensor_info(index)?;
		let requested = T::into_tensor_element_type();
		if tensor.dtype != requested {
			return Err(Error::new_with_code(
				ErrorCode::InvalidArgument,
				format!("Cannot access tensor {index} of type {} as {requested}", tensor.dtype)
			));
		}
		Ok(())
	}

	/// Returns a view of tensor `index`'s data, shaped according to its current shape.
	///
	/// The data is borrowed when it is suitably aligned for `T` and copied otherwise. The element type must match the
	/// tensor's type exactly.
	///
	/// TensorFlow Lite stores tensor data little-endian, so typed access is only available on little-endian targets;
	/// use [`Interpreter::tensor_data`] elsewhere.
	#[cfg(all(feature = "ndarray", target_endian = "little"))]
	#[cfg_attr(docsrs, doc(cfg(all(feature = "ndarray", target_endian = "little"))))]
	pub fn tensor<T: PrimitiveTensorElementType>(&self, index: usize) -> Result<CowArray<'_, T, IxDyn>> {
		self.check_type::<T>(index)?;
		let bytes = self.tensor_data(index)?;
		// allocation succeeded, so every dimension is non-negative
		let dims: Vec<usize> = self.shapes[index].iter().map(|&d| d as usize).collect();
		let len = bytes.len() / mem::size_of::<T>();

		if bytes.as_ptr().align_offset(mem::align_of::<T>()) == 0 {
			// SAFETY: `bytes` is aligned for `T`, holds at least `len` elements, and every bit pattern is a valid `T`.
			let data = unsafe { slice::from_raw_parts(bytes.as_ptr().cast::<T>(), len) };
			ArrayView::from_shape(IxDyn(&dims), data).map(CowArray::from).map_err(Error::wrap)
		} else {
			let data = bytes
				.chunks_exact(mem::size_of::<T>())
				// SAFETY: each chunk holds exactly one `T`, read without assuming alignment.
				.map(|chunk| unsafe { chunk.as_ptr().cast::<T>().read_unaligned() })
				.collect::<Vec<_>>();
			Array::from_shape_vec(IxDyn(&dims), data).map(CowArray::from).map_err(Error::wrap)
		}
	}

	/// Copies `data` into the buffer of non-constant tensor `index`.
	///
	/// `data` must hold exactly as many elements as the tensor's current shape. Like [`Interpreter::tensor`], this is
	/// only available on little-endian targets.
	#[cfg(target_endian = "little")]
	pub fn set_tensor<T: PrimitiveTensorElementType>(&mut self, index: usize, data: &[T]) -> Result<()> {
		self.ensure_allocated()?;
		self.check_type::<T>(index)?;
		let tensor = self.tensor_info(index)?;
		if self.model.is_constant(tensor) {
			return Err(Error::new_with_code(ErrorCode::InvalidArgument, format!("Tensor {index} (`{}`) is constant and cannot be written", tensor.name)));
		}

		// SAFETY: `T` is plain old data without padding, so its bytes can be viewed directly.
		let src = unsafe { slice::from_raw_parts(data.as_ptr().cast::<u8>(), mem::size_of_val(data)) };
		let dst = self
			.arena
			.as_mut()
			.and_then(|arena| arena.region_mut(index))
			.ok_or_else(|| Error::new_with_code(ErrorCode::InvalidArgument, format!("Tensor {index} has no buffer")))?;
		if dst.len() != src.len() {
			return Err(Error::new_with_code(
				ErrorCode::InvalidArgument,
				format!("Tensor {index} holds {} elements, but {} were provided", dst.len() / mem::size_of::<T>(), data.len())
			));
		}
		dst.copy_from_slice(src);
		Ok(())
	}
}
