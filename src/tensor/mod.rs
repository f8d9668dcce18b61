//! Tensor descriptors: element types, shapes and quantization metadata.

use core::{fmt, ops::Deref};

use smallvec::SmallVec;

mod quantization;
mod types;

pub use self::{
	quantization::{DimensionMetadata, DimensionType, QuantizationParameters, SparsityParameters},
	types::{PrimitiveTensorElementType, TensorElementType}
};

/// Ordered dimension sizes of a tensor.
///
/// Shapes read from a model may contain `-1` in a shape *signature* to mark a dynamic dimension; the concrete shape
/// used for allocation never does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
	inner: SmallVec<i32, 4>
}

impl Shape {
	pub fn new(dims: impl IntoIterator<Item = i32>) -> Self {
		Self { inner: dims.into_iter().collect() }
	}

	#[inline]
	pub fn rank(&self) -> usize {
		self.inner.len()
	}

	#[inline]
	pub fn dims(&self) -> &[i32] {
		&self.inner
	}

	/// Total number of elements, `1` for a scalar.
	///
	/// Returns `None` if any dimension is negative or the product overflows.
	pub fn num_elements(&self) -> Option<usize> {
		self.inner
			.iter()
			.try_fold(1usize, |acc, &d| usize::try_from(d).ok().and_then(|d| acc.checked_mul(d)))
	}
}

impl Default for Shape {
	fn default() -> Self {
		Self { inner: SmallVec::new() }
	}
}

impl Deref for Shape {
	type Target = [i32];

	fn deref(&self) -> &Self::Target {
		&self.inner
	}
}

impl From<&[i32]> for Shape {
	fn from(dims: &[i32]) -> Self {
		Shape::new(dims.iter().copied())
	}
}

impl<const N: usize> From<[i32; N]> for Shape {
	fn from(dims: [i32; N]) -> Self {
		Shape::new(dims)
	}
}

impl fmt::Display for Shape {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("(")?;
		for (i, d) in self.inner.iter().enumerate() {
			if i > 0 {
				f.write_str(", ")?;
			}
			write!(f, "{d}")?;
		}
		f.write_str(")")
	}
}

/// Describes one tensor of a loaded model, as reported by
/// [`Interpreter::input_details`](crate::Interpreter::input_details) and friends.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorDetails {
	pub name: String,
	/// Index of the tensor in the primary subgraph.
	pub index: usize,
	/// Concrete shape used for allocation.
	pub shape: Shape,
	/// Declared shape, with `-1` for dynamic dimensions.
	pub shape_signature: Shape,
	pub dtype: TensorElementType,
	/// Legacy `(scale, zero_point)` pair; see [`QuantizationParameters::summary`].
	pub quantization: (f32, i64),
	pub quantization_parameters: QuantizationParameters,
	pub sparsity_parameters: Option<SparsityParameters>
}

impl TensorDetails {
	/// Returns `true` if any dimension of the declared shape is dynamic.
	pub fn is_dynamic(&self) -> bool {
		self.shape_signature.iter().any(|&d| d < 0)
	}
}

impl fmt::Display for TensorDetails {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let (scale, zero_point) = self.quantization;
		write!(
			f,
			"{} {}: Tensor<{}> shape={} shape_signature={} quantization=({scale}, {zero_point}) quantization_parameters={}",
			self.index, self.name, self.dtype, self.shape, self.shape_signature, self.quantization_parameters
		)?;
		if let Some(sparsity) = &self.sparsity_parameters {
			write!(f, " sparsity_parameters={sparsity}")?;
		}
		Ok(())
	}
}

/// An ordered collection of [`TensorDetails`], displayed one descriptor per indented line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TensorDetailsList(pub Vec<TensorDetails>);

impl Deref for TensorDetailsList {
	type Target = [TensorDetails];

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl From<Vec<TensorDetails>> for TensorDetailsList {
	fn from(details: Vec<TensorDetails>) -> Self {
		Self(details)
	}
}

impl fmt::Display for TensorDetailsList {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (i, details) in self.0.iter().enumerate() {
			if i > 0 {
				f.write_str("\n")?;
			}
			write!(f, "    {details}")?;
		}
		Ok(())
	}
}
