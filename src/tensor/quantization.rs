use core::fmt;

use tract_tflite::tflite;

/// Affine quantization parameters of a tensor: `real = scale * (quantized - zero_point)`.
///
/// Per-tensor quantization has exactly one scale and zero point; per-channel quantization has one pair per slice along
/// [`QuantizationParameters::quantized_dimension`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuantizationParameters {
	pub scales: Vec<f32>,
	pub zero_points: Vec<i64>,
	pub quantized_dimension: i32
}

impl QuantizationParameters {
	pub(crate) fn from_tflite(params: Option<tflite::QuantizationParameters<'_>>) -> Self {
		let Some(params) = params else {
			return Self::default();
		};
		Self {
			scales: params.scale().map(|v| v.iter().collect()).unwrap_or_default(),
			zero_points: params.zero_point().map(|v| v.iter().collect()).unwrap_or_default(),
			quantized_dimension: params.quantized_dimension()
		}
	}

	/// Returns `true` if the tensor carries no quantization.
	#[inline]
	pub fn is_empty(&self) -> bool {
		self.scales.is_empty()
	}

	/// Returns `true` if there is one scale per slice along the quantized dimension rather than a single scale.
	#[inline]
	pub fn is_per_channel(&self) -> bool {
		self.scales.len() > 1
	}

	/// The legacy `(scale, zero_point)` pair.
	///
	/// This is only meaningful for per-tensor quantization; per-channel and unquantized tensors report `(0.0, 0)`.
	pub fn summary(&self) -> (f32, i64) {
		match (self.scales.as_slice(), self.zero_points.as_slice()) {
			([scale], [zero_point]) => (*scale, *zero_point),
			([scale], []) => (*scale, 0),
			_ => (0.0, 0)
		}
	}
}

impl fmt::Display for QuantizationParameters {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{{scales: {:?}, zero_points: {:?}, quantized_dimension: {}}}", self.scales, self.zero_points, self.quantized_dimension)
	}
}

/// Storage format of one dimension of a sparse tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionType {
	Dense,
	SparseCsr
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionMetadata {
	pub format: DimensionType,
	/// Size of the dimension when `format` is [`DimensionType::Dense`].
	pub dense_size: i32
}

impl fmt::Display for DimensionMetadata {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.format {
			DimensionType::Dense => write!(f, "dense({})", self.dense_size),
			DimensionType::SparseCsr => f.write_str("sparse_csr")
		}
	}
}

/// Describes how a sparse constant tensor is encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SparsityParameters {
	pub traversal_order: Vec<i32>,
	pub block_map: Vec<i32>,
	pub dim_metadata: Vec<DimensionMetadata>
}

impl SparsityParameters {
	pub(crate) fn from_tflite(params: tflite::SparsityParameters<'_>) -> Self {
		Self {
			traversal_order: params.traversal_order().map(|v| v.iter().collect()).unwrap_or_default(),
			block_map: params.block_map().map(|v| v.iter().collect()).unwrap_or_default(),
			dim_metadata: params
				.dim_metadata()
				.map(|v| {
					v.iter()
						.map(|m| DimensionMetadata {
							format: if m.format() == tflite::DimensionType::DENSE { DimensionType::Dense } else { DimensionType::SparseCsr },
							dense_size: m.dense_size()
						})
						.collect()
				})
				.unwrap_or_default()
		}
	}
}

impl fmt::Display for SparsityParameters {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{{traversal_order: {:?}, block_map: {:?}, dim_metadata: [", self.traversal_order, self.block_map)?;
		for (i, m) in self.dim_metadata.iter().enumerate() {
			if i > 0 {
				f.write_str(", ")?;
			}
			write!(f, "{m}")?;
		}
		f.write_str("]}")
	}
}

#[cfg(test)]
mod tests {
	use super::{DimensionMetadata, DimensionType, QuantizationParameters, SparsityParameters};

	#[test]
	fn test_summary_per_tensor() {
		let q = QuantizationParameters {
			scales: vec![0.5],
			zero_points: vec![-128],
			quantized_dimension: 0
		};
		assert_eq!(q.summary(), (0.5, -128));
		assert_eq!(q.to_string(), "{scales: [0.5], zero_points: [-128], quantized_dimension: 0}");
	}

	#[test]
	fn test_summary_per_channel_is_zeroed() {
		let q = QuantizationParameters {
			scales: vec![0.1, 0.2, 0.3],
			zero_points: vec![0, 0, 0],
			quantized_dimension: 3
		};
		assert_eq!(q.summary(), (0.0, 0));
		assert_eq!(q.to_string(), "{scales: [0.1, 0.2, 0.3], zero_points: [0, 0, 0], quantized_dimension: 3}");
	}

	#[test]
	fn test_unquantized() {
		let q = QuantizationParameters::default();
		assert!(q.is_empty());
		assert_eq!(q.summary(), (0.0, 0));
		assert_eq!(q.to_string(), "{scales: [], zero_points: [], quantized_dimension: 0}");
	}

	#[test]
	fn test_sparsity_display() {
		let s = SparsityParameters {
			traversal_order: vec![0, 1],
			block_map: vec![],
			dim_metadata: vec![
				DimensionMetadata { format: DimensionType::Dense, dense_size: 4 },
				DimensionMetadata { format: DimensionType::SparseCsr, dense_size: 0 }
			]
		};
		assert_eq!(s.to_string(), "{traversal_order: [0, 1], block_map: [], dim_metadata: [dense(4), sparse_csr]}");
	}
}
