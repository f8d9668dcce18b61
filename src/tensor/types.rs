use core::fmt;

use crate::error::{Error, ErrorCode, Result};

/// Element types of TensorFlow Lite tensors, with their on-disk `TensorType` codes.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[repr(i8)]
pub enum TensorElementType {
	/// 32-bit floating point number, equivalent to Rust's `f32`.
	Float32 = 0,
	/// 16-bit floating point number, equivalent to [`half::f16`] (requires the `half` feature for data access).
	Float16 = 1,
	/// Signed 32-bit integer, equivalent to Rust's `i32`.
	Int32 = 2,
	/// Unsigned 8-bit integer, equivalent to Rust's `u8`.
	Uint8 = 3,
	/// Signed 64-bit integer, equivalent to Rust's `i64`.
	Int64 = 4,
	/// Variable-length strings, packed in a single buffer.
	String = 5,
	/// Boolean, equivalent to Rust's `bool`.
	Bool = 6,
	/// Signed 16-bit integer, equivalent to Rust's `i16`.
	Int16 = 7,
	/// Complex number of two `f32`s.
	Complex64 = 8,
	/// Signed 8-bit integer, equivalent to Rust's `i8`.
	Int8 = 9,
	/// 64-bit floating point number, equivalent to Rust's `f64`.
	Float64 = 10,
	/// Complex number of two `f64`s.
	Complex128 = 11,
	/// Unsigned 64-bit integer, equivalent to Rust's `u64`.
	Uint64 = 12,
	/// Opaque resource handle.
	Resource = 13,
	/// Opaque variant handle.
	Variant = 14,
	/// Unsigned 32-bit integer, equivalent to Rust's `u32`.
	Uint32 = 15,
	/// Unsigned 16-bit integer, equivalent to Rust's `u16`.
	Uint16 = 16,
	/// Signed 4-bit integer, packed two per byte.
	Int4 = 17,
	/// Brain 16-bit floating point number, equivalent to [`half::bf16`] (requires the `half` feature for data access).
	Bfloat16 = 18
}

impl TensorElementType {
	/// Decodes a `TensorType` code as stored in the model flatbuffer.
	pub fn from_code(code: i8) -> Result<Self> {
		Ok(match code {
			0 => TensorElementType::Float32,
			1 => TensorElementType::Float16,
			2 => TensorElementType::Int32,
			3 => TensorElementType::Uint8,
			4 => TensorElementType::Int64,
			5 => TensorElementType::String,
			6 => TensorElementType::Bool,
			7 => TensorElementType::Int16,
			8 => TensorElementType::Complex64,
			9 => TensorElementType::Int8,
			10 => TensorElementType::Float64,
			11 => TensorElementType::Complex128,
			12 => TensorElementType::Uint64,
			13 => TensorElementType::Resource,
			14 => TensorElementType::Variant,
			15 => TensorElementType::Uint32,
			16 => TensorElementType::Uint16,
			17 => TensorElementType::Int4,
			18 => TensorElementType::Bfloat16,
			_ => return Err(Error::new_with_code(ErrorCode::InvalidModel, format!("Unknown tensor type code {code}")))
		})
	}

	#[inline]
	pub fn code(&self) -> i8 {
		*self as i8
	}

	/// Width of one element in bytes, or `None` for types without a fixed-size representation.
	///
	/// [`TensorElementType::Int4`] reports `1`; use [`TensorElementType::byte_len`] to size packed buffers.
	pub fn byte_width(&self) -> Option<usize> {
		match self {
			TensorElementType::Bool | TensorElementType::Uint8 | TensorElementType::Int8 | TensorElementType::Int4 => Some(1),
			TensorElementType::Float16 | TensorElementType::Bfloat16 | TensorElementType::Int16 | TensorElementType::Uint16 => Some(2),
			TensorElementType::Float32 | TensorElementType::Int32 | TensorElementType::Uint32 => Some(4),
			TensorElementType::Float64 | TensorElementType::Int64 | TensorElementType::Uint64 | TensorElementType::Complex64 => Some(8),
			TensorElementType::Complex128 => Some(16),
			TensorElementType::String | TensorElementType::Resource | TensorElementType::Variant => None
		}
	}

	/// Bytes needed to store `num_elements` elements of this type, or `None` on overflow or for types without a
	/// fixed-size representation.
	pub fn byte_len(&self, num_elements: usize) -> Option<usize> {
		match self {
			TensorElementType::Int4 => Some(num_elements.div_ceil(2)),
			_ => self.byte_width()?.checked_mul(num_elements)
		}
	}
}

impl fmt::Display for TensorElementType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			TensorElementType::Float32 => "f32",
			TensorElementType::Float16 => "f16",
			TensorElementType::Int32 => "i32",
			TensorElementType::Uint8 => "u8",
			TensorElementType::Int64 => "i64",
			TensorElementType::String => "String",
			TensorElementType::Bool => "bool",
			TensorElementType::Int16 => "i16",
			TensorElementType::Complex64 => "c64",
			TensorElementType::Int8 => "i8",
			TensorElementType::Float64 => "f64",
			TensorElementType::Complex128 => "c128",
			TensorElementType::Uint64 => "u64",
			TensorElementType::Resource => "resource",
			TensorElementType::Variant => "variant",
			TensorElementType::Uint32 => "u32",
			TensorElementType::Uint16 => "u16",
			TensorElementType::Int4 => "i4",
			TensorElementType::Bfloat16 => "bf16"
		})
	}
}

/// Trait used to map Rust types (for example `f32`) to TensorFlow Lite element types (for example `Float32`).
///
/// Implemented for plain-old-data types whose every bit pattern is a valid value, which is what makes reading them
/// straight out of a tensor buffer sound.
pub trait PrimitiveTensorElementType: Copy + 'static {
	/// Returns the element type corresponding to the given Rust type.
	fn into_tensor_element_type() -> TensorElementType;

	crate::private_trait!();
}

macro_rules! impl_type_trait {
	($type_:ty, $variant:ident) => {
		impl PrimitiveTensorElementType for $type_ {
			fn into_tensor_element_type() -> TensorElementType {
				TensorElementType::$variant
			}

			crate::private_impl!();
		}
	};
}

impl_type_trait!(f32, Float32);
impl_type_trait!(u8, Uint8);
impl_type_trait!(i8, Int8);
impl_type_trait!(u16, Uint16);
impl_type_trait!(i16, Int16);
impl_type_trait!(i32, Int32);
impl_type_trait!(i64, Int64);
impl_type_trait!(f64, Float64);
impl_type_trait!(u32, Uint32);
impl_type_trait!(u64, Uint64);
#[cfg(feature = "half")]
#[cfg_attr(docsrs, doc(cfg(feature = "half")))]
impl_type_trait!(half::f16, Float16);
#[cfg(feature = "half")]
#[cfg_attr(docsrs, doc(cfg(feature = "half")))]
impl_type_trait!(half::bf16, Bfloat16);
