//! Tensor memory: aligned byte storage and the arena that backs every non-constant tensor.

use core::{fmt, slice};

use crate::error::{Error, ErrorCode, Result};

/// Alignment of the arena base and of every region inside it.
pub const ARENA_ALIGNMENT: usize = 16;

#[derive(Clone, Copy)]
#[repr(C, align(16))]
struct Chunk([u8; ARENA_ALIGNMENT]);

/// A heap byte buffer whose start is aligned to [`ARENA_ALIGNMENT`].
///
/// Constant buffers are copied into one of these so their data can be viewed as typed slices.
pub struct AlignedBuffer {
	chunks: Vec<Chunk>,
	len: usize
}

impl AlignedBuffer {
	/// Allocates `len` zeroed bytes, failing with [`ErrorCode::AllocationFailed`] if the allocator refuses.
	pub fn zeroed(len: usize) -> Result<Self> {
		let n_chunks = len.div_ceil(ARENA_ALIGNMENT);
		let mut chunks = Vec::new();
		chunks
			.try_reserve_exact(n_chunks)
			.map_err(|e| Error::with_cause(ErrorCode::AllocationFailed, format!("Failed to allocate {len} bytes"), e))?;
		chunks.resize(n_chunks, Chunk([0; ARENA_ALIGNMENT]));
		Ok(Self { chunks, len })
	}

	pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
		let mut buffer = Self::zeroed(bytes.len())?;
		buffer.as_bytes_mut().copy_from_slice(bytes);
		Ok(buffer)
	}

	#[inline]
	pub fn len(&self) -> usize {
		self.len
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	#[inline]
	pub fn as_bytes(&self) -> &[u8] {
		// SAFETY: `chunks` holds at least `len` initialized bytes and `Chunk` has no padding.
		unsafe { slice::from_raw_parts(self.chunks.as_ptr().cast::<u8>(), self.len) }
	}

	#[inline]
	pub fn as_bytes_mut(&mut self) -> &mut [u8] {
		// SAFETY: see `as_bytes`; the borrow of `self` is exclusive.
		unsafe { slice::from_raw_parts_mut(self.chunks.as_mut_ptr().cast::<u8>(), self.len) }
	}
}

impl fmt::Debug for AlignedBuffer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AlignedBuffer").field("len", &self.len).finish_non_exhaustive()
	}
}

/// A byte range inside an [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
	pub offset: usize,
	pub len: usize
}

/// Placement of every tensor's buffer inside an arena.
///
/// Regions are laid out back to back in tensor order, each starting on an [`ARENA_ALIGNMENT`] boundary. Regions are
/// never shared between tensors, so every tensor stays readable after allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArenaPlan {
	regions: Vec<Option<Region>>,
	size: usize
}

impl ArenaPlan {
	/// Plans an arena for tensors needing `sizes[i]` bytes; `None` entries get no region.
	pub fn new(sizes: impl IntoIterator<Item = Option<usize>>) -> Result<Self> {
		let mut size = 0usize;
		let mut regions = Vec::new();
		for len in sizes {
			let Some(len) = len else {
				regions.push(None);
				continue;
			};
			let offset = size;
			size = len
				.checked_next_multiple_of(ARENA_ALIGNMENT)
				.and_then(|padded| offset.checked_add(padded))
				.ok_or_else(|| Error::new_with_code(ErrorCode::AllocationFailed, "Tensor arena size overflows `usize`"))?;
			regions.push(Some(Region { offset, len }));
		}
		Ok(Self { regions, size })
	}

	/// Total arena size in bytes.
	#[inline]
	pub fn size(&self) -> usize {
		self.size
	}

	#[inline]
	pub fn region(&self, tensor: usize) -> Option<Region> {
		self.regions.get(tensor).copied().flatten()
	}
}

/// The allocated backing store for an [`ArenaPlan`].
#[derive(Debug)]
pub struct Arena {
	plan: ArenaPlan,
	buffer: AlignedBuffer
}

impl Arena {
	/// Allocates a zeroed arena for `plan`, refusing plans larger than `limit` bytes.
	pub fn allocate(plan: ArenaPlan, limit: Option<usize>) -> Result<Self> {
		if let Some(limit) = limit {
			if plan.size() > limit {
				return Err(Error::new_with_code(
					ErrorCode::AllocationFailed,
					format!("Tensor arena needs {} bytes, which exceeds the memory limit of {limit} bytes", plan.size())
				));
			}
		}
		let buffer = AlignedBuffer::zeroed(plan.size())?;
		Ok(Self { plan, buffer })
	}

	#[inline]
	pub fn plan(&self) -> &ArenaPlan {
		&self.plan
	}

	/// Returns the bytes backing `tensor`, or `None` if it has no region.
	pub fn region(&self, tensor: usize) -> Option<&[u8]> {
		let region = self.plan.region(tensor)?;
		self.buffer.as_bytes().get(region.offset..region.offset + region.len)
	}

	pub fn region_mut(&mut self, tensor: usize) -> Option<&mut [u8]> {
		let region = self.plan.region(tensor)?;
		self.buffer.as_bytes_mut().get_mut(region.offset..region.offset + region.len)
	}
}

#[cfg(test)]
mod tests {
	use super::{ARENA_ALIGNMENT, AlignedBuffer, Arena, ArenaPlan, Region};
	use crate::error::ErrorCode;

	#[test]
	fn test_plan_aligns_regions() -> crate::Result<()> {
		let plan = ArenaPlan::new([Some(720), None, Some(3), Some(16)])?;
		assert_eq!(plan.region(0), Some(Region { offset: 0, len: 720 }));
		assert_eq!(plan.region(1), None);
		assert_eq!(plan.region(2), Some(Region { offset: 720, len: 3 }));
		assert_eq!(plan.region(3), Some(Region { offset: 736, len: 16 }));
		assert_eq!(plan.region(4), None);
		assert_eq!(plan.size(), 752);
		Ok(())
	}

	#[test]
	fn test_plan_overflow() {
		let err = ArenaPlan::new([Some(usize::MAX - 4)]).expect_err("size must overflow");
		assert_eq!(err.code(), ErrorCode::AllocationFailed);
	}

	#[test]
	fn test_memory_limit() -> crate::Result<()> {
		let plan = ArenaPlan::new([Some(64), Some(64)])?;
		let err = Arena::allocate(plan.clone(), Some(100)).expect_err("arena exceeds limit");
		assert_eq!(err.code(), ErrorCode::AllocationFailed);

		let mut arena = Arena::allocate(plan, Some(128))?;
		assert!(arena.region(1).is_some_and(|r| r.iter().all(|&b| b == 0)));
		arena.region_mut(1).expect("region exists")[0] = 7;
		assert_eq!(arena.region(1).expect("region exists")[0], 7);
		assert_eq!(arena.region(0).expect("region exists")[0], 0);
		Ok(())
	}

	#[test]
	fn test_aligned_buffer() -> crate::Result<()> {
		let buffer = AlignedBuffer::from_bytes(b"TFL3 model bytes")?;
		assert_eq!(buffer.as_bytes(), b"TFL3 model bytes");
		assert_eq!(buffer.as_bytes().as_ptr() as usize % ARENA_ALIGNMENT, 0);
		assert!(AlignedBuffer::zeroed(0)?.is_empty());
		Ok(())
	}
}
