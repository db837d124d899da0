use crate::error::Result;

/// A linear memory region whose top boundary can move.
///
/// The heap only ever asks two things of its region: where the top currently
/// is, and to move the top by a signed number of bytes.
pub trait Segment {
  /// Current top address of the region. Must not have side effects.
  fn current(&self) -> usize;

  /// Moves the top by `delta` bytes and returns the new top address.
  ///
  /// Growing failures report [`HeapError::OutOfMemory`](crate::HeapError::OutOfMemory);
  /// shrinking failures report [`HeapError::RegionUnderflow`](crate::HeapError::RegionUnderflow)
  /// or [`HeapError::ReleaseFailed`](crate::HeapError::ReleaseFailed).
  fn adjust(
    &mut self,
    delta: isize,
  ) -> Result<usize>;
}
