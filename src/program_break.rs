use libc::{c_void, intptr_t, sbrk};

use crate::{
  error::{HeapError, Result},
  segment::Segment,
};

/// The process data segment, moved with `sbrk(2)`.
///
/// The system `malloc` may move the same boundary, so the heap checks that the
/// break still sits at its chain end before every growth or retraction.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProgramBreak;

impl Segment for ProgramBreak {
  fn current(&self) -> usize {
    unsafe { sbrk(0) as usize }
  }

  fn adjust(
    &mut self,
    delta: isize,
  ) -> Result<usize> {
    let previous = unsafe { sbrk(delta as intptr_t) };

    if previous == usize::MAX as *mut c_void {
      let current = self.current();
      return Err(if delta >= 0 {
        HeapError::OutOfMemory {
          requested: delta.unsigned_abs(),
        }
      } else {
        HeapError::ReleaseFailed {
          boundary: current.wrapping_add_signed(delta),
        }
      });
    }

    let boundary = (previous as usize).wrapping_add_signed(delta);
    log::debug!("program break moved by {} to {:#x}", delta, boundary);

    Ok(boundary)
  }
}
