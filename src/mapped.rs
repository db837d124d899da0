use std::ptr::{self, NonNull};

use libc::{
  MADV_DONTNEED, MAP_ANONYMOUS, MAP_FAILED, MAP_NORESERVE, MAP_PRIVATE, PROT_READ, PROT_WRITE,
  _SC_PAGESIZE, c_void,
};

use crate::{
  error::{HeapError, Result},
  segment::Segment,
};

fn page_size() -> usize {
  let size = unsafe { libc::sysconf(_SC_PAGESIZE) };
  if size < 1 { 4096 } else { size as usize }
}

fn page_align(value: usize) -> usize {
  let page = page_size();
  (value + page - 1) & !(page - 1)
}

/// A fixed reservation of anonymous memory used as a growable region.
///
/// The whole capacity is mapped up front with `MAP_NORESERVE`; the logical top
/// starts at the base and moves inside the reservation. Pages given back by a
/// shrink are released with `MADV_DONTNEED`. Unlike [`ProgramBreak`](crate::ProgramBreak),
/// nothing else in the process moves this boundary.
pub struct MappedSegment {
  base: NonNull<u8>,
  capacity: usize,
  len: usize,
}

// The reservation is owned exclusively by this value.
unsafe impl Send for MappedSegment {}

impl MappedSegment {
  pub fn new(capacity: usize) -> Result<Self> {
    let capacity = page_align(capacity.max(1));

    let addr = unsafe {
      libc::mmap(
        ptr::null_mut(),
        capacity,
        PROT_READ | PROT_WRITE,
        MAP_PRIVATE | MAP_ANONYMOUS | MAP_NORESERVE,
        -1,
        0,
      )
    };

    if addr == MAP_FAILED {
      return Err(HeapError::OutOfMemory {
        requested: capacity,
      });
    }

    let base = NonNull::new(addr as *mut u8).ok_or(HeapError::OutOfMemory {
      requested: capacity,
    })?;

    log::debug!("mapped {} bytes at {:p}", capacity, base);

    Ok(Self {
      base,
      capacity,
      len: 0,
    })
  }

  pub fn base(&self) -> usize {
    self.base.as_ptr() as usize
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Bytes currently between the base and the top.
  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }
}

impl Segment for MappedSegment {
  fn current(&self) -> usize {
    self.base() + self.len
  }

  fn adjust(
    &mut self,
    delta: isize,
  ) -> Result<usize> {
    let Some(len) = self.len.checked_add_signed(delta) else {
      return Err(if delta >= 0 {
        HeapError::OutOfMemory {
          requested: delta.unsigned_abs(),
        }
      } else {
        HeapError::RegionUnderflow {
          boundary: self.current().wrapping_add_signed(delta),
          floor: self.base(),
        }
      });
    };

    if len > self.capacity {
      return Err(HeapError::OutOfMemory {
        requested: delta.unsigned_abs(),
      });
    }

    if len < self.len {
      let from = page_align(len);
      let to = page_align(self.len);
      if from < to {
        let ret = unsafe {
          libc::madvise(
            self.base.as_ptr().add(from) as *mut c_void,
            to - from,
            MADV_DONTNEED,
          )
        };
        debug_assert!(ret == 0, "madvise(MADV_DONTNEED) failed");
      }
    }

    self.len = len;
    Ok(self.current())
  }
}

impl Drop for MappedSegment {
  fn drop(&mut self) {
    unsafe {
      libc::munmap(self.base.as_ptr() as *mut c_void, self.capacity);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_grow_and_shrink() {
    let mut segment = MappedSegment::new(1 << 16).unwrap();
    let base = segment.base();

    assert_eq!(segment.current(), base);
    assert_eq!(segment.adjust(128).unwrap(), base + 128);
    assert_eq!(segment.adjust(-64).unwrap(), base + 64);
    assert_eq!(segment.len(), 64);
  }

  #[test]
  fn test_capacity_exceeded() {
    let mut segment = MappedSegment::new(4096).unwrap();
    let capacity = segment.capacity();

    assert_eq!(
      segment.adjust(capacity as isize + 1),
      Err(HeapError::OutOfMemory {
        requested: capacity + 1
      })
    );
    assert!(segment.is_empty());
  }

  #[test]
  fn test_underflow() {
    let mut segment = MappedSegment::new(4096).unwrap();
    segment.adjust(64).unwrap();

    assert!(matches!(
      segment.adjust(-128),
      Err(HeapError::RegionUnderflow { .. })
    ));
    assert_eq!(segment.len(), 64);
  }

  #[test]
  fn test_released_pages_read_zero() {
    let page = page_size();
    let mut segment = MappedSegment::new(4 * page).unwrap();
    segment.adjust((2 * page) as isize).unwrap();

    unsafe { ptr::write_bytes(segment.base.as_ptr(), 0xAB, 2 * page) };

    segment.adjust(-(page as isize)).unwrap();
    segment.adjust(page as isize).unwrap();

    let second = unsafe { *segment.base.as_ptr().add(page) };
    let first = unsafe { *segment.base.as_ptr() };
    assert_eq!(second, 0);
    assert_eq!(first, 0xAB);
  }
}
