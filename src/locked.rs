use core::alloc::{GlobalAlloc, Layout};
use std::ptr::{self, NonNull};

use parking_lot::{Mutex, MutexGuard};

use crate::{
  align::ALIGNMENT,
  error::Result,
  heap::Heap,
  segment::Segment,
};

/// A [`Heap`] behind a single lock, usable from several threads and as a
/// [`GlobalAlloc`].
///
/// Every operation takes the lock for its whole duration; coalescing may touch
/// any part of the chain, so there is nothing finer to lock.
///
/// ```rust,ignore
/// use rheap::{Heap, LockedHeap, ProgramBreak};
///
/// #[global_allocator]
/// static GLOBAL: LockedHeap<ProgramBreak> = LockedHeap::new(Heap::new(ProgramBreak));
/// ```
///
/// Used as the global allocator, the heap must not log through a logger that
/// allocates, as that would re-enter the lock.
pub struct LockedHeap<S: Segment> {
  inner: Mutex<Heap<S>>,
}

impl<S: Segment> LockedHeap<S> {
  pub const fn new(heap: Heap<S>) -> Self {
    Self {
      inner: Mutex::new(heap),
    }
  }

  pub fn lock(&self) -> MutexGuard<'_, Heap<S>> {
    self.inner.lock()
  }

  pub fn into_inner(self) -> Heap<S> {
    self.inner.into_inner()
  }

  /// Runs `f` with exclusive access to the heap.
  pub fn with<T>(
    &self,
    f: impl FnOnce(&mut Heap<S>) -> T,
  ) -> T {
    f(&mut self.inner.lock())
  }

  /// Locks the heap and initializes it on first use.
  fn ready(&self) -> Result<MutexGuard<'_, Heap<S>>> {
    let mut heap = self.inner.lock();
    if !heap.is_initialized() {
      heap.initialize()?;
    }
    Ok(heap)
  }
}

fn into_raw(result: Result<NonNull<u8>>) -> *mut u8 {
  result.map_or(ptr::null_mut(), NonNull::as_ptr)
}

unsafe impl<S: Segment + Send> GlobalAlloc for LockedHeap<S> {
  unsafe fn alloc(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    if layout.align() > ALIGNMENT {
      return ptr::null_mut();
    }
    into_raw(self.ready().and_then(|mut heap| heap.allocate(layout.size())))
  }

  unsafe fn alloc_zeroed(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    if layout.align() > ALIGNMENT {
      return ptr::null_mut();
    }
    into_raw(self.ready().and_then(|mut heap| heap.zero_allocate(layout.size())))
  }

  unsafe fn dealloc(
    &self,
    ptr: *mut u8,
    _layout: Layout,
  ) {
    if let Some(ptr) = NonNull::new(ptr) {
      // `dealloc` has no error channel; misuse is only reported.
      if let Err(err) = self.inner.lock().free(ptr) {
        log::warn!("dealloc of {:p} failed: {}", ptr, err);
      }
    }
  }

  unsafe fn realloc(
    &self,
    ptr: *mut u8,
    layout: Layout,
    new_size: usize,
  ) -> *mut u8 {
    if layout.align() > ALIGNMENT {
      return ptr::null_mut();
    }
    let Some(ptr) = NonNull::new(ptr) else {
      return ptr::null_mut();
    };
    into_raw(
      self
        .ready()
        .and_then(|mut heap| heap.reallocate(ptr, new_size)),
    )
  }
}

impl<S: Segment> From<Heap<S>> for LockedHeap<S> {
  fn from(heap: Heap<S>) -> Self {
    Self::new(heap)
  }
}
