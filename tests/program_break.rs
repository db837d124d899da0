//! Runs the heap on the real program break.
//!
//! The system allocator may use the same break, so these tests are serialized
//! and only check what the heap itself controls.

use rheap::{Heap, HeapError, ProgramBreak, Segment};
use serial_test::serial;

#[test]
#[serial]
fn allocate_free_and_reset_on_program_break() {
  let mut heap = Heap::new(ProgramBreak);
  let before = heap.segment().current();

  heap.initialize().unwrap();

  let a = heap.allocate(333).unwrap();
  let b = heap.allocate(1).unwrap();
  assert_eq!(a.as_ptr() as usize % 64, 0);
  assert_eq!(b.as_ptr() as usize % 64, 0);

  heap.payload_mut(a).unwrap().fill(0x5A);
  heap.free(b).unwrap();
  assert_eq!(
    heap.dump().unwrap(),
    "node: [used: 1] [size: 384]\nnode: [used: 0] [size: 64]\n"
  );
  assert!(heap.payload(a).unwrap().iter().all(|byte| *byte == 0x5A));

  heap.reset().unwrap();
  assert_eq!(heap.segment().current(), before);
}

#[test]
#[serial]
fn lifecycle_errors_on_program_break() {
  let mut heap = Heap::new(ProgramBreak);

  assert_eq!(heap.allocate(1), Err(HeapError::NotInitialized));

  heap.initialize().unwrap();
  assert_eq!(heap.initialize(), Err(HeapError::AlreadyInitialized));

  heap.reset().unwrap();
  assert_eq!(heap.reset(), Err(HeapError::NotInitialized));
}
