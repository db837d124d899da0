use std::{mem, ptr};

use crate::align::ALIGNMENT;

/// Magic value written into every header.
pub const SIGNATURE: u64 = 0x55DE_55AD_55BE_55EF;

/// Size of a block header. Padded to exactly one cache line so payloads stay aligned.
pub const HEADER_SIZE: usize = mem::size_of::<Block>();

const _: () = assert!(HEADER_SIZE == ALIGNMENT);
const _: () = assert!(HEADER_SIZE == crate::align!(HEADER_SIZE));

#[repr(C, align(64))]
pub struct Block {
  pub signature: u64,
  pub in_use: bool,
  pub size: usize,
  pub prev: *mut Block,
  pub next: *mut Block,
}

impl Block {
  pub fn new(
    size: usize,
    in_use: bool,
    prev: *mut Block,
    next: *mut Block,
  ) -> Self {
    Self {
      signature: SIGNATURE,
      in_use,
      size,
      prev,
      next,
    }
  }

  /// Writes a fresh header at `addr` and returns it.
  ///
  /// # Safety
  ///
  /// `addr` must be aligned and `HEADER_SIZE` writable bytes must follow it.
  pub unsafe fn place(
    addr: usize,
    size: usize,
    in_use: bool,
    prev: *mut Block,
    next: *mut Block,
  ) -> *mut Block {
    let block = addr as *mut Block;
    unsafe { ptr::write(block, Block::new(size, in_use, prev, next)) };
    block
  }

  /// Payload address of `block`.
  pub fn payload(block: *mut Block) -> *mut u8 {
    (block as *mut u8).wrapping_add(HEADER_SIZE)
  }

  /// First address past the payload of `block`.
  ///
  /// # Safety
  ///
  /// `block` must point at a live header.
  pub unsafe fn end(block: *mut Block) -> usize {
    block as usize + HEADER_SIZE + unsafe { (*block).size }
  }
}

/// Snapshot of one block, as reported by [`Heap::blocks`](crate::Heap::blocks).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
  /// Address of the payload handed to the caller.
  pub address: usize,
  /// Payload capacity in bytes.
  pub size: usize,
  pub in_use: bool,
}
