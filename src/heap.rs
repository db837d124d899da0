use std::{
  fmt::Write as _,
  ptr::{self, NonNull},
  slice,
};

use crate::{
  align::{self, ALIGNMENT},
  block::{Block, BlockInfo, HEADER_SIZE, SIGNATURE},
  config::{CoalesceMode, HeapConfig},
  error::{HeapError, Result},
  segment::Segment,
};

/// Bookkeeping for an initialized heap.
#[derive(Clone, Copy)]
struct Region {
  /// Region end observed at initialization; `reset` retracts back to it.
  start: usize,
  /// Address of the first block: `start` rounded up to the alignment unit.
  base: usize,
  head: *mut Block,
}

/// First-fit heap over a single growable [`Segment`].
///
/// ```text
///   base                                                    segment end
///   ▼                                                            ▼
///   ┌────────┬──────────────┬────────┬──────┬────────┬───────────┐
///   │ header │   payload    │ header │ free │ header │  payload  │
///   └────────┴──────────────┴────────┴──────┴────────┴───────────┘
///        └──── next ──────────►  └──── next ────►
///            ◄──── prev ───────      ◄──── prev ──
/// ```
///
/// Headers and payloads interleave in address order and the chain always
/// covers the region exactly, so the last block ends at the segment end.
pub struct Heap<S: Segment> {
  segment: S,
  config: HeapConfig,
  region: Option<Region>,
}

// The heap owns its region exclusively; the raw block pointers never escape
// except as payload addresses handed to the caller.
unsafe impl<S: Segment + Send> Send for Heap<S> {}

impl<S: Segment> Heap<S> {
  pub const fn new(segment: S) -> Self {
    Self::with_config(segment, HeapConfig::DEFAULT)
  }

  pub const fn with_config(
    segment: S,
    config: HeapConfig,
  ) -> Self {
    Self {
      segment,
      config,
      region: None,
    }
  }

  pub fn segment(&self) -> &S {
    &self.segment
  }

  pub fn config(&self) -> &HeapConfig {
    &self.config
  }

  pub fn is_initialized(&self) -> bool {
    self.region.is_some()
  }

  /// Places the heap at the current end of the segment.
  pub fn initialize(&mut self) -> Result<()> {
    if self.region.is_some() {
      log::warn!("cannot double initialize heap");
      return Err(HeapError::AlreadyInitialized);
    }

    let start = self.segment.current();
    let base = align::align_up(start).ok_or(HeapError::OutOfMemory {
      requested: ALIGNMENT,
    })?;

    if base > start {
      self.segment.adjust((base - start) as isize)?;
    }

    self.region = Some(Region {
      start,
      base,
      head: ptr::null_mut(),
    });

    log::debug!("heap initialized at {:#x} (first block at {:#x})", start, base);

    Ok(())
  }

  /// Allocates at least `size` bytes and returns the payload address.
  ///
  /// The first free block large enough wins. When none exists the segment
  /// grows and a new block is appended after the tail.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>> {
    let region = self.region()?;
    let size = align::align_up(size).ok_or(HeapError::OutOfMemory { requested: size })?;

    unsafe {
      let mut tail: *mut Block = ptr::null_mut();
      let mut current = region.head;

      while !current.is_null() {
        if !(*current).in_use && (*current).size >= size {
          self.split(current, size);
          (*current).in_use = true;

          log::trace!("reusing block {:p} ({} bytes)", current, (*current).size);

          return Ok(payload_of(current));
        }

        tail = current;
        current = (*current).next;
      }

      self.append(tail, size)
    }
  }

  /// Same as [`Heap::allocate`], with the whole payload zeroed.
  pub fn zero_allocate(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>> {
    let payload = self.allocate(size)?;

    unsafe {
      let block = header_of(payload);
      ptr::write_bytes(payload.as_ptr(), 0, (*block).size);
    }

    Ok(payload)
  }

  /// Resizes the allocation at `ptr`.
  ///
  /// Shrinking and growing the tail block happen in place. Growing any other
  /// block moves the data to a new allocation and frees the old one; if that
  /// allocation fails the old block is left untouched.
  pub fn reallocate(
    &mut self,
    ptr: NonNull<u8>,
    size: usize,
  ) -> Result<NonNull<u8>> {
    let block = self.lookup(ptr, |addr| HeapError::UseAfterFree { addr })?;
    let size = align::align_up(size).ok_or(HeapError::OutOfMemory { requested: size })?;

    unsafe {
      let current = (*block).size;

      if size == current {
        return Ok(ptr);
      }

      if size < current {
        if self.split(block, size) {
          let rest = (*block).next;
          self.absorb_free_next(rest);
          self.release_tail();
        }
        return Ok(ptr);
      }

      if (*block).next.is_null() {
        let delta = size - current;
        self.grow(delta)?;
        (*block).size = size;

        log::trace!("extended tail block {:p} to {} bytes", block, size);

        return Ok(ptr);
      }

      let moved = self.allocate(size)?;
      ptr::copy_nonoverlapping(ptr.as_ptr(), moved.as_ptr(), current);
      self.free(ptr)?;

      Ok(moved)
    }
  }

  /// Returns the block at `ptr` to the heap and merges adjacent free blocks.
  pub fn free(
    &mut self,
    ptr: NonNull<u8>,
  ) -> Result<()> {
    let block = self.lookup(ptr, |addr| HeapError::DoubleFree { addr })?;

    unsafe {
      (*block).in_use = false;

      match self.config.coalesce {
        CoalesceMode::FullChain => self.coalesce_chain(),
        CoalesceMode::Local => {
          self.absorb_free_next(block);
          let prev = (*block).prev;
          if !prev.is_null() && !(*prev).in_use {
            self.absorb_free_next(prev);
          }
        }
      }

      self.release_tail();
    }

    debug_assert!(self.check_chain().is_ok(), "heap chain broken after free");

    Ok(())
  }

  /// Snapshot of every block in address order.
  pub fn blocks(&self) -> Result<Vec<BlockInfo>> {
    let region = self.region()?;
    let mut blocks = Vec::new();

    let mut current = region.head;
    while !current.is_null() {
      unsafe {
        blocks.push(BlockInfo {
          address: Block::payload(current) as usize,
          size: (*current).size,
          in_use: (*current).in_use,
        });
        current = (*current).next;
      }
    }

    Ok(blocks)
  }

  /// One `node: [used: _] [size: _]` line per block.
  pub fn dump(&self) -> Result<String> {
    let mut out = String::new();

    for block in self.blocks()? {
      let _ = writeln!(
        out,
        "node: [used: {}] [size: {}]",
        u8::from(block.in_use),
        block.size
      );
    }

    Ok(out)
  }

  /// Prints the heap state to stdout.
  pub fn print(&self) -> Result<()> {
    print!("{}", self.dump()?);
    Ok(())
  }

  /// Gives the whole region back and returns to the uninitialized state.
  pub fn reset(&mut self) -> Result<()> {
    let region = self.region()?;
    self.expect_end()?;

    let end = self.segment.current();
    if end < region.start {
      return Err(HeapError::RegionUnderflow {
        boundary: end,
        floor: region.start,
      });
    }

    self.segment.adjust(-((end - region.start) as isize))?;
    self.region = None;

    log::debug!("heap reset to {:#x}", region.start);

    Ok(())
  }

  /// Payload of an allocated block as a slice over its full capacity.
  pub fn payload(
    &self,
    ptr: NonNull<u8>,
  ) -> Result<&[u8]> {
    let size = self.live_size(ptr)?;
    Ok(unsafe { slice::from_raw_parts(ptr.as_ptr(), size) })
  }

  pub fn payload_mut(
    &mut self,
    ptr: NonNull<u8>,
  ) -> Result<&mut [u8]> {
    let size = self.live_size(ptr)?;
    Ok(unsafe { slice::from_raw_parts_mut(ptr.as_ptr(), size) })
  }

  /// Walks the chain and verifies its structure.
  ///
  /// Reports the first offending block as [`HeapError::CorruptedBlock`].
  pub fn check(&self) -> Result<()> {
    let expected = self.check_chain()?;
    let actual = self.segment.current();

    if expected != actual {
      return Err(HeapError::RegionMoved { expected, actual });
    }

    Ok(())
  }

  /// Verifies links and layout of every block and returns the chain end.
  fn check_chain(&self) -> Result<usize> {
    let region = self.region()?;
    let end = self.segment.current();

    let mut expected = region.base;
    let mut prev: *mut Block = ptr::null_mut();
    let mut current = region.head;

    unsafe {
      while !current.is_null() {
        let corrupted = HeapError::CorruptedBlock {
          addr: Block::payload(current) as usize,
        };

        if current as usize != expected
          || (*current).signature != SIGNATURE
          || (*current).prev != prev
          || !align::is_aligned((*current).size)
          || Block::end(current) > end
        {
          return Err(corrupted);
        }

        if !prev.is_null() && !(*prev).in_use && !(*current).in_use {
          return Err(corrupted);
        }

        expected = Block::end(current);
        prev = current;
        current = (*current).next;
      }
    }

    Ok(expected)
  }

  fn region(&self) -> Result<Region> {
    self.region.ok_or(HeapError::NotInitialized)
  }

  fn region_mut(&mut self) -> Result<&mut Region> {
    self.region.as_mut().ok_or(HeapError::NotInitialized)
  }

  fn split_threshold(&self) -> usize {
    self.config.split_threshold.max(1).saturating_mul(HEADER_SIZE)
  }

  /// Address where the chain currently ends.
  fn chain_end(&self) -> Result<usize> {
    let region = self.region()?;
    let tail = self.tail()?;

    Ok(if tail.is_null() {
      region.base
    } else {
      unsafe { Block::end(tail) }
    })
  }

  fn tail(&self) -> Result<*mut Block> {
    let region = self.region()?;
    let mut current = region.head;

    unsafe {
      while !current.is_null() && !(*current).next.is_null() {
        current = (*current).next;
      }
    }

    Ok(current)
  }

  /// Fails when something other than this heap moved the segment end.
  fn expect_end(&self) -> Result<()> {
    let expected = self.chain_end()?;
    let actual = self.segment.current();

    if expected != actual {
      log::warn!("segment end moved from {:#x} to {:#x}", expected, actual);
      return Err(HeapError::RegionMoved { expected, actual });
    }

    Ok(())
  }

  /// Grows the segment by `size` bytes and returns the old end.
  fn grow(
    &mut self,
    size: usize,
  ) -> Result<usize> {
    self.expect_end()?;

    let delta = isize::try_from(size).map_err(|_| HeapError::OutOfMemory { requested: size })?;
    let end = self
      .segment
      .adjust(delta)
      .inspect_err(|err| log::warn!("heap could not grow: {}", err))?;

    log::debug!("heap grew by {} bytes to {:#x}", size, end);

    Ok(end - size)
  }

  /// Shrinks the segment by `size` bytes, never below the first block.
  fn shrink(
    &mut self,
    size: usize,
  ) -> Result<usize> {
    let region = self.region()?;
    let end = self.segment.current();

    let boundary = end.checked_sub(size).unwrap_or(0);
    if boundary < region.base {
      return Err(HeapError::RegionUnderflow {
        boundary,
        floor: region.base,
      });
    }

    let delta = isize::try_from(size).map_err(|_| HeapError::RegionUnderflow {
      boundary,
      floor: region.base,
    })?;
    let end = self.segment.adjust(-delta)?;

    log::debug!("heap shrank by {} bytes to {:#x}", size, end);

    Ok(end)
  }

  /// Appends a new in-use block of `size` bytes after `tail`.
  unsafe fn append(
    &mut self,
    tail: *mut Block,
    size: usize,
  ) -> Result<NonNull<u8>> {
    let total = size
      .checked_add(HEADER_SIZE)
      .ok_or(HeapError::OutOfMemory { requested: size })?;
    let at = self.grow(total)?;

    unsafe {
      let block = Block::place(at, size, true, tail, ptr::null_mut());

      if tail.is_null() {
        self.region_mut()?.head = block;
      } else {
        (*tail).next = block;
      }

      log::trace!("appended block {:p} ({} bytes)", block, size);

      Ok(payload_of(block))
    }
  }

  /// Shrinks `block` to `size` and turns the leftover into a free block right
  /// after it, when the leftover is big enough to be worth a header.
  ///
  /// Returns `false` when the leftover stays inside `block`.
  unsafe fn split(
    &mut self,
    block: *mut Block,
    size: usize,
  ) -> bool {
    unsafe {
      let leftover = (*block).size - size;
      if leftover < self.split_threshold() {
        return false;
      }

      let next = (*block).next;
      let at = block as usize + HEADER_SIZE + size;
      let rest = Block::place(at, leftover - HEADER_SIZE, false, block, next);

      if !next.is_null() {
        (*next).prev = rest;
      }
      (*block).next = rest;
      (*block).size = size;

      log::trace!(
        "split {:p}: kept {} bytes, {} bytes free at {:p}",
        block,
        size,
        leftover - HEADER_SIZE,
        rest
      );

      true
    }
  }

  /// Merges every run of adjacent free blocks in the chain.
  unsafe fn coalesce_chain(&mut self) {
    let Ok(region) = self.region() else {
      return;
    };

    unsafe {
      let mut current = region.head;
      while !current.is_null() {
        let next = (*current).next;
        if !(*current).in_use && !next.is_null() && !(*next).in_use {
          self.absorb_free_next(current);
        } else {
          current = next;
        }
      }
    }
  }

  /// Folds the block after `block` into it when both are free.
  unsafe fn absorb_free_next(
    &mut self,
    block: *mut Block,
  ) {
    unsafe {
      let next = (*block).next;
      if (*block).in_use || next.is_null() || (*next).in_use {
        return;
      }

      (*block).size += HEADER_SIZE + (*next).size;
      (*block).next = (*next).next;
      if !(*next).next.is_null() {
        (*(*next).next).prev = block;
      }

      log::trace!("merged {:p} into {:p} ({} bytes)", next, block, (*block).size);
    }
  }

  /// Gives a free tail block back to the segment when configured to.
  unsafe fn release_tail(&mut self) {
    if !self.config.release_tail {
      return;
    }

    let Ok(tail) = self.tail() else {
      return;
    };

    unsafe {
      if tail.is_null() || (*tail).in_use {
        return;
      }

      if let Err(err) = self.expect_end() {
        log::warn!("keeping free tail block {:p}: {}", tail, err);
        return;
      }

      // The header lives in the memory about to be released.
      let prev = (*tail).prev;
      let size = HEADER_SIZE + (*tail).size;

      if let Err(err) = self.shrink(size) {
        log::warn!("keeping free tail block {:p}: {}", tail, err);
        return;
      }

      if prev.is_null() {
        if let Ok(region) = self.region_mut() {
          region.head = ptr::null_mut();
        }
      } else {
        (*prev).next = ptr::null_mut();
      }
    }
  }

  /// Finds the in-use block whose payload starts at `ptr`.
  ///
  /// The address is range checked and then matched against the chain, so a
  /// header-looking pattern inside some payload is never taken for a block.
  /// Pointers to blocks that are free, or that were merged into a free block,
  /// report `freed`.
  fn lookup(
    &self,
    ptr: NonNull<u8>,
    freed: fn(usize) -> HeapError,
  ) -> Result<*mut Block> {
    let region = self.region()?;
    let end = self.segment.current();
    let addr = ptr.as_ptr() as usize;
    let corrupted = HeapError::CorruptedBlock { addr };

    if addr < region.base + HEADER_SIZE || addr > end || !align::is_aligned(addr) {
      log::warn!("corrupted heap: {:p} is outside the heap", ptr);
      return Err(corrupted);
    }

    let header = addr - HEADER_SIZE;
    let mut current = region.head;

    unsafe {
      while !current.is_null() && current as usize <= header {
        if current as usize == header {
          if (*current).signature != SIGNATURE {
            log::warn!("corrupted heap: block header before {:p} overwritten", ptr);
            return Err(corrupted);
          }
          if !(*current).in_use {
            log::warn!("block {:p} is already free", ptr);
            return Err(freed(addr));
          }
          return Ok(current);
        }

        if header < Block::end(current) {
          if (*current).in_use {
            break;
          }
          log::warn!("block {:p} was merged into free block {:p}", ptr, current);
          return Err(freed(addr));
        }

        current = (*current).next;
      }
    }

    log::warn!("corrupted heap: no block header before {:p}", ptr);
    Err(corrupted)
  }

  fn live_size(
    &self,
    ptr: NonNull<u8>,
  ) -> Result<usize> {
    let block = self.lookup(ptr, |addr| HeapError::UseAfterFree { addr })?;
    Ok(unsafe { (*block).size })
  }
}

fn payload_of(block: *mut Block) -> NonNull<u8> {
  // Headers never sit at address zero, so the payload is never null.
  unsafe { NonNull::new_unchecked(Block::payload(block)) }
}

fn header_of(payload: NonNull<u8>) -> *mut Block {
  payload.as_ptr().wrapping_sub(HEADER_SIZE) as *mut Block
}
