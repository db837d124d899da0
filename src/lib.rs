//! # rheap - A First-Fit Region Heap
//!
//! This crate provides a small **first-fit heap allocator** that manages one
//! contiguous region whose top boundary moves with `sbrk(2)` (or with any other
//! [`Segment`]).
//!
//! ## Overview
//!
//! Every allocation is a block: a 64-byte header followed by its payload. The
//! blocks form a doubly-linked chain in address order that covers the region
//! from its first block to its current end:
//!
//! ```text
//!   Region:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │   ┌────┬─────────┬────┬─────┬────┬──────────────┐                    │
//!   │   │ H  │  used   │ H  │free │ H  │     used     │   (not mapped)     │
//!   │   └────┴─────────┴────┴─────┴────┴──────────────┘                    │
//!   │   ▲                                             ▲                    │
//!   │   │                                             │                    │
//!   │  base                                     Program Break              │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   allocate: first free block that fits, split when the rest is useful,
//!             otherwise grow the break and append.
//!   free:     mark free, merge neighbouring free blocks.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   rheap
//!   ├── align          - Cache line alignment (align!, align_up)
//!   ├── block          - Block header layout (internal)
//!   ├── config         - HeapConfig, CoalesceMode
//!   ├── error          - HeapError
//!   ├── heap           - Heap: allocate, reallocate, free, ...
//!   ├── locked         - LockedHeap: mutex wrapper and GlobalAlloc
//!   ├── mapped         - MappedSegment: mmap-backed region
//!   ├── program_break  - ProgramBreak: sbrk-backed region
//!   └── segment        - Segment trait
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use rheap::{Heap, MappedSegment};
//!
//! let mut heap = Heap::new(MappedSegment::new(1 << 20).unwrap());
//! heap.initialize().unwrap();
//!
//! let a = heap.allocate(333).unwrap();
//! let b = heap.allocate(1).unwrap();
//! heap.free(b).unwrap();
//!
//! assert_eq!(heap.dump().unwrap(), "node: [used: 1] [size: 384]\nnode: [used: 0] [size: 64]\n");
//!
//! heap.free(a).unwrap();
//! heap.reset().unwrap();
//! ```
//!
//! ## Block Layout
//!
//! ```text
//!   ┌───────────────────────┬────────────────────────────────┐
//!   │    Block Header       │         User Data              │
//!   │  ┌─────────────────┐  │                                │
//!   │  │ signature       │  │  ┌──────────────────────────┐  │
//!   │  │ in_use          │  │  │                          │  │
//!   │  │ size: N         │  │  │  N bytes, N % 64 == 0    │  │
//!   │  │ prev, next      │  │  │                          │  │
//!   │  └─────────────────┘  │  └──────────────────────────┘  │
//!   │      64 bytes         │                                │
//!   └───────────────────────┴────────────────────────────────┘
//!                           ▲
//!                           └── Pointer returned to user
//! ```
//!
//! ## Limitations
//!
//! - **Single-threaded**: [`Heap`] takes `&mut self`; share it through [`LockedHeap`]
//! - **Unix-only**: Requires `libc` (`sbrk`, `mmap`)
//! - **64-byte alignment**: larger alignments are not supported
//!
//! ## Safety
//!
//! Pointers handed to [`Heap::free`] and [`Heap::reallocate`] are checked
//! against the region bounds and the header signature before anything is read
//! or written. Accessing payload memory through the returned raw pointers is up
//! to the caller; [`Heap::payload`] and [`Heap::payload_mut`] give checked slices.

pub mod align;
mod block;
mod config;
mod error;
mod heap;
mod locked;
mod mapped;
mod program_break;
mod segment;

pub use block::{BlockInfo, HEADER_SIZE};
pub use config::{CoalesceMode, HeapConfig};
pub use error::{HeapError, Result};
pub use heap::Heap;
pub use locked::LockedHeap;
pub use mapped::MappedSegment;
pub use program_break::ProgramBreak;
pub use segment::Segment;
