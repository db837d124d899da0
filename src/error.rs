use thiserror::Error;

/// Everything that can go wrong inside the heap.
///
/// Every error is detected before the block chain is touched, so a returned
/// error always leaves the heap exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeapError {
  #[error("heap not initialized")]
  NotInitialized,

  #[error("cannot initialize heap twice")]
  AlreadyInitialized,

  #[error("out of memory: region could not grow by {requested} bytes")]
  OutOfMemory { requested: usize },

  #[error("region underflow: boundary {boundary:#x} is below {floor:#x}")]
  RegionUnderflow { boundary: usize, floor: usize },

  #[error("region could not be retracted to {boundary:#x}")]
  ReleaseFailed { boundary: usize },

  #[error("region end moved behind the heap: expected {expected:#x}, found {actual:#x}")]
  RegionMoved { expected: usize, actual: usize },

  #[error("corrupted heap: no valid block for payload {addr:#x}")]
  CorruptedBlock { addr: usize },

  #[error("trying to free already freed block {addr:#x}")]
  DoubleFree { addr: usize },

  #[error("block {addr:#x} used after free")]
  UseAfterFree { addr: usize },

  #[error("invalid value {value:?} for {key}")]
  InvalidConfig { key: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, HeapError>;
