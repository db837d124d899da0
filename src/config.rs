use crate::{
  block::HEADER_SIZE,
  error::{HeapError, Result},
};

/// How free blocks get merged after a free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoalesceMode {
  /// Walk the entire chain and merge every run of adjacent free blocks.
  FullChain,
  /// Merge the freed block with its free neighbours only.
  ///
  /// Produces the same chain as [`CoalesceMode::FullChain`] because no two
  /// adjacent blocks are ever left free.
  Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
  /// Minimum leftover, in header sizes, worth splitting off into its own free block.
  pub split_threshold: usize,
  pub coalesce: CoalesceMode,
  /// Give a free tail block back to the operating system instead of keeping it in the chain.
  pub release_tail: bool,
}

impl HeapConfig {
  pub const DEFAULT: Self = Self {
    split_threshold: 4,
    coalesce: CoalesceMode::FullChain,
    release_tail: false,
  };

  /// Reads `RHEAP_SPLIT_THRESHOLD`, `RHEAP_COALESCE` and `RHEAP_RELEASE_TAIL`
  /// from the process environment.
  pub fn from_env() -> Result<Self> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  /// Same as [`HeapConfig::from_env`] with a custom variable lookup.
  pub fn from_lookup<F>(lookup: F) -> Result<Self>
  where
    F: Fn(&str) -> Option<String>,
  {
    let mut config = Self::DEFAULT;

    if let Some(value) = lookup("RHEAP_SPLIT_THRESHOLD") {
      config.split_threshold = match value.trim().parse::<usize>() {
        // Thresholds are measured in headers and must fit in bytes.
        Ok(threshold) if threshold > 0 && threshold.checked_mul(HEADER_SIZE).is_some() => {
          threshold
        }
        _ => return Err(invalid("RHEAP_SPLIT_THRESHOLD", value)),
      };
    }

    if let Some(value) = lookup("RHEAP_COALESCE") {
      config.coalesce = match value.trim() {
        "full" => CoalesceMode::FullChain,
        "local" => CoalesceMode::Local,
        _ => return Err(invalid("RHEAP_COALESCE", value)),
      };
    }

    if let Some(value) = lookup("RHEAP_RELEASE_TAIL") {
      config.release_tail = match value.trim() {
        "1" | "true" => true,
        "0" | "false" => false,
        _ => return Err(invalid("RHEAP_RELEASE_TAIL", value)),
      };
    }

    Ok(config)
  }
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self::DEFAULT
  }
}

fn invalid(
  key: &'static str,
  value: String,
) -> HeapError {
  HeapError::InvalidConfig { key, value }
}
