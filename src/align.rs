/// Alignment unit for every block header and payload: one x86_64 cache line.
pub const ALIGNMENT: usize = 64;

/// Rounds the given size up to the cache line alignment unit.
///
/// # Examples
///
/// ```rust
/// use rheap::align;
///
/// assert_eq!(align!(0), 0);
/// assert_eq!(align!(1), 64);
/// assert_eq!(align!(333), 384);
/// assert_eq!(align!(555), 576);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + $crate::align::ALIGNMENT - 1) & !($crate::align::ALIGNMENT - 1)
  };
}

/// Checked variant of [`align!`] for sizes coming from callers.
///
/// Returns `None` when rounding up would overflow `usize`.
pub fn align_up(value: usize) -> Option<usize> {
  value
    .checked_add(ALIGNMENT - 1)
    .map(|value| value & !(ALIGNMENT - 1))
}

pub fn is_aligned(value: usize) -> bool {
  value & (ALIGNMENT - 1) == 0
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_align() {
    let mut alignments = Vec::new();

    for i in 0..10 {
      let sizes = (ALIGNMENT * i + 1)..=(ALIGNMENT * (i + 1));

      let expected_alignment = ALIGNMENT * (i + 1);

      alignments.push((sizes, expected_alignment));
    }

    for (sizes, expected) in alignments {
      for size in sizes {
        assert_eq!(expected, align!(size));
        assert_eq!(Some(expected), align_up(size));
      }
    }
  }

  #[test]
  fn test_align_up_overflow() {
    assert_eq!(align_up(usize::MAX), None);
    assert_eq!(align_up(usize::MAX - ALIGNMENT + 2), None);
    assert_eq!(align_up(0), Some(0));
  }

  #[test]
  fn test_is_aligned() {
    assert!(is_aligned(0));
    assert!(is_aligned(128));
    assert!(!is_aligned(65));
  }
}
