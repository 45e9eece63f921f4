//! Alignment and rounding helpers shared by both engines

/// Aligns a value up to the nearest multiple of alignment
///
/// # Examples
/// ```
/// use nebula_alloc::utils::align_up;
///
/// assert_eq!(align_up(7, 8), 8);
/// assert_eq!(align_up(8, 8), 8);
/// assert_eq!(align_up(9, 8), 16);
/// ```
#[inline(always)]
pub const fn align_up(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// Checked variant of [`align_up`], `None` on overflow
#[inline]
pub const fn checked_align_up(value: usize, alignment: usize) -> Option<usize> {
    debug_assert!(alignment.is_power_of_two());
    match value.checked_add(alignment - 1) {
        Some(v) => Some(v & !(alignment - 1)),
        None => None,
    }
}

/// Checks if a value is a power of two (zero is not)
#[inline(always)]
pub const fn is_power_of_two(value: usize) -> bool {
    value != 0 && (value & (value - 1)) == 0
}

/// Largest power of two that divides `size`, capped at `max`
///
/// This is the alignment a block of `size` bytes naturally has when blocks
/// are laid out back to back from a `max`-aligned base.
#[inline]
pub const fn natural_align(size: usize, max: usize) -> usize {
    if size == 0 {
        return max;
    }
    let lowest = size & size.wrapping_neg();
    if lowest < max { lowest } else { max }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 8), 0);
        assert_eq!(align_up(1, 8), 8);
        assert_eq!(align_up(17, 16), 32);
    }

    #[test]
    fn test_checked_align_up_overflow() {
        assert_eq!(checked_align_up(usize::MAX, 8), None);
        assert_eq!(checked_align_up(9, 8), Some(16));
    }

    #[test]
    fn test_is_power_of_two() {
        assert!(!is_power_of_two(0));
        assert!(is_power_of_two(1));
        assert!(is_power_of_two(64));
        assert!(!is_power_of_two(24));
    }

    #[test]
    fn test_natural_align() {
        assert_eq!(natural_align(24, 8), 8);
        assert_eq!(natural_align(12, 8), 4);
        assert_eq!(natural_align(48, 8), 8);
        assert_eq!(natural_align(6, 16), 2);
        assert_eq!(natural_align(0, 8), 8);
    }
}
