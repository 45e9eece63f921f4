//! Size-class math for the segregated pool

/// Granularity of size classes and alignment of every pooled block
pub const ALIGN: usize = 8;

/// Largest request served from the pools; anything bigger goes to the
/// backing allocator
pub const MAX_BYTES: usize = 128;

/// Number of size classes (8, 16, ..., 128)
pub const NUM_CLASSES: usize = MAX_BYTES / ALIGN;

/// Rounds `n` up to the next multiple of [`ALIGN`]
///
/// ```
/// use nebula_alloc::pool::round_up;
///
/// assert_eq!(round_up(1), 8);
/// assert_eq!(round_up(24), 24);
/// assert_eq!(round_up(25), 32);
/// ```
#[inline(always)]
pub const fn round_up(n: usize) -> usize {
    crate::utils::align_up(n, ALIGN)
}

/// Index of one of the [`NUM_CLASSES`] free lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SizeClass(usize);

impl SizeClass {
    /// Class serving requests of `n` bytes, `None` above [`MAX_BYTES`]
    ///
    /// Zero-byte requests are served by the smallest class.
    #[inline]
    pub const fn for_size(n: usize) -> Option<Self> {
        if n > MAX_BYTES {
            return None;
        }
        if n == 0 {
            return Some(Self(0));
        }
        Some(Self(n.div_ceil(ALIGN) - 1))
    }

    /// Class whose blocks are exactly `size` bytes
    #[inline]
    pub const fn exact(size: usize) -> Option<Self> {
        if size == 0 || size > MAX_BYTES || !size.is_multiple_of(ALIGN) {
            return None;
        }
        Some(Self(size / ALIGN - 1))
    }

    /// Class by free-list index
    #[inline]
    pub const fn from_index(index: usize) -> Option<Self> {
        if index < NUM_CLASSES {
            Some(Self(index))
        } else {
            None
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }

    /// Block size served by this class
    #[inline]
    pub const fn size(self) -> usize {
        (self.0 + 1) * ALIGN
    }

    /// All classes, smallest first
    pub fn all() -> impl DoubleEndedIterator<Item = Self> + ExactSizeIterator {
        (0..NUM_CLASSES).map(Self)
    }
}

impl core::fmt::Display for SizeClass {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "class {} ({} bytes)", self.0, self.size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_boundaries() {
        assert_eq!(SizeClass::for_size(0).map(SizeClass::index), Some(0));
        assert_eq!(SizeClass::for_size(1).map(SizeClass::index), Some(0));
        assert_eq!(SizeClass::for_size(8).map(SizeClass::index), Some(0));
        assert_eq!(SizeClass::for_size(9).map(SizeClass::index), Some(1));
        assert_eq!(SizeClass::for_size(24).map(SizeClass::index), Some(2));
        assert_eq!(SizeClass::for_size(128).map(SizeClass::index), Some(15));
        assert_eq!(SizeClass::for_size(129), None);
    }

    #[test]
    fn test_every_size_fits_its_class() {
        for n in 1..=MAX_BYTES {
            let class = SizeClass::for_size(n).unwrap();
            assert!(class.size() >= n);
            assert!(class.size() - n < ALIGN);
            assert_eq!(class.size(), round_up(n));
        }
    }

    #[test]
    fn test_exact() {
        assert_eq!(SizeClass::exact(48).map(SizeClass::index), Some(5));
        assert_eq!(SizeClass::exact(12), None);
        assert_eq!(SizeClass::exact(0), None);
        assert_eq!(SizeClass::exact(136), None);
    }

    #[test]
    fn test_all_classes() {
        let sizes: Vec<usize> = SizeClass::all().map(SizeClass::size).collect();
        assert_eq!(sizes.len(), NUM_CLASSES);
        assert_eq!(sizes.first(), Some(&8));
        assert_eq!(sizes.last(), Some(&128));
        assert_eq!(SizeClass::from_index(NUM_CLASSES), None);
    }
}
