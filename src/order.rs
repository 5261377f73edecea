//! Ordering capability supplied to every heap at construction.

use core::cmp::Ordering;

/// Total order over `T`. The heap keeps the entry that compares `Less`
/// than every other entry at its root.
pub trait Compare<T: ?Sized> {
    fn compare(&self, a: &T, b: &T) -> Ordering;

    /// `true` if `a` must sit strictly closer to the root than `b`.
    #[inline]
    fn precedes(&self, a: &T, b: &T) -> bool {
        self.compare(a, b) == Ordering::Less
    }
}

/// Natural order of `T`: smallest at the root.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MinOrder;

/// Reversed natural order of `T`: largest at the root.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MaxOrder;

impl<T: Ord + ?Sized> Compare<T> for MinOrder {
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }
}

impl<T: Ord + ?Sized> Compare<T> for MaxOrder {
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        b.cmp(a)
    }
}

impl<T: ?Sized, F> Compare<T> for F
where
    F: Fn(&T, &T) -> Ordering,
{
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        self(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_and_max_are_mirrors() {
        assert!(MinOrder.precedes(&1, &2));
        assert!(!MinOrder.precedes(&2, &2));
        assert!(MaxOrder.precedes(&2, &1));
        assert!(!MaxOrder.precedes(&1, &1));
    }

    #[test]
    fn closures_are_comparators() {
        let by_len = |a: &&str, b: &&str| a.len().cmp(&b.len());
        assert!(by_len.precedes(&"ab", &"abc"));
        assert_eq!(by_len.compare(&"ab", &"cd"), Ordering::Equal);
    }
}
