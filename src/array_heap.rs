//! ArrayHeap: root-only binary heap over a contiguous vector.
//!
//! The sift routines at the bottom of this file are shared with the
//! addressed heaps. They take a `placed` callback that is invoked with
//! every entry whose index changed, which is how `HandleHeap` and
//! `KeyedHeap` keep their position maps exact across swaps.

use crate::error::{Error, Result};
use crate::order::{Compare, MinOrder};
use crate::stamp::{Cursor, Stamp};

/// Binary heap ordered by `C`; the entry that precedes all others sits at
/// the root.
pub struct ArrayHeap<T, C = MinOrder> {
    entries: Vec<T>,
    cmp: C,
    stamp: Stamp,
}

impl<T: Ord> ArrayHeap<T> {
    pub fn new() -> Self {
        Self::with_comparator(MinOrder)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_comparator(capacity, MinOrder)
    }
}

impl<T: Ord> Default for ArrayHeap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C: Compare<T>> ArrayHeap<T, C> {
    pub fn with_comparator(cmp: C) -> Self {
        Self::with_capacity_and_comparator(0, cmp)
    }

    pub fn with_capacity_and_comparator(capacity: usize, cmp: C) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            cmp,
            stamp: Stamp::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn comparator(&self) -> &C {
        &self.cmp
    }

    pub fn add(&mut self, value: T) {
        self.stamp.bump();
        let _g = self.stamp.enter();
        self.entries.push(value);
        let last = self.entries.len() - 1;
        sift_up(
            &mut self.entries,
            last,
            |a: &T, b: &T| self.cmp.precedes(a, b),
            |_: &T, _| {},
        );
    }

    pub fn peek(&self) -> Result<&T> {
        self.entries.first().ok_or(Error::EmptyCollection)
    }

    pub fn pop(&mut self) -> Result<T> {
        let last = self.entries.pop().ok_or(Error::EmptyCollection)?;
        self.stamp.bump();
        if self.entries.is_empty() {
            return Ok(last);
        }
        let _g = self.stamp.enter();
        let top = core::mem::replace(&mut self.entries[0], last);
        sift_down(
            &mut self.entries,
            0,
            |a: &T, b: &T| self.cmp.precedes(a, b),
            |_: &T, _| {},
        );
        Ok(top)
    }

    /// Replace the root with `value` and return the previous root.
    ///
    /// Equivalent to `pop` followed by `add`, with a single sift.
    pub fn modify_top(&mut self, value: T) -> Result<T> {
        if self.entries.is_empty() {
            return Err(Error::EmptyCollection);
        }
        self.stamp.bump();
        let _g = self.stamp.enter();
        let top = core::mem::replace(&mut self.entries[0], value);
        sift_down(
            &mut self.entries,
            0,
            |a: &T, b: &T| self.cmp.precedes(a, b),
            |_: &T, _| {},
        );
        Ok(top)
    }

    pub fn clear(&mut self) {
        self.stamp.bump();
        self.entries.clear();
    }

    /// Entries in storage order (not sorted).
    pub fn iter(&self) -> core::slice::Iter<'_, T> {
        self.entries.iter()
    }

    /// Detached cursor over the entries in storage order.
    pub fn cursor(&self) -> Cursor {
        self.stamp
            .cursor(if self.entries.is_empty() { None } else { Some(0) })
    }

    /// Yield the next entry, or fail if the heap changed since `cursor` was made.
    pub fn advance(&self, cursor: &mut Cursor) -> Result<Option<&T>> {
        self.stamp.check(cursor)?;
        let Some(pos) = cursor.next else {
            return Ok(None);
        };
        cursor.next = if pos + 1 < self.entries.len() {
            Some(pos + 1)
        } else {
            None
        };
        Ok(self.entries.get(pos))
    }

    /// Drain the heap in pop order.
    pub fn into_sorted_vec(mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.entries.len());
        while let Ok(v) = self.pop() {
            out.push(v);
        }
        out
    }
}

impl<T, C: Compare<T>> Extend<T> for ArrayHeap<T, C> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for v in iter {
            self.add(v);
        }
    }
}

// ---- shared sift routines ----

/// Direction in which an entry may have to move after being written.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Sift {
    /// Newly appended at the bottom.
    Up,
    /// Root replaced.
    Down,
    /// Arbitrary position overwritten; try both.
    Either,
}

/// Move the entry at `pos` toward the root while it precedes its parent.
/// Returns its final index.
pub(crate) fn sift_up<E, P, F>(entries: &mut [E], mut pos: usize, precedes: P, mut placed: F) -> usize
where
    P: Fn(&E, &E) -> bool,
    F: FnMut(&E, usize),
{
    while pos > 0 {
        let parent = (pos - 1) / 2;
        if !precedes(&entries[pos], &entries[parent]) {
            break;
        }
        entries.swap(pos, parent);
        placed(&entries[pos], pos);
        pos = parent;
    }
    placed(&entries[pos], pos);
    pos
}

/// Move the entry at `pos` toward the leaves while a child precedes it,
/// always swapping with the more extreme child. Returns its final index.
pub(crate) fn sift_down<E, P, F>(entries: &mut [E], mut pos: usize, precedes: P, mut placed: F) -> usize
where
    P: Fn(&E, &E) -> bool,
    F: FnMut(&E, usize),
{
    let len = entries.len();
    loop {
        let left = 2 * pos + 1;
        if left >= len {
            break;
        }
        let right = left + 1;
        let child = if right < len && precedes(&entries[right], &entries[left]) {
            right
        } else {
            left
        };
        if !precedes(&entries[child], &entries[pos]) {
            break;
        }
        entries.swap(pos, child);
        placed(&entries[pos], pos);
        pos = child;
    }
    placed(&entries[pos], pos);
    pos
}

/// Restore heap order around `pos` after its entry was replaced by an
/// arbitrary one: it may need to move either up or down.
pub(crate) fn restore<E, P, F>(entries: &mut [E], pos: usize, precedes: P, placed: F) -> usize
where
    P: Fn(&E, &E) -> bool,
    F: FnMut(&E, usize),
{
    if pos > 0 && precedes(&entries[pos], &entries[(pos - 1) / 2]) {
        sift_up(entries, pos, precedes, placed)
    } else {
        sift_down(entries, pos, precedes, placed)
    }
}

pub(crate) fn resift<E, P, F>(entries: &mut [E], pos: usize, how: Sift, precedes: P, placed: F) -> usize
where
    P: Fn(&E, &E) -> bool,
    F: FnMut(&E, usize),
{
    match how {
        Sift::Up => sift_up(entries, pos, precedes, placed),
        Sift::Down => sift_down(entries, pos, precedes, placed),
        Sift::Either => restore(entries, pos, precedes, placed),
    }
}

#[cfg(test)]
pub(crate) fn is_heap<E>(entries: &[E], precedes: impl Fn(&E, &E) -> bool) -> bool {
    (1..entries.len()).all(|i| !precedes(&entries[i], &entries[(i - 1) / 2]))
}
