//! HandleHeap: binary heap whose entries can be removed or re-prioritised
//! in O(log n) through the `Handle` returned by `add`.
//!
//! Entries live in a vector in heap order. Each entry carries its handle,
//! and the handle allocator's payload is the entry's current index; every
//! sift reports moves through the `placed` callback so that
//! `positions[entry.handle] == index` holds between operations.
//!
//! The optional attachment `A` travels with its value through every swap
//! but never takes part in ordering.

use crate::array_heap::{resift, Sift};
use crate::error::{Error, Result};
use crate::handle_alloc::{Handle, HandleAllocator};
use crate::order::{Compare, MinOrder};
use crate::stamp::{Cursor, Stamp};

#[derive(Debug, Clone)]
struct Entry<T, A> {
    value: T,
    attachment: A,
    handle: Handle,
}

pub struct HandleHeap<T, A = (), C = MinOrder> {
    entries: Vec<Entry<T, A>>,
    positions: HandleAllocator<usize>,
    cmp: C,
    stamp: Stamp,
}

impl<T: Ord, A> HandleHeap<T, A> {
    pub fn new() -> Self {
        Self::with_comparator(MinOrder)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_comparator(capacity, MinOrder)
    }
}

impl<T: Ord, A> Default for HandleHeap<T, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C: Compare<T>> HandleHeap<T, (), C> {
    /// Insert `value` and return the handle addressing it.
    pub fn add(&mut self, value: T) -> Handle {
        self.add_attached(value, ())
    }
}

impl<T, A, C: Compare<T>> HandleHeap<T, A, C> {
    pub fn with_comparator(cmp: C) -> Self {
        Self::with_capacity_and_comparator(0, cmp)
    }

    pub fn with_capacity_and_comparator(capacity: usize, cmp: C) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            positions: HandleAllocator::with_capacity(capacity),
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

    fn sift(&mut self, pos: usize, how: Sift) -> usize {
        let Self {
            entries,
            positions,
            cmp,
            stamp,
        } = self;
        let _g = stamp.enter();
        resift(
            entries,
            pos,
            how,
            |a: &Entry<T, A>, b: &Entry<T, A>| cmp.precedes(&a.value, &b.value),
            |e: &Entry<T, A>, i| {
                if let Some(p) = positions.get_mut(e.handle) {
                    *p = i;
                }
            },
        )
    }

    fn position(&self, handle: Handle) -> Result<usize> {
        self.positions
            .get(handle)
            .copied()
            .ok_or(Error::InvalidHandle)
    }

    /// Insert `value` with its `attachment`.
    pub fn add_attached(&mut self, value: T, attachment: A) -> Handle {
        self.stamp.bump();
        let pos = self.entries.len();
        let handle = self.positions.allocate(pos);
        self.entries.push(Entry {
            value,
            attachment,
            handle,
        });
        self.sift(pos, Sift::Up);
        handle
    }

    /// Remove the entry addressed by `handle`; the handle is released.
    pub fn remove(&mut self, handle: Handle) -> Result<(T, A)> {
        let pos = self.position(handle)?;
        self.positions.release(handle)?;
        self.stamp.bump();
        let removed = self.entries.swap_remove(pos);
        if pos < self.entries.len() {
            self.sift(pos, Sift::Either);
        }
        Ok((removed.value, removed.attachment))
    }

    /// Replace the value of `handle`'s entry and return the old one. The
    /// attachment is kept.
    pub fn modify(&mut self, handle: Handle, value: T) -> Result<T> {
        let pos = self.position(handle)?;
        self.stamp.bump();
        let old = core::mem::replace(&mut self.entries[pos].value, value);
        self.sift(pos, Sift::Either);
        Ok(old)
    }

    pub fn modify_attached(&mut self, handle: Handle, value: T, attachment: A) -> Result<(T, A)> {
        let pos = self.position(handle)?;
        self.stamp.bump();
        let e = &mut self.entries[pos];
        let old = (
            core::mem::replace(&mut e.value, value),
            core::mem::replace(&mut e.attachment, attachment),
        );
        self.sift(pos, Sift::Either);
        Ok(old)
    }

    pub fn try_get_value(&self, handle: Handle) -> Option<&T> {
        let pos = self.position(handle).ok()?;
        self.entries.get(pos).map(|e| &e.value)
    }

    pub fn try_get_attachment(&self, handle: Handle) -> Option<&A> {
        let pos = self.position(handle).ok()?;
        self.entries.get(pos).map(|e| &e.attachment)
    }

    /// Attachments do not affect ordering and may be edited in place.
    pub fn attachment_mut(&mut self, handle: Handle) -> Option<&mut A> {
        let pos = self.position(handle).ok()?;
        self.entries.get_mut(pos).map(|e| &mut e.attachment)
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.positions.contains(handle)
    }

    fn top(&self) -> Result<&Entry<T, A>> {
        self.entries.first().ok_or(Error::EmptyCollection)
    }

    pub fn peek(&self) -> Result<&T> {
        self.peek_value()
    }

    pub fn peek_value(&self) -> Result<&T> {
        self.top().map(|e| &e.value)
    }

    pub fn peek_handle(&self) -> Result<Handle> {
        self.top().map(|e| e.handle)
    }

    pub fn peek_attachment(&self) -> Result<&A> {
        self.top().map(|e| &e.attachment)
    }

    pub fn pop(&mut self) -> Result<(T, A)> {
        self.pop_entry().map(|(_, v, a)| (v, a))
    }

    /// Like `pop`, also returning the handle the entry had. The handle is
    /// already released and may be reissued by the next `add`.
    pub fn pop_entry(&mut self) -> Result<(Handle, T, A)> {
        if self.entries.is_empty() {
            return Err(Error::EmptyCollection);
        }
        self.stamp.bump();
        let top = self.entries.swap_remove(0);
        self.positions.release(top.handle)?;
        if !self.entries.is_empty() {
            self.sift(0, Sift::Down);
        }
        Ok((top.handle, top.value, top.attachment))
    }

    /// Replace the root's value, keeping its attachment and handle.
    pub fn modify_top(&mut self, value: T) -> Result<T> {
        if self.entries.is_empty() {
            return Err(Error::EmptyCollection);
        }
        self.stamp.bump();
        let old = core::mem::replace(&mut self.entries[0].value, value);
        self.sift(0, Sift::Down);
        Ok(old)
    }

    pub fn modify_top_attached(&mut self, value: T, attachment: A) -> Result<(T, A)> {
        if self.entries.is_empty() {
            return Err(Error::EmptyCollection);
        }
        self.stamp.bump();
        let e = &mut self.entries[0];
        let old = (
            core::mem::replace(&mut e.value, value),
            core::mem::replace(&mut e.attachment, attachment),
        );
        self.sift(0, Sift::Down);
        Ok(old)
    }

    /// Drop every entry and release every handle.
    pub fn clear(&mut self) {
        self.stamp.bump();
        self.entries.clear();
        self.positions.clear();
    }

    /// Entries in storage order (not sorted).
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T, &A)> {
        self.entries
            .iter()
            .map(|e| (e.handle, &e.value, &e.attachment))
    }

    pub fn cursor(&self) -> Cursor {
        self.stamp
            .cursor(if self.entries.is_empty() { None } else { Some(0) })
    }

    pub fn advance(&self, cursor: &mut Cursor) -> Result<Option<(Handle, &T, &A)>> {
        self.stamp.check(cursor)?;
        let Some(pos) = cursor.next else {
            return Ok(None);
        };
        cursor.next = if pos + 1 < self.entries.len() {
            Some(pos + 1)
        } else {
            None
        };
        Ok(self
            .entries
            .get(pos)
            .map(|e| (e.handle, &e.value, &e.attachment)))
    }

    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        use crate::array_heap::is_heap;
        assert!(is_heap(&self.entries, |a, b| self
            .cmp
            .precedes(&a.value, &b.value)));
        assert_eq!(self.positions.len(), self.entries.len());
        for (i, e) in self.entries.iter().enumerate() {
            assert_eq!(self.positions.get(e.handle), Some(&i));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::MaxOrder;

    #[test]
    fn empty_heap_errors() {
        let mut h: HandleHeap<i32> = HandleHeap::new();
        assert_eq!(h.peek(), Err(Error::EmptyCollection));
        assert_eq!(h.peek_handle(), Err(Error::EmptyCollection));
        assert_eq!(h.pop(), Err(Error::EmptyCollection));
        assert_eq!(h.modify_top(1), Err(Error::EmptyCollection));
        assert_eq!(h.pop_entry(), Err(Error::EmptyCollection));
    }

    /// Invariant: handles keep addressing their entry across unrelated removals.
    #[test]
    fn handles_survive_unrelated_removals() {
        let mut h: HandleHeap<i32> = HandleHeap::new();
        let hs: Vec<_> = (0..20).map(|v| h.add(v * 10)).collect();
        for (i, &hd) in hs.iter().enumerate() {
            if i % 3 == 0 {
                assert_eq!(h.remove(hd), Ok(((i * 10) as i32, ())));
            }
        }
        for (i, &hd) in hs.iter().enumerate() {
            if i % 3 != 0 {
                assert_eq!(h.try_get_value(hd), Some(&((i * 10) as i32)));
            } else {
                assert!(!h.contains(hd));
            }
        }
        h.check_invariants();
    }

    #[test]
    fn modify_moves_both_directions() {
        let mut h: HandleHeap<i32> = HandleHeap::new();
        let a = h.add(5);
        let b = h.add(10);
        let c = h.add(15);
        assert_eq!(h.modify(c, 1), Ok(15));
        assert_eq!(h.peek_handle(), Ok(c));
        assert_eq!(h.modify(c, 100), Ok(1));
        assert_eq!(h.peek_handle(), Ok(a));
        assert_eq!(h.modify(a, 50), Ok(5));
        assert_eq!(h.peek_handle(), Ok(b));
        h.check_invariants();
    }

    #[test]
    fn stale_handle_is_rejected() {
        let mut h: HandleHeap<i32> = HandleHeap::new();
        let a = h.add(1);
        h.add(2);
        assert_eq!(h.remove(a), Ok((1, ())));
        assert_eq!(h.remove(a), Err(Error::InvalidHandle));
        assert_eq!(h.modify(a, 3), Err(Error::InvalidHandle));
        assert_eq!(h.try_get_value(a), None);
        assert_eq!(h.len(), 1);
    }

    /// Invariant: the popped handle is released and becomes the next one issued.
    #[test]
    fn pop_entry_releases_handle() {
        let mut h: HandleHeap<i32> = HandleHeap::new();
        let a = h.add(1);
        h.add(2);
        let (ha, v, ()) = h.pop_entry().unwrap();
        assert_eq!((ha, v), (a, 1));
        assert!(!h.contains(a));
        assert_eq!(h.add(0), a);
    }

    /// Invariant: attachments travel with their value through every reordering.
    #[test]
    fn attachments_follow_their_values() {
        let mut h: HandleHeap<i32, String> = HandleHeap::new();
        let hs: Vec<_> = [7, 3, 9, 1, 5]
            .into_iter()
            .map(|v| h.add_attached(v, format!("v{v}")))
            .collect();
        assert_eq!(h.peek_attachment().map(String::as_str), Ok("v1"));
        assert_eq!(h.modify(hs[2], 0), Ok(9));
        assert_eq!(h.peek_attachment().map(String::as_str), Ok("v9"));
        assert_eq!(h.try_get_attachment(hs[0]).map(String::as_str), Some("v7"));
        if let Some(a) = h.attachment_mut(hs[0]) {
            a.push('!');
        }
        let mut drained = Vec::new();
        while let Ok((v, a)) = h.pop() {
            drained.push((v, a));
        }
        let got: Vec<_> = drained.iter().map(|(v, a)| (*v, a.as_str())).collect();
        assert_eq!(
            got,
            vec![(0, "v9"), (1, "v1"), (3, "v3"), (5, "v5"), (7, "v7!")]
        );
    }

    #[test]
    fn modify_top_keeps_or_replaces_attachment() {
        let mut h: HandleHeap<i32, &str> = HandleHeap::new();
        let root = h.add_attached(1, "one");
        h.add_attached(2, "two");
        assert_eq!(h.modify_top(3), Ok(1));
        assert_eq!(h.peek_attachment(), Ok(&"two"));
        assert_eq!(h.try_get_attachment(root), Some(&"one"));
        assert_eq!(h.modify_top_attached(0, "zero"), Ok((2, "two")));
        assert_eq!(h.peek(), Ok(&0));
        assert_eq!(h.peek_attachment(), Ok(&"zero"));
        assert_eq!(
            h.modify_attached(root, -1, "minus"),
            Ok((3, "one"))
        );
        assert_eq!(h.peek_handle(), Ok(root));
        h.check_invariants();
    }

    #[test]
    fn max_order_heap() {
        let mut h: HandleHeap<i32, (), MaxOrder> = HandleHeap::with_comparator(MaxOrder);
        for v in [3, 8, 1, 9, 4] {
            h.add(v);
        }
        assert_eq!(h.pop(), Ok((9, ())));
        assert_eq!(h.peek(), Ok(&8));
    }

    #[test]
    fn clear_releases_all_handles() {
        let mut h: HandleHeap<i32> = HandleHeap::new();
        let a = h.add(1);
        h.add(2);
        h.clear();
        assert!(h.is_empty());
        assert!(!h.contains(a));
        assert_eq!(h.add(7).index(), 0);
    }

    /// Invariant: each structural mutation stales the cursor; reads do not.
    #[test]
    fn cursor_detects_mutation() {
        let mut h: HandleHeap<i32> = HandleHeap::new();
        let a = h.add(1);
        h.add(2);
        let mut c = h.cursor();
        assert!(h.advance(&mut c).unwrap().is_some());
        let _ = h.try_get_value(a);
        assert!(h.advance(&mut c).unwrap().is_some());
        assert_eq!(h.advance(&mut c), Ok(None));

        let mut c = h.cursor();
        h.modify(a, 0).unwrap();
        assert_eq!(h.advance(&mut c), Err(Error::CollectionModified));

        let mut c = h.cursor();
        h.remove(a).unwrap();
        assert_eq!(h.advance(&mut c), Err(Error::CollectionModified));
    }
}
