//! KeyedHeap: binary heap addressed by a hashable key.
//!
//! Design
//! - `index` is an `OpenHashMap<K, usize>` from key to the entry's current
//!   heap position (`usize::MAX` while a reservation is being filled).
//! - Each heap entry stores the `SlotId` of its key in `index`, so a sift
//!   updates positions through `value_at_mut` without re-hashing.
//! - Removals only tombstone index slots and never move other keys. A
//!   reservation may rebuild the index; when its epoch changes, every
//!   entry's slot id is refreshed from the index's raw traversal.

use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};

use hashbrown::hash_map::DefaultHashBuilder;

use crate::array_heap::{resift, Sift};
use crate::error::{Error, Result};
use crate::open_hash_map::{Located, MapConfig, OpenHashMap, SlotId};
use crate::order::{Compare, MinOrder};
use crate::stamp::{Cursor, Stamp};

const UNPLACED: usize = usize::MAX;

#[derive(Debug, Clone)]
struct Entry<T, A> {
    value: T,
    attachment: A,
    slot: SlotId,
}

pub struct KeyedHeap<K, T, A = (), C = MinOrder, S = DefaultHashBuilder> {
    entries: Vec<Entry<T, A>>,
    index: OpenHashMap<K, usize, S>,
    cmp: C,
    stamp: Stamp,
}

impl<K: Eq + Hash, T: Ord, A> KeyedHeap<K, T, A> {
    pub fn new() -> Self {
        Self::with_comparator(MinOrder)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_comparator(capacity, MinOrder)
    }
}

impl<K: Eq + Hash, T: Ord, A> Default for KeyedHeap<K, T, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash, T, A, C: Compare<T>> KeyedHeap<K, T, A, C> {
    pub fn with_comparator(cmp: C) -> Self {
        Self::with_capacity_and_comparator(0, cmp)
    }

    pub fn with_capacity_and_comparator(capacity: usize, cmp: C) -> Self {
        Self::with_config(cmp, MapConfig::default().with_capacity(capacity), Default::default())
    }
}

impl<K, T, C, S> KeyedHeap<K, T, (), C, S>
where
    K: Eq + Hash,
    C: Compare<T>,
    S: BuildHasher,
{
    /// Insert `value` under `key`. Fails with `DuplicateKey`, leaving the
    /// heap untouched, if `key` is already present.
    pub fn add(&mut self, value: T, key: K) -> Result<()> {
        self.add_attached(value, key, ())
    }

    /// Insert, or replace the value of an existing `key` and return the
    /// previous one.
    pub fn upsert(&mut self, key: K, value: T) -> Option<T> {
        self.upsert_attached(key, value, ()).map(|(v, ())| v)
    }
}

impl<K, T, A, C, S> KeyedHeap<K, T, A, C, S>
where
    K: Eq + Hash,
    C: Compare<T>,
    S: BuildHasher,
{
    /// Heap ordered by `cmp` whose key index is built from `config` and
    /// hashes with `hasher`.
    pub fn with_config(cmp: C, config: MapConfig, hasher: S) -> Self {
        Self {
            entries: Vec::with_capacity(config.capacity),
            index: OpenHashMap::with_config(UNPLACED, config, hasher),
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
            index,
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
                if let Some(p) = index.value_at_mut(e.slot) {
                    *p = i;
                }
            },
        )
    }

    fn slot_of<Q>(&self, q: &Q) -> Option<SlotId>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.stamp.enter();
        self.index.locate(q)
    }

    fn position_of<Q>(&self, q: &Q) -> Result<(SlotId, usize)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let slot = self.slot_of(q).ok_or(Error::InvalidHandle)?;
        match self.index.value_at(slot) {
            Some(&pos) if pos < self.entries.len() => Ok((slot, pos)),
            _ => Err(Error::InvalidHandle),
        }
    }

    /// Find or reserve `key` in the index, re-pointing every entry at its
    /// slot if the index was rebuilt meanwhile.
    fn reserve(&mut self, key: K) -> Located {
        let epoch = self.index.epoch();
        let located = {
            let _g = self.stamp.enter();
            self.index.locate_or_reserve(key)
        };
        if self.index.epoch() != epoch {
            let Self { entries, index, .. } = self;
            for (slot, _, &pos) in index.raw_iter() {
                if let Some(e) = entries.get_mut(pos) {
                    e.slot = slot;
                }
            }
        }
        located
    }

    fn push_reserved(&mut self, slot: SlotId, value: T, attachment: A) {
        self.stamp.bump();
        let pos = self.entries.len();
        self.entries.push(Entry {
            value,
            attachment,
            slot,
        });
        self.sift(pos, Sift::Up);
    }

    /// Insert `value` with `attachment` under `key`; `DuplicateKey` if the
    /// key is already present.
    pub fn add_attached(&mut self, value: T, key: K, attachment: A) -> Result<()> {
        match self.reserve(key) {
            Located::Existing(_) => Err(Error::DuplicateKey),
            Located::Reserved(slot) => {
                self.push_reserved(slot, value, attachment);
                Ok(())
            }
        }
    }

    pub fn upsert_attached(&mut self, key: K, value: T, attachment: A) -> Option<(T, A)> {
        match self.reserve(key) {
            Located::Reserved(slot) => {
                self.push_reserved(slot, value, attachment);
                None
            }
            Located::Existing(slot) => {
                let pos = *self.index.value_at(slot)?;
                self.stamp.bump();
                let e = self.entries.get_mut(pos)?;
                let old = (
                    core::mem::replace(&mut e.value, value),
                    core::mem::replace(&mut e.attachment, attachment),
                );
                self.sift(pos, Sift::Either);
                Some(old)
            }
        }
    }

    /// Remove the entry stored under `q`.
    pub fn remove<Q>(&mut self, q: &Q) -> Result<(T, A)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (slot, pos) = self.position_of(q)?;
        self.index.remove_at(slot)?;
        self.stamp.bump();
        let removed = self.entries.swap_remove(pos);
        if pos < self.entries.len() {
            self.sift(pos, Sift::Either);
        }
        Ok((removed.value, removed.attachment))
    }

    /// Replace the value under `q`, keeping its attachment.
    pub fn modify<Q>(&mut self, q: &Q, value: T) -> Result<T>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (_, pos) = self.position_of(q)?;
        self.stamp.bump();
        let old = core::mem::replace(&mut self.entries[pos].value, value);
        self.sift(pos, Sift::Either);
        Ok(old)
    }

    pub fn modify_attached<Q>(&mut self, q: &Q, value: T, attachment: A) -> Result<(T, A)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (_, pos) = self.position_of(q)?;
        self.stamp.bump();
        let e = &mut self.entries[pos];
        let old = (
            core::mem::replace(&mut e.value, value),
            core::mem::replace(&mut e.attachment, attachment),
        );
        self.sift(pos, Sift::Either);
        Ok(old)
    }

    pub fn try_get_value<Q>(&self, q: &Q) -> Option<&T>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (_, pos) = self.position_of(q).ok()?;
        self.entries.get(pos).map(|e| &e.value)
    }

    pub fn try_get_attachment<Q>(&self, q: &Q) -> Option<&A>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (_, pos) = self.position_of(q).ok()?;
        self.entries.get(pos).map(|e| &e.attachment)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.slot_of(q).is_some()
    }

    fn top(&self) -> Result<&Entry<T, A>> {
        self.entries.first().ok_or(Error::EmptyCollection)
    }

    pub fn peek_key(&self) -> Result<&K> {
        let top = self.top()?;
        self.index.key_at(top.slot).ok_or(Error::InvalidHandle)
    }

    pub fn peek_value(&self) -> Result<&T> {
        self.top().map(|e| &e.value)
    }

    pub fn peek_attachment(&self) -> Result<&A> {
        self.top().map(|e| &e.attachment)
    }

    /// Remove the root, returning its key, value and attachment.
    pub fn pop(&mut self) -> Result<(K, T, A)> {
        if self.entries.is_empty() {
            return Err(Error::EmptyCollection);
        }
        self.stamp.bump();
        let top = self.entries.swap_remove(0);
        let (key, _) = self.index.remove_at(top.slot)?;
        if !self.entries.is_empty() {
            self.sift(0, Sift::Down);
        }
        Ok((key, top.value, top.attachment))
    }

    /// Replace the root's value, keeping its key and attachment.
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

    pub fn clear(&mut self) {
        self.stamp.bump();
        self.entries.clear();
        self.index.clear();
    }

    /// Entries in storage order (not sorted).
    pub fn iter(&self) -> impl Iterator<Item = (&K, &T, &A)> {
        self.entries.iter().filter_map(move |e| {
            self.index
                .key_at(e.slot)
                .map(|k| (k, &e.value, &e.attachment))
        })
    }

    pub fn cursor(&self) -> Cursor {
        self.stamp
            .cursor(if self.entries.is_empty() { None } else { Some(0) })
    }

    pub fn advance(&self, cursor: &mut Cursor) -> Result<Option<(&K, &T, &A)>> {
        self.stamp.check(cursor)?;
        let Some(pos) = cursor.next else {
            return Ok(None);
        };
        cursor.next = if pos + 1 < self.entries.len() {
            Some(pos + 1)
        } else {
            None
        };
        let Some(e) = self.entries.get(pos) else {
            return Ok(None);
        };
        let key = self.index.key_at(e.slot).ok_or(Error::CollectionModified)?;
        Ok(Some((key, &e.value, &e.attachment)))
    }

    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        use crate::array_heap::is_heap;
        assert!(is_heap(&self.entries, |a, b| self
            .cmp
            .precedes(&a.value, &b.value)));
        assert_eq!(self.index.len(), self.entries.len());
        for (i, e) in self.entries.iter().enumerate() {
            assert_eq!(self.index.value_at(e.slot), Some(&i));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::MaxOrder;

    #[test]
    fn empty_heap_errors() {
        let mut h: KeyedHeap<String, i32> = KeyedHeap::new();
        assert_eq!(h.peek_key(), Err(Error::EmptyCollection));
        assert_eq!(h.peek_value(), Err(Error::EmptyCollection));
        assert_eq!(h.pop(), Err(Error::EmptyCollection));
        assert_eq!(h.modify_top(1), Err(Error::EmptyCollection));
        assert_eq!(h.remove("x"), Err(Error::InvalidHandle));
    }

    /// Invariant: a duplicate add fails and changes nothing.
    #[test]
    fn duplicate_add_is_rejected() {
        let mut h: KeyedHeap<&str, i32> = KeyedHeap::new();
        assert_eq!(h.add(5, "a"), Ok(()));
        let mut c = h.cursor();
        assert_eq!(h.add(1, "a"), Err(Error::DuplicateKey));
        assert_eq!(h.try_get_value("a"), Some(&5));
        assert_eq!(h.len(), 1);
        assert!(h.advance(&mut c).unwrap().is_some());
    }

    #[test]
    fn upsert_inserts_then_modifies() {
        let mut h: KeyedHeap<&str, i32> = KeyedHeap::new();
        assert_eq!(h.upsert("a", 5), None);
        assert_eq!(h.upsert("b", 7), None);
        assert_eq!(h.upsert("b", 1), Some(7));
        assert_eq!(h.peek_key(), Ok(&"b"));
        assert_eq!(h.len(), 2);
        h.check_invariants();
    }

    #[test]
    fn modify_by_key_reorders() {
        let mut h: KeyedHeap<String, i32> = KeyedHeap::new();
        for (k, v) in [("x", 3), ("y", 1), ("z", 2)] {
            h.add(v, k.to_string()).unwrap();
        }
        assert_eq!(h.peek_key().map(String::as_str), Ok("y"));
        assert_eq!(h.modify("y", 10), Ok(1));
        assert_eq!(h.peek_key().map(String::as_str), Ok("z"));
        assert_eq!(h.modify("x", 0), Ok(3));
        assert_eq!(h.peek_key().map(String::as_str), Ok("x"));
        assert_eq!(h.modify("w", 0), Err(Error::InvalidHandle));
        h.check_invariants();
    }

    #[test]
    fn pop_returns_key_value_attachment() {
        let mut h: KeyedHeap<u32, i32, char> = KeyedHeap::new();
        h.add_attached(2, 20, 'b').unwrap();
        h.add_attached(1, 10, 'a').unwrap();
        assert_eq!(h.peek_attachment(), Ok(&'a'));
        assert_eq!(h.pop(), Ok((10, 1, 'a')));
        assert!(!h.contains_key(&10));
        assert_eq!(h.pop(), Ok((20, 2, 'b')));
        assert!(h.is_empty());
    }

    #[test]
    fn attachments_follow_their_values() {
        let mut h: KeyedHeap<&str, i32, &str> = KeyedHeap::new();
        h.add_attached(1, "k1", "a1").unwrap();
        h.add_attached(2, "k2", "a2").unwrap();
        assert_eq!(h.modify_top(3), Ok(1));
        assert_eq!(h.peek_attachment(), Ok(&"a2"));
        assert_eq!(h.try_get_attachment("k1"), Some(&"a1"));
        assert_eq!(h.modify_top_attached(5, "b2"), Ok((2, "a2")));
        assert_eq!(h.peek_key(), Ok(&"k1"));
        assert_eq!(h.modify_attached("k2", 0, "c2"), Ok((5, "b2")));
        assert_eq!(h.upsert_attached("k1", -1, "d1"), Some((3, "a1")));
        assert_eq!(h.peek_attachment(), Ok(&"d1"));
        assert_eq!(h.remove("k2"), Ok((0, "c2")));
        h.check_invariants();
    }

    /// Invariant: index rebuilds keep every entry reachable by key and position.
    #[test]
    fn survives_index_rebuilds() {
        let mut h: KeyedHeap<u32, u32, (), MaxOrder> = KeyedHeap::with_comparator(MaxOrder);
        for k in 0..500 {
            h.add(k, k).unwrap();
            if k % 4 == 3 {
                h.remove(&(k - 2)).unwrap();
            }
        }
        h.check_invariants();
        for k in 0..500 {
            let present = k % 4 != 1;
            assert_eq!(h.contains_key(&k), present, "key {k}");
            if present {
                assert_eq!(h.try_get_value(&k), Some(&k));
            }
        }
        assert_eq!(h.pop().map(|(k, _, _)| k), Ok(499));
    }

    #[test]
    fn clear_empties_index() {
        let mut h: KeyedHeap<u32, u32> = KeyedHeap::new();
        h.add(1, 1).unwrap();
        h.clear();
        assert!(h.is_empty());
        assert!(!h.contains_key(&1));
        assert_eq!(h.add(1, 1), Ok(()));
    }

    #[test]
    fn iter_yields_every_key() {
        let mut h: KeyedHeap<u32, u32> = KeyedHeap::new();
        for k in 0..10 {
            h.add(10 - k, k).unwrap();
        }
        let mut keys: Vec<u32> = h.iter().map(|(k, _, _)| *k).collect();
        keys.sort_unstable();
        assert_eq!(keys, (0..10).collect::<Vec<_>>());
        for (k, v, _) in h.iter() {
            assert_eq!(*v, 10 - *k);
        }
    }

    #[test]
    fn cursor_detects_mutation() {
        let mut h: KeyedHeap<u32, u32> = KeyedHeap::new();
        h.add(1, 1).unwrap();
        h.add(2, 2).unwrap();
        let mut c = h.cursor();
        assert!(h.advance(&mut c).unwrap().is_some());
        h.upsert(1, 5);
        assert_eq!(h.advance(&mut c), Err(Error::CollectionModified));

        let mut c = h.cursor();
        h.pop().unwrap();
        assert_eq!(h.advance(&mut c), Err(Error::CollectionModified));
    }
}
