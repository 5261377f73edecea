//! OpenHashMap: linear-probing slot table with tombstones, an intrusive
//! insertion-order list and slot-level access.
//!
//! Layout
//! - `slots` is a power-of-two vector of `Empty | Tombstone | Occupied`.
//!   Each occupied bucket stores the key's hash, computed once at
//!   insertion; rebuilding never calls `K: Hash` again.
//! - Occupied buckets are threaded into a doubly-linked list in insertion
//!   order (`head` oldest, `tail` newest).
//! - `used` counts occupied plus tombstoned slots and never exceeds
//!   `max_used`, which is strictly below the capacity. At least one slot
//!   is therefore always empty and every probe terminates.
//!
//! Slot ids returned by `locate`/`locate_or_reserve` stay valid until the
//! entry is removed or the table is rebuilt (`epoch` changes).

use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::ops::Index;

use hashbrown::hash_map::DefaultHashBuilder;

use crate::error::{Error, Result};
use crate::stamp::{Cursor, Stamp};

const MIN_CAPACITY: usize = 8;

/// Index of a slot in the table.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct SlotId(usize);

impl SlotId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Outcome of `locate_or_reserve`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Located {
    /// The key was already present at this slot.
    Existing(SlotId),
    /// The key was absent and now occupies this slot, holding the map's
    /// default value until `set_value_at` fills it.
    Reserved(SlotId),
}

impl Located {
    pub fn slot(self) -> SlotId {
        match self {
            Located::Existing(s) | Located::Reserved(s) => s,
        }
    }

    pub fn is_reserved(self) -> bool {
        matches!(self, Located::Reserved(_))
    }
}

/// Construction parameters for `OpenHashMap`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MapConfig {
    /// Number of entries to make room for up front.
    pub capacity: usize,
    /// Fraction of slots (live plus tombstones) allowed before a rebuild.
    /// Must lie strictly between 0 and 1.
    pub load_factor: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            capacity: 0,
            load_factor: 0.75,
        }
    }
}

impl MapConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_load_factor(mut self, load_factor: f64) -> Self {
        self.load_factor = load_factor;
        self
    }
}

#[derive(Debug, Clone)]
struct Bucket<K, V> {
    hash: u64,
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug, Clone)]
enum Slot<K, V> {
    Empty,
    Tombstone,
    Occupied(Bucket<K, V>),
}

impl<K, V> Slot<K, V> {
    #[inline]
    fn bucket(&self) -> Option<&Bucket<K, V>> {
        match self {
            Slot::Occupied(b) => Some(b),
            _ => None,
        }
    }

    #[inline]
    fn bucket_mut(&mut self) -> Option<&mut Bucket<K, V>> {
        match self {
            Slot::Occupied(b) => Some(b),
            _ => None,
        }
    }
}

enum Probe {
    Found(usize),
    Tombstone(usize),
    Empty(usize),
}

pub struct OpenHashMap<K, V, S = DefaultHashBuilder> {
    slots: Vec<Slot<K, V>>,
    hasher: S,
    default: V,
    load_factor: f64,
    max_used: usize,
    len: usize,
    used: usize,
    head: Option<usize>,
    tail: Option<usize>,
    epoch: u64,
    stamp: Stamp,
}

impl<K, V> OpenHashMap<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Empty map returning `default` for missing keys.
    pub fn new(default: V) -> Self {
        Self::with_hasher(default, Default::default())
    }

    pub fn with_capacity(default: V, capacity: usize) -> Self {
        Self::with_config(
            default,
            MapConfig::default().with_capacity(capacity),
            Default::default(),
        )
    }
}

impl<K, V, S> OpenHashMap<K, V, S>
where
    K: Eq + Hash,
    V: Clone,
    S: BuildHasher,
{
    pub fn with_hasher(default: V, hasher: S) -> Self {
        Self::with_config(default, MapConfig::default(), hasher)
    }

    /// # Panics
    ///
    /// Panics if `config.load_factor` is not strictly between 0 and 1.
    pub fn with_config(default: V, config: MapConfig, hasher: S) -> Self {
        assert!(
            config.load_factor > 0.0 && config.load_factor < 1.0,
            "load factor must lie strictly between 0 and 1, got {}",
            config.load_factor
        );
        let mut map = Self {
            slots: Vec::new(),
            hasher,
            default,
            load_factor: config.load_factor,
            max_used: 0,
            len: 0,
            used: 0,
            head: None,
            tail: None,
            epoch: 0,
            stamp: Stamp::new(),
        };
        if config.capacity > 0 {
            let cap = map.capacity_for(config.capacity);
            map.slots = empty_slots(cap);
            map.max_used = map.max_used_for(cap);
        }
        map
    }

    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    fn max_used_for(&self, cap: usize) -> usize {
        let raw = (cap as f64 * self.load_factor) as usize;
        raw.min(cap - 1).max(1)
    }

    fn capacity_for(&self, entries: usize) -> usize {
        let mut cap = MIN_CAPACITY;
        while self.max_used_for(cap) < entries {
            cap *= 2;
        }
        cap
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots in the table.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Value returned for lookups that miss.
    pub fn default_value(&self) -> &V {
        &self.default
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Incremented on every table rebuild. Slot ids obtained in an earlier
    /// epoch no longer address their entries.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    fn probe_find<Q>(&self, hash: u64, q: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        if self.slots.is_empty() {
            return None;
        }
        let mask = self.slots.len() - 1;
        let mut i = hash as usize & mask;
        loop {
            match &self.slots[i] {
                Slot::Empty => return None,
                Slot::Occupied(b) if b.hash == hash && b.key.borrow() == q => return Some(i),
                _ => {}
            }
            i = (i + 1) & mask;
        }
    }

    fn probe_insert(&self, hash: u64, key: &K) -> Probe {
        if self.slots.is_empty() {
            return Probe::Empty(0);
        }
        let mask = self.slots.len() - 1;
        let mut i = hash as usize & mask;
        let mut first_tombstone = None;
        loop {
            match &self.slots[i] {
                Slot::Empty => {
                    return match first_tombstone {
                        Some(t) => Probe::Tombstone(t),
                        None => Probe::Empty(i),
                    }
                }
                Slot::Tombstone => {
                    if first_tombstone.is_none() {
                        first_tombstone = Some(i);
                    }
                }
                Slot::Occupied(b) => {
                    if b.hash == hash && b.key == *key {
                        return Probe::Found(i);
                    }
                }
            }
            i = (i + 1) & mask;
        }
    }

    /// Slot of the live entry for `q`, if any. Never mutates.
    pub fn locate<Q>(&self, q: &Q) -> Option<SlotId>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.stamp.enter();
        let hash = self.make_hash(q);
        self.probe_find(hash, q).map(SlotId)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.locate(q).is_some()
    }

    /// Find `key`, or claim a slot for it holding the default value.
    ///
    /// A fresh reservation is linked at the tail of the insertion order.
    /// It may rebuild the table first, invalidating previously held slot
    /// ids; compare `epoch()` before and after if that matters.
    pub fn locate_or_reserve(&mut self, key: K) -> Located {
        let (hash, probe) = {
            let _g = self.stamp.enter();
            let hash = self.make_hash(&key);
            (hash, self.probe_insert(hash, &key))
        };
        let i = match probe {
            Probe::Found(i) => return Located::Existing(SlotId(i)),
            Probe::Tombstone(i) => i,
            Probe::Empty(i) => {
                if self.used + 1 > self.max_used {
                    self.rebuild(self.len + 1);
                    first_empty(&self.slots, hash)
                } else {
                    i
                }
            }
        };
        if matches!(self.slots[i], Slot::Empty) {
            self.used += 1;
        }
        self.occupy(i, hash, key);
        Located::Reserved(SlotId(i))
    }

    fn occupy(&mut self, i: usize, hash: u64, key: K) {
        let bucket = Bucket {
            hash,
            key,
            value: self.default.clone(),
            prev: self.tail,
            next: None,
        };
        self.slots[i] = Slot::Occupied(bucket);
        match self.tail.and_then(|t| self.slots[t].bucket_mut()) {
            Some(t) => t.next = Some(i),
            None => self.head = Some(i),
        }
        self.tail = Some(i);
        self.len += 1;
        self.stamp.bump();
    }

    fn unlink(&mut self, prev: Option<usize>, next: Option<usize>) {
        match prev.and_then(|p| self.slots[p].bucket_mut()) {
            Some(p) => p.next = next,
            None => self.head = next,
        }
        match next.and_then(|n| self.slots[n].bucket_mut()) {
            Some(n) => n.prev = prev,
            None => self.tail = prev,
        }
    }

    /// Rebuild the table with room for `needed` live entries, dropping all
    /// tombstones and keeping insertion order.
    fn rebuild(&mut self, needed: usize) {
        let cap = self.slots.len();
        let mut new_cap = if cap == 0 {
            MIN_CAPACITY
        } else if needed > self.max_used / 2 {
            cap * 2
        } else {
            cap
        };
        while self.max_used_for(new_cap) < needed {
            new_cap *= 2;
        }

        let mut old = core::mem::replace(&mut self.slots, empty_slots(new_cap));
        let mut cur = self.head;
        self.head = None;
        self.tail = None;
        while let Some(i) = cur {
            let Slot::Occupied(mut b) = core::mem::replace(&mut old[i], Slot::Empty) else {
                unreachable!("order list points at a non-occupied slot");
            };
            cur = b.next;
            let j = first_empty(&self.slots, b.hash);
            b.prev = self.tail;
            b.next = None;
            self.slots[j] = Slot::Occupied(b);
            match self.tail.and_then(|t| self.slots[t].bucket_mut()) {
                Some(t) => t.next = Some(j),
                None => self.head = Some(j),
            }
            self.tail = Some(j);
        }
        self.used = self.len;
        self.max_used = self.max_used_for(new_cap);
        self.epoch += 1;
        self.stamp.bump();
    }

    pub fn key_at(&self, slot: SlotId) -> Option<&K> {
        self.slots.get(slot.0)?.bucket().map(|b| &b.key)
    }

    pub fn value_at(&self, slot: SlotId) -> Option<&V> {
        self.slots.get(slot.0)?.bucket().map(|b| &b.value)
    }

    pub fn value_at_mut(&mut self, slot: SlotId) -> Option<&mut V> {
        self.slots.get_mut(slot.0)?.bucket_mut().map(|b| &mut b.value)
    }

    /// Overwrite the value at `slot`, returning the previous one.
    pub fn set_value_at(&mut self, slot: SlotId, value: V) -> Result<V> {
        let v = self.value_at_mut(slot).ok_or(Error::InvalidHandle)?;
        Ok(core::mem::replace(v, value))
    }

    /// Replace the stored key instance at `slot` with an equal one.
    pub fn set_key_at(&mut self, slot: SlotId, key: K) -> Result<K> {
        let b = self
            .slots
            .get_mut(slot.0)
            .and_then(Slot::bucket_mut)
            .ok_or(Error::InvalidHandle)?;
        let equal = {
            let _g = self.stamp.enter();
            b.key == key
        };
        if !equal {
            return Err(Error::KeyMismatch);
        }
        Ok(core::mem::replace(&mut b.key, key))
    }

    /// Tombstone `slot` and unlink it from the insertion order.
    pub fn remove_at(&mut self, slot: SlotId) -> Result<(K, V)> {
        if self.slots.get(slot.0).and_then(Slot::bucket).is_none() {
            return Err(Error::InvalidHandle);
        }
        let Slot::Occupied(b) = core::mem::replace(&mut self.slots[slot.0], Slot::Tombstone) else {
            unreachable!();
        };
        self.unlink(b.prev, b.next);
        self.len -= 1;
        self.stamp.bump();
        Ok((b.key, b.value))
    }

    /// Value for `q`, or the configured default when absent.
    pub fn get<Q>(&self, q: &Q) -> &V
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.try_get(q).unwrap_or(&self.default)
    }

    pub fn try_get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.locate(q).and_then(|s| self.value_at(s))
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let slot = self.locate(q)?;
        self.value_at_mut(slot)
    }

    /// Insert or overwrite.
    pub fn set(&mut self, key: K, value: V) {
        let slot = self.locate_or_reserve(key).slot();
        if let Some(v) = self.value_at_mut(slot) {
            *v = value;
        }
    }

    /// Insert only; returns `false` and leaves the map untouched if `key`
    /// is already present.
    pub fn try_set(&mut self, key: K, value: V) -> bool {
        match self.locate_or_reserve(key) {
            Located::Existing(_) => false,
            Located::Reserved(slot) => {
                if let Some(v) = self.value_at_mut(slot) {
                    *v = value;
                }
                true
            }
        }
    }

    /// Insert or overwrite, returning the previous value (or the default).
    pub fn set_and_get(&mut self, key: K, value: V) -> V {
        let slot = self.locate_or_reserve(key).slot();
        match self.value_at_mut(slot) {
            Some(v) => core::mem::replace(v, value),
            None => self.default.clone(),
        }
    }

    /// Remove `q`, returning its value (or the default when absent).
    pub fn remove<Q>(&mut self, q: &Q) -> V
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        match self.locate(q).map(|slot| self.remove_at(slot)) {
            Some(Ok((_, v))) => v,
            _ => self.default.clone(),
        }
    }

    /// Drop every entry, keeping the allocated table.
    pub fn clear(&mut self) {
        for s in self.slots.iter_mut() {
            *s = Slot::Empty;
        }
        self.len = 0;
        self.used = 0;
        self.head = None;
        self.tail = None;
        self.stamp.bump();
    }

    /// Live entries in insertion order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            slots: &self.slots,
            next: self.head,
            remaining: self.len,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, v)| v)
    }

    /// Live entries in slot-table order. Visits the same set as `iter`.
    pub fn raw_iter(&self) -> RawIter<'_, K, V> {
        RawIter {
            it: self.slots.iter().enumerate(),
        }
    }

    /// Detached cursor positioned at the oldest entry.
    pub fn cursor(&self) -> Cursor {
        self.stamp.cursor(self.head)
    }

    /// Next entry in insertion order, or `CollectionModified` if an entry
    /// was added or removed, or the table rebuilt, since `cursor` was made.
    pub fn advance(&self, cursor: &mut Cursor) -> Result<Option<(SlotId, &K, &V)>> {
        self.stamp.check(cursor)?;
        let Some(i) = cursor.next else {
            return Ok(None);
        };
        let b = self
            .slots
            .get(i)
            .and_then(Slot::bucket)
            .ok_or(Error::CollectionModified)?;
        cursor.next = b.next;
        Ok(Some((SlotId(i), &b.key, &b.value)))
    }
}

fn empty_slots<K, V>(cap: usize) -> Vec<Slot<K, V>> {
    let mut v = Vec::with_capacity(cap);
    v.resize_with(cap, || Slot::Empty);
    v
}

/// First empty slot on the probe path of `hash`. The table must hold at
/// least one empty slot.
fn first_empty<K, V>(slots: &[Slot<K, V>], hash: u64) -> usize {
    let mask = slots.len() - 1;
    let mut i = hash as usize & mask;
    while !matches!(slots[i], Slot::Empty) {
        i = (i + 1) & mask;
    }
    i
}

impl<K, V, S, Q> Index<&Q> for OpenHashMap<K, V, S>
where
    K: Eq + Hash + Borrow<Q>,
    Q: ?Sized + Hash + Eq,
    V: Clone,
    S: BuildHasher,
{
    type Output = V;

    fn index(&self, q: &Q) -> &V {
        self.get(q)
    }
}

impl<K, V, S> Extend<(K, V)> for OpenHashMap<K, V, S>
where
    K: Eq + Hash,
    V: Clone,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.set(k, v);
        }
    }
}

impl<'a, K, V, S> IntoIterator for &'a OpenHashMap<K, V, S>
where
    K: Eq + Hash,
    V: Clone,
    S: BuildHasher,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V, S> fmt::Debug for OpenHashMap<K, V, S>
where
    K: Eq + Hash + fmt::Debug,
    V: Clone + fmt::Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Insertion-ordered iterator over live entries.
pub struct Iter<'a, K, V> {
    slots: &'a [Slot<K, V>],
    next: Option<usize>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let b = self.slots.get(self.next?)?.bucket()?;
        self.next = b.next;
        self.remaining -= 1;
        Some((&b.key, &b.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, V> ExactSizeIterator for Iter<'a, K, V> {}

/// Slot-order iterator over live entries.
pub struct RawIter<'a, K, V> {
    it: core::iter::Enumerate<core::slice::Iter<'a, Slot<K, V>>>,
}

impl<'a, K, V> Iterator for RawIter<'a, K, V> {
    type Item = (SlotId, &'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it
            .by_ref()
            .find_map(|(i, s)| s.bucket().map(|b| (SlotId(i), &b.key, &b.value)))
    }
}

#[cfg(test)]
impl<K, V, S> OpenHashMap<K, V, S>
where
    K: Eq + Hash,
    V: Clone,
    S: BuildHasher,
{
    /// Walk every internal invariant; used by the tests after each step.
    pub(crate) fn check_invariants(&self) {
        let occupied = self.slots.iter().filter(|s| s.bucket().is_some()).count();
        let tombstones = self
            .slots
            .iter()
            .filter(|s| matches!(s, Slot::Tombstone))
            .count();
        assert_eq!(occupied, self.len);
        assert_eq!(occupied + tombstones, self.used);
        assert!(self.used <= self.max_used);
        if !self.slots.is_empty() {
            assert!(self.max_used < self.slots.len());
            assert!(self.slots.len().is_power_of_two());
        }

        let mut seen = 0;
        let mut prev = None;
        let mut cur = self.head;
        while let Some(i) = cur {
            let b = self.slots[i].bucket().expect("linked slot is occupied");
            assert_eq!(b.prev, prev);
            assert_eq!(self.probe_find(b.hash, &b.key), Some(i));
            prev = Some(i);
            cur = b.next;
            seen += 1;
        }
        assert_eq!(prev, self.tail);
        assert_eq!(seen, self.len);
    }
}
