#![cfg(test)]

// Property tests for OpenHashMap kept inside the crate so they can call
// `check_invariants`.

use crate::open_hash_map::{Located, OpenHashMap};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::Hasher;

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations so shrinking moves toward earlier keys.
#[derive(Clone, Debug)]
enum OpI {
    Set(usize, i32),
    TrySet(usize, i32),
    Reserve(usize, i32),
    Remove(usize),
    Get(usize),
    Contains(String),
    Iterate,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=12).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Set(i, v)),
            (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::TrySet(i, v)),
            (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Reserve(i, v)),
            idx.clone().prop_map(OpI::Remove),
            idx.clone().prop_map(OpI::Get),
            "[a-z]{0,5}".prop_map(OpI::Contains),
            Just(OpI::Iterate),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

fn run_scenario<S: std::hash::BuildHasher>(
    mut sut: OpenHashMap<Key, i32, S>,
    pool: &[String],
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    const DEFAULT: i32 = i32::MIN;
    let mut model: HashMap<Key, i32> = HashMap::new();
    // Keys in insertion order; a removed and re-added key goes to the back.
    let mut order: Vec<Key> = Vec::new();

    for op in ops {
        match op {
            OpI::Set(i, v) => {
                let k = Key(pool[i].clone());
                if model.insert(k.clone(), v).is_none() {
                    order.push(k.clone());
                }
                sut.set(k, v);
            }
            OpI::TrySet(i, v) => {
                let k = Key(pool[i].clone());
                let fresh = !model.contains_key(&k);
                prop_assert_eq!(sut.try_set(k.clone(), v), fresh);
                if fresh {
                    model.insert(k.clone(), v);
                    order.push(k);
                }
            }
            OpI::Reserve(i, v) => {
                let k = Key(pool[i].clone());
                let located = sut.locate_or_reserve(k.clone());
                prop_assert_eq!(located.is_reserved(), !model.contains_key(&k));
                if let Located::Reserved(slot) = located {
                    prop_assert_eq!(sut.value_at(slot), Some(&DEFAULT));
                    order.push(k.clone());
                }
                prop_assert!(sut.set_value_at(located.slot(), v).is_ok());
                model.insert(k, v);
            }
            OpI::Remove(i) => {
                let k = Key(pool[i].clone());
                let expected = model.remove(&k).unwrap_or(DEFAULT);
                prop_assert_eq!(sut.remove(k.0.as_str()), expected);
                order.retain(|o| o != &k);
            }
            OpI::Get(i) => {
                let k = &pool[i];
                let expected = model.get(k.as_str()).copied();
                prop_assert_eq!(sut.try_get(k.as_str()).copied(), expected);
                prop_assert_eq!(*sut.get(k.as_str()), expected.unwrap_or(DEFAULT));
            }
            OpI::Contains(s) => {
                let has_model = model.keys().any(|k| k.0 == s);
                prop_assert_eq!(sut.contains_key(s.as_str()), has_model);
            }
            OpI::Iterate => {
                let ordered: Vec<Key> = sut.keys().cloned().collect();
                prop_assert_eq!(&ordered, &order);
                let raw: BTreeSet<Key> = sut.raw_iter().map(|(_, k, _)| k.clone()).collect();
                let set: BTreeSet<Key> = ordered.into_iter().collect();
                prop_assert_eq!(raw, set);
            }
        }
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        sut.check_invariants();
    }
    Ok(())
}

// Property: state-machine equivalence against std::collections::HashMap.
// - Misses read the default; `try_set` inserts only when absent.
// - Reservations hold the default until filled.
// - Ordered traversal matches an insertion-order model; raw traversal
//   visits the same set.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_scenario(OpenHashMap::new(i32::MIN), &pool, ops)?;
    }
}

// Collision variant using a constant hasher to stress tombstone chains.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl std::hash::BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_collisions((pool, ops) in arb_scenario()) {
        run_scenario(OpenHashMap::with_hasher(i32::MIN, ConstBuildHasher), &pool, ops)?;
    }
}
