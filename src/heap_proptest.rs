#![cfg(test)]

// Property tests for the addressed heaps, checked against a plain map
// from handle/key to value.

use crate::error::Error;
use crate::handle_alloc::Handle;
use crate::handle_heap::HandleHeap;
use crate::keyed_heap::KeyedHeap;
use proptest::prelude::*;
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
enum Op {
    Add(i16, u8),
    Remove(usize),
    Modify(usize, i16),
    Pop,
    ModifyTop(i16),
    Peek,
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    let op = prop_oneof![
        3 => (any::<i16>(), any::<u8>()).prop_map(|(v, a)| Op::Add(v, a)),
        1 => any::<usize>().prop_map(Op::Remove),
        1 => (any::<usize>(), any::<i16>()).prop_map(|(i, v)| Op::Modify(i, v)),
        1 => Just(Op::Pop),
        1 => any::<i16>().prop_map(Op::ModifyTop),
        1 => Just(Op::Peek),
    ];
    proptest::collection::vec(op, 1..200)
}

fn model_min<K: Copy>(model: &BTreeMap<K, (i16, u8)>) -> Option<i16> {
    model.values().map(|(v, _)| *v).min()
}

// Property: interleaved add/remove/modify/pop on HandleHeap match the model.
// - peek always equals the model minimum.
// - pop yields the minimum together with the handle and attachment it was
//   added with.
// - Live handles keep resolving to their own value and attachment.
// - Released handles are rejected until reissued.
proptest! {
    #![proptest_config(ProptestConfig { cases: 96, .. ProptestConfig::default() })]
    #[test]
    fn prop_handle_heap_matches_model(ops in arb_ops()) {
        let mut sut: HandleHeap<i16, u8> = HandleHeap::new();
        let mut model: BTreeMap<Handle, (i16, u8)> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Add(v, a) => {
                    let h = sut.add_attached(v, a);
                    prop_assert!(model.insert(h, (v, a)).is_none(), "handle issued twice");
                }
                Op::Remove(i) => {
                    let pick = model.keys().nth(i % model.len().max(1)).copied();
                    if let Some(h) = pick {
                        let expected = model.remove(&h);
                        prop_assert_eq!(sut.remove(h).ok(), expected);
                        prop_assert_eq!(sut.remove(h), Err(Error::InvalidHandle));
                    }
                }
                Op::Modify(i, v) => {
                    let pick = model.keys().nth(i % model.len().max(1)).copied();
                    if let Some(h) = pick {
                        let entry = model.get_mut(&h).expect("live");
                        prop_assert_eq!(sut.modify(h, v), Ok(entry.0));
                        entry.0 = v;
                    }
                }
                Op::Pop => match sut.pop_entry() {
                    Ok((h, v, a)) => {
                        prop_assert_eq!(Some(v), model_min(&model));
                        prop_assert_eq!(model.remove(&h), Some((v, a)));
                    }
                    Err(e) => {
                        prop_assert_eq!(e, Error::EmptyCollection);
                        prop_assert!(model.is_empty());
                    }
                },
                Op::ModifyTop(v) => match sut.peek_handle() {
                    Ok(h) => {
                        let entry = model.get_mut(&h).expect("live");
                        prop_assert_eq!(sut.modify_top(v), Ok(entry.0));
                        entry.0 = v;
                    }
                    Err(_) => {
                        prop_assert!(model.is_empty());
                    }
                },
                Op::Peek => {
                    prop_assert_eq!(sut.peek().ok().copied(), model_min(&model));
                }
            }
            prop_assert_eq!(sut.len(), model.len());
            for (&h, &(v, a)) in &model {
                prop_assert_eq!(sut.try_get_value(h), Some(&v));
                prop_assert_eq!(sut.try_get_attachment(h), Some(&a));
            }
            sut.check_invariants();
        }
    }
}

// Same model for KeyedHeap, keyed by a small integer so that adds collide
// with live keys and exercise `DuplicateKey` and `upsert`.
proptest! {
    #![proptest_config(ProptestConfig { cases: 96, .. ProptestConfig::default() })]
    #[test]
    fn prop_keyed_heap_matches_model(ops in arb_ops(), upsert in any::<bool>()) {
        let mut sut: KeyedHeap<u8, i16, u8> = KeyedHeap::new();
        let mut model: BTreeMap<u8, (i16, u8)> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Add(v, k) => {
                    let k = k % 64;
                    if upsert {
                        let prev = model.insert(k, (v, k));
                        prop_assert_eq!(sut.upsert_attached(k, v, k), prev);
                    } else if model.contains_key(&k) {
                        prop_assert_eq!(sut.add_attached(v, k, k), Err(Error::DuplicateKey));
                    } else {
                        prop_assert_eq!(sut.add_attached(v, k, k), Ok(()));
                        model.insert(k, (v, k));
                    }
                }
                Op::Remove(i) => {
                    let k = (i % 64) as u8;
                    let expected = model.remove(&k);
                    match expected {
                        Some(e) => {
                            prop_assert_eq!(sut.remove(&k), Ok(e));
                        }
                        None => {
                            prop_assert_eq!(sut.remove(&k), Err(Error::InvalidHandle));
                        }
                    }
                }
                Op::Modify(i, v) => {
                    let k = (i % 64) as u8;
                    match model.get_mut(&k) {
                        Some(entry) => {
                            prop_assert_eq!(sut.modify(&k, v), Ok(entry.0));
                            entry.0 = v;
                        }
                        None => {
                            prop_assert_eq!(sut.modify(&k, v), Err(Error::InvalidHandle));
                        }
                    }
                }
                Op::Pop => match sut.pop() {
                    Ok((k, v, a)) => {
                        prop_assert_eq!(Some(v), model_min(&model));
                        prop_assert_eq!(model.remove(&k), Some((v, a)));
                    }
                    Err(e) => {
                        prop_assert_eq!(e, Error::EmptyCollection);
                        prop_assert!(model.is_empty());
                    }
                },
                Op::ModifyTop(v) => match sut.peek_key().copied() {
                    Ok(k) => {
                        let entry = model.get_mut(&k).expect("live");
                        prop_assert_eq!(sut.modify_top(v), Ok(entry.0));
                        entry.0 = v;
                    }
                    Err(_) => {
                        prop_assert!(model.is_empty());
                    }
                },
                Op::Peek => {
                    prop_assert_eq!(sut.peek_value().ok().copied(), model_min(&model));
                }
            }
            prop_assert_eq!(sut.len(), model.len());
            for (k, &(v, a)) in &model {
                prop_assert_eq!(sut.try_get_value(k), Some(&v));
                prop_assert_eq!(sut.try_get_attachment(k), Some(&a));
            }
            sut.check_invariants();
        }
    }
}
