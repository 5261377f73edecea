//! handle-heap: single-threaded priority queues whose entries can be
//! removed or re-prioritised through a stable reference, plus the
//! insertion-ordered open-addressing map they are built on.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: give latency-sensitive code O(log n) point operations on heap
//!   entries without per-entry allocation.
//! - Layers:
//!   - HandleAllocator<T>: dense `u32` handles recycled LIFO through an
//!     intrusive free list; each handle carries a payload.
//!   - ArrayHeap<T, C>: root-only binary heap. Its sift routines take a
//!     `placed` callback and are shared by the addressed heaps.
//!   - HandleHeap<T, A, C>: heap entries addressed by `Handle`; the
//!     allocator payload is the entry's current heap index.
//!   - OpenHashMap<K, V, S>: linear-probing table with tombstones, an
//!     intrusive insertion-order list and slot-level access
//!     (`locate_or_reserve`, `value_at_mut`, `remove_at`).
//!   - KeyedHeap<K, T, A, C, S>: heap entries addressed by key; an
//!     embedded `OpenHashMap<K, usize>` maps each key to its heap index.
//!
//! Constraints
//! - Single-threaded: `!Send`/`!Sync` (no atomics, no locks).
//! - The order of a heap is fixed at construction through `Compare`:
//!   `MinOrder`, `MaxOrder` or any `Fn(&T, &T) -> Ordering`.
//! - Every entry may carry an attachment `A` that moves with its value but
//!   never takes part in ordering. `A = ()` gives the plain heaps.
//! - Handles are not generational. A released handle may be reissued and
//!   then addresses the new entry.
//!
//! Iteration and modification
//! - Borrowing iterators (`iter`, `keys`, `raw_iter`) cannot observe a
//!   mutation; the borrow checker forbids it.
//! - Detached `Cursor`s let callers mutate between steps. Every structural
//!   mutation bumps a version; `advance` on a stale cursor reports
//!   `Error::CollectionModified`. Overwriting a map value in place is not
//!   structural.
//!
//! Reentrancy policy
//! - User code runs only as `K: Hash/Eq` and as the comparator. A
//!   debug-only guard panics if that code re-enters the structure it was
//!   called from. Release builds compile the guard away.
//!
//! Hasher and rehashing invariants
//! - The map stores each key's `u64` hash and never calls `K: Hash` after
//!   insertion. Rebuilding purges tombstones, preserves insertion order and
//!   bumps `epoch()`; slot ids from an earlier epoch are stale.

pub mod array_heap;
mod error;
pub mod handle_alloc;
pub mod handle_heap;
mod heap_proptest;
pub mod keyed_heap;
pub mod open_hash_map;
mod open_hash_map_proptest;
pub mod order;
mod stamp;

// Public surface
pub use array_heap::ArrayHeap;
pub use error::{Error, Result};
pub use handle_alloc::{Handle, HandleAllocator};
pub use handle_heap::HandleHeap;
pub use keyed_heap::KeyedHeap;
pub use open_hash_map::{Iter, Located, MapConfig, OpenHashMap, RawIter, SlotId};
pub use order::{Compare, MaxOrder, MinOrder};
pub use stamp::Cursor;
