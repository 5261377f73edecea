//! Mutation stamps, detached cursors and the debug-only reentrancy guard.
//!
//! Every structure embeds one `Stamp`. Structural mutations bump its
//! version; a `Cursor` remembers the version it was created under and
//! refuses to advance once the two differ. Public entry points also call
//! `enter()`, which in debug builds panics if user code (`Hash`, `Eq`, a
//! comparator) re-enters the structure while it is mid-operation. In
//! release builds the guard compiles to nothing.

#[cfg(debug_assertions)]
use core::cell::Cell;
use core::marker::PhantomData;

use crate::error::{Error, Result};

#[derive(Debug)]
pub(crate) struct Stamp {
    version: u64,
    #[cfg(debug_assertions)]
    depth: Cell<u32>,
    // Keep !Send + !Sync in line with single-threaded design.
    _nosend: PhantomData<*mut ()>,
}

impl Stamp {
    pub(crate) const fn new() -> Self {
        Self {
            version: 0,
            #[cfg(debug_assertions)]
            depth: Cell::new(0),
            _nosend: PhantomData,
        }
    }

    /// Record a structural mutation; outstanding cursors become stale.
    #[inline]
    pub(crate) fn bump(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    /// Enter a guarded section. In debug builds, panics if already entered.
    #[inline]
    pub(crate) fn enter(&self) -> EntryGuard<'_> {
        #[cfg(debug_assertions)]
        {
            let d = self.depth.get();
            assert!(
                d == 0,
                "reentrancy detected: nested entry into data structure"
            );
            self.depth.set(d + 1);
            EntryGuard { owner: self }
        }

        #[cfg(not(debug_assertions))]
        {
            EntryGuard { _z: PhantomData }
        }
    }

    pub(crate) fn cursor(&self, start: Option<usize>) -> Cursor {
        Cursor {
            version: self.version,
            next: start,
        }
    }

    /// Fails if `cursor` was created before the latest structural mutation.
    #[inline]
    pub(crate) fn check(&self, cursor: &Cursor) -> Result<()> {
        if cursor.version == self.version {
            Ok(())
        } else {
            Err(Error::CollectionModified)
        }
    }
}

impl Default for Stamp {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard returned by `Stamp::enter`.
pub(crate) struct EntryGuard<'a> {
    #[cfg(debug_assertions)]
    owner: &'a Stamp,
    #[cfg(not(debug_assertions))]
    _z: PhantomData<&'a ()>,
}

impl<'a> Drop for EntryGuard<'a> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            let d = self.owner.depth.get();
            debug_assert!(d > 0);
            self.owner.depth.set(d - 1);
        }
    }
}

/// Detached iteration position.
///
/// A cursor does not borrow the structure it walks, so the owner may be
/// mutated between steps. The structure's `advance` method then reports
/// `Error::CollectionModified` instead of yielding further entries. A
/// cursor must only be advanced on the structure that created it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Cursor {
    version: u64,
    pub(crate) next: Option<usize>,
}

impl Cursor {
    /// `true` once the walk has yielded its last entry.
    pub fn is_done(&self) -> bool {
        self.next.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enter_and_exit_is_ok() {
        let s = Stamp::new();
        {
            let _g = s.enter();
        }
        let _g = s.enter();
    }

    #[cfg(debug_assertions)]
    #[test]
    fn reentrancy_panics_in_debug() {
        let s = Stamp::new();
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _g1 = s.enter();
            let _g2 = s.enter();
        }));
        assert!(res.is_err(), "expected reentrancy to panic in debug builds");
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn reentrancy_noop_in_release() {
        let s = Stamp::new();
        let _g1 = s.enter();
        let _g2 = s.enter();
    }

    /// Invariant: a cursor is valid until the next bump, and stays invalid after.
    #[test]
    fn cursor_goes_stale_after_bump() {
        let mut s = Stamp::new();
        let c = s.cursor(Some(0));
        assert_eq!(s.check(&c), Ok(()));
        s.bump();
        assert_eq!(s.check(&c), Err(Error::CollectionModified));
        s.bump();
        assert_eq!(s.check(&c), Err(Error::CollectionModified));
        let fresh = s.cursor(None);
        assert_eq!(s.check(&fresh), Ok(()));
        assert!(fresh.is_done());
    }
}
