//! HandleAllocator: dense integer handles recycled through an intrusive free list.
//!
//! Each cell of the backing vector is either in use (carrying a payload)
//! or free, in which case it stores the index of the next free cell. The
//! list head is the most recently released cell, so reuse is LIFO.

use crate::error::{Error, Result};

/// Opaque reference to an entry issued by a `HandleAllocator`.
///
/// A handle stays valid until it is released. After that the same number
/// may be issued again for a different entry; holding on to a released
/// handle is a contract violation the allocator cannot always detect.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Handle(u32);

impl Handle {
    #[inline]
    pub(crate) fn new(index: u32) -> Self {
        Handle(index)
    }

    /// Dense index of this handle, usable for side tables.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
enum Cell<T> {
    Free { next: Option<u32> },
    Used(T),
}

#[derive(Debug, Clone)]
pub struct HandleAllocator<T> {
    cells: Vec<Cell<T>>,
    head: Option<u32>,
    live: usize,
}

const MIN_CELLS: usize = 4;

impl<T> HandleAllocator<T> {
    pub fn new() -> Self {
        Self {
            cells: Vec::new(),
            head: None,
            live: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cells: Vec::with_capacity(capacity),
            head: None,
            live: 0,
        }
    }

    /// Number of handles currently issued.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of cells ever created; handles are always below this bound.
    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    /// Issue a handle carrying `payload`.
    pub fn allocate(&mut self, payload: T) -> Handle {
        let index = match self.head {
            Some(free) => {
                let cell = &mut self.cells[free as usize];
                self.head = match cell {
                    Cell::Free { next } => *next,
                    Cell::Used(_) => unreachable!("free list points at a used cell"),
                };
                *cell = Cell::Used(payload);
                free
            }
            None => {
                let index = self.cells.len();
                assert!(index < u32::MAX as usize, "handle space exhausted");
                if index == self.cells.capacity() {
                    self.cells.reserve_exact(index.max(MIN_CELLS));
                }
                self.cells.push(Cell::Used(payload));
                index as u32
            }
        };
        self.live += 1;
        Handle::new(index)
    }

    /// Return `handle` to the free list and hand back its payload.
    pub fn release(&mut self, handle: Handle) -> Result<T> {
        let cell = self
            .cells
            .get_mut(handle.index())
            .ok_or(Error::InvalidHandle)?;
        if matches!(cell, Cell::Free { .. }) {
            return Err(Error::InvalidHandle);
        }
        let old = core::mem::replace(cell, Cell::Free { next: self.head });
        self.head = Some(handle.0);
        self.live -= 1;
        match old {
            Cell::Used(payload) => Ok(payload),
            Cell::Free { .. } => unreachable!(),
        }
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        match self.cells.get(handle.index()) {
            Some(Cell::Used(payload)) => Some(payload),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        match self.cells.get_mut(handle.index()) {
            Some(Cell::Used(payload)) => Some(payload),
            _ => None,
        }
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    /// Release every handle. Cells are kept for reuse.
    pub fn clear(&mut self) {
        let n = self.cells.len();
        // Rebuild the chain so the lowest indices are handed out first again.
        for (i, cell) in self.cells.iter_mut().enumerate() {
            let next = if i + 1 < n { Some((i + 1) as u32) } else { None };
            *cell = Cell::Free { next };
        }
        self.head = if n > 0 { Some(0) } else { None };
        self.live = 0;
    }

    /// Live handles with their payloads, in index order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.cells.iter().enumerate().filter_map(|(i, c)| match c {
            Cell::Used(p) => Some((Handle::new(i as u32), p)),
            Cell::Free { .. } => None,
        })
    }
}

impl<T> Default for HandleAllocator<T> {
    fn default() -> Self {
        Self::new()
    }
}
