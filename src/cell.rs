//! Cell references and iteration.
//!
//! Because any write can promote the buffer and move every cell, handles
//! never cache a typed pointer. A handle is a `(storage, index)` pair that
//! re-resolves the cell through the dispatch on every use, so it stays
//! coherent across the promotions its own writes trigger.

use std::fmt;
use std::ops::AddAssign;
use std::ptr;

use num_bigint::BigUint;

use crate::alloc::{BufferAlloc, SystemAlloc};
use crate::error::StorageError;
use crate::storage::CountStorage;

/// Read-only handle to one cell.
///
/// Equality between two handles compares the cell values as `f64`, which is
/// lossy for arbitrary-precision counts above 2^53. Storage-level equality
/// ([`CountStorage::eq`](crate::CountStorage)) is exact; use it when the
/// distinction matters.
pub struct CellRef<'a, A: BufferAlloc = SystemAlloc> {
    storage: &'a CountStorage<A>,
    index: usize,
}

impl<'a, A: BufferAlloc> CellRef<'a, A> {
    pub(crate) fn new(storage: &'a CountStorage<A>, index: usize) -> Self {
        Self { storage, index }
    }

    /// The cell value as `f64`.
    #[inline]
    pub fn get(&self) -> f64 {
        self.storage.get(self.index)
    }

    /// The cell's position in the storage.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }
}

impl<A: BufferAlloc> Clone for CellRef<'_, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A: BufferAlloc> Copy for CellRef<'_, A> {}

impl<A: BufferAlloc> fmt::Debug for CellRef<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellRef")
            .field("index", &self.index)
            .field("value", &self.get())
            .finish()
    }
}

impl<A: BufferAlloc, B: BufferAlloc> PartialEq<CellRef<'_, B>> for CellRef<'_, A> {
    fn eq(&self, other: &CellRef<'_, B>) -> bool {
        self.get() == other.get()
    }
}

impl<A: BufferAlloc> PartialEq<f64> for CellRef<'_, A> {
    fn eq(&self, other: &f64) -> bool {
        self.get() == *other
    }
}

impl<A: BufferAlloc> From<CellRef<'_, A>> for f64 {
    fn from(cell: CellRef<'_, A>) -> f64 {
        cell.get()
    }
}

/// Mutable handle to one cell.
///
/// Borrows the storage exclusively, so the handle cannot be invalidated by
/// writes it did not perform itself; its own writes may promote the buffer
/// and the handle re-resolves the cell afterwards.
pub struct CellMut<'a, A: BufferAlloc = SystemAlloc> {
    storage: &'a mut CountStorage<A>,
    index: usize,
}

impl<'a, A: BufferAlloc> CellMut<'a, A> {
    pub(crate) fn new(storage: &'a mut CountStorage<A>, index: usize) -> Self {
        Self { storage, index }
    }

    /// The cell value as `f64`.
    #[inline]
    pub fn get(&self) -> f64 {
        self.storage.get(self.index)
    }

    /// The cell's position in the storage.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Increments the cell by one. See [`CountStorage::increment`].
    pub fn incr(&mut self) -> Result<(), StorageError> {
        self.storage.increment(self.index)
    }

    /// Adds an integer count. See [`CountStorage::add`].
    pub fn add(&mut self, count: u64) -> Result<(), StorageError> {
        self.storage.add(self.index, count)
    }

    /// Adds an arbitrary-precision count. See [`CountStorage::add_big`].
    pub fn add_big(&mut self, count: &BigUint) -> Result<(), StorageError> {
        self.storage.add_big(self.index, count)
    }

    /// Adds a floating value. See [`CountStorage::add_f64`].
    pub fn add_f64(&mut self, value: f64) -> Result<(), StorageError> {
        self.storage.add_f64(self.index, value)
    }

    /// Sets the cell to an integer count. See [`CountStorage::set`].
    pub fn set(&mut self, count: u64) -> Result<(), StorageError> {
        self.storage.set(self.index, count)
    }

    /// Sets the cell to a floating value. See [`CountStorage::set_f64`].
    pub fn set_f64(&mut self, value: f64) -> Result<(), StorageError> {
        self.storage.set_f64(self.index, value)
    }
}

impl<A: BufferAlloc> fmt::Debug for CellMut<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellMut")
            .field("index", &self.index)
            .field("value", &self.get())
            .finish()
    }
}

impl<A: BufferAlloc> PartialEq<f64> for CellMut<'_, A> {
    fn eq(&self, other: &f64) -> bool {
        self.get() == *other
    }
}

impl<A: BufferAlloc> AddAssign<u64> for CellMut<'_, A> {
    /// Panicking form of [`CellMut::add`].
    fn add_assign(&mut self, count: u64) {
        if let Err(err) = self.add(count) {
            panic!("+= on cell failed: {err}");
        }
    }
}

impl<A: BufferAlloc> AddAssign<f64> for CellMut<'_, A> {
    /// Panicking form of [`CellMut::add_f64`].
    fn add_assign(&mut self, value: f64) {
        if let Err(err) = self.add_f64(value) {
            panic!("+= on cell failed: {err}");
        }
    }
}

/// Random-access iterator over a storage's cells.
///
/// Yields [`CellRef`] handles. Two iterators are equal iff they walk the
/// same storage and stand at the same position.
pub struct Iter<'a, A: BufferAlloc = SystemAlloc> {
    storage: &'a CountStorage<A>,
    front: usize,
    back: usize,
}

impl<'a, A: BufferAlloc> Iter<'a, A> {
    pub(crate) fn new(storage: &'a CountStorage<A>) -> Self {
        Self {
            storage,
            front: 0,
            back: storage.len(),
        }
    }
}

impl<A: BufferAlloc> Clone for Iter<'_, A> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage,
            front: self.front,
            back: self.back,
        }
    }
}

impl<A: BufferAlloc> fmt::Debug for Iter<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iter")
            .field("front", &self.front)
            .field("back", &self.back)
            .finish()
    }
}

impl<A: BufferAlloc> PartialEq for Iter<'_, A> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.storage, other.storage)
            && self.front == other.front
            && self.back == other.back
    }
}

impl<'a, A: BufferAlloc> Iterator for Iter<'a, A> {
    type Item = CellRef<'a, A>;

    fn next(&mut self) -> Option<CellRef<'a, A>> {
        if self.front < self.back {
            let cell = CellRef::new(self.storage, self.front);
            self.front += 1;
            Some(cell)
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back - self.front;
        (remaining, Some(remaining))
    }

    fn nth(&mut self, n: usize) -> Option<CellRef<'a, A>> {
        self.front = self.front.saturating_add(n).min(self.back);
        self.next()
    }
}

impl<'a, A: BufferAlloc> DoubleEndedIterator for Iter<'a, A> {
    fn next_back(&mut self) -> Option<CellRef<'a, A>> {
        if self.front < self.back {
            self.back -= 1;
            Some(CellRef::new(self.storage, self.back))
        } else {
            None
        }
    }
}

impl<A: BufferAlloc> ExactSizeIterator for Iter<'_, A> {}

impl<A: BufferAlloc> std::iter::FusedIterator for Iter<'_, A> {}
