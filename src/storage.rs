//! Adaptive counter storage.
//!
//! [`CountStorage`] is a dense, fixed-length sequence of non-negative
//! counters that widens its cell representation on demand. A fresh storage
//! holds no buffer at all; the first nonzero write allocates `u8` cells, and
//! any cell about to overflow promotes the whole buffer one width up, through
//! `u16`, `u32`, `u64`, and finally arbitrary precision. Floating arithmetic
//! collapses the buffer into `f64`, which is terminal and lossy.
//!
//! # Design
//!
//! - Every verb dispatches through one `match` on the tagged buffer; the
//!   typed slice is handed to width-generic helpers in [`counter`](crate::counter).
//! - Promotion allocates the wider buffer first and swaps it in on success,
//!   so a failed allocation leaves the storage exactly as it was.
//! - The representation never narrows. Memory stays proportional to the
//!   widest count the storage has ever had to hold.
//!
//! # Example
//!
//! ```
//! use bincount::{CountStorage, Tag};
//!
//! let mut counts = CountStorage::with_len(3);
//! counts.increment(0)?;
//! counts.add(2, 300)?;
//! assert_eq!(counts.tag(), Tag::U16);
//! assert_eq!(counts.get(0), 1.0);
//! assert_eq!(counts.get(2), 300.0);
//! # Ok::<(), bincount::StorageError>(())
//! ```

use std::ops::{AddAssign, MulAssign};

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};

use crate::alloc::{BufferAlloc, CellValue, SystemAlloc};
use crate::cell::{CellMut, CellRef, Iter};
use crate::counter::{checked_increment, checked_radd, Counter};
use crate::error::StorageError;
use crate::slots::{
    big_as_f64, big_to_float, cell_eq, to_big, to_float, widened, CellView, Slots, Tag,
};

/// Dense, fixed-length counter storage with adaptive cell width.
///
/// The cell count is fixed when the buffer is created ([`with_len`] or
/// [`reset`]); the cell *representation* adapts to the counts actually
/// stored. See the [module docs](self) for the promotion rules.
///
/// All mutating operations are fallible: they return
/// [`StorageError::AllocationFailed`] when the allocator refuses a wider
/// buffer, leaving the storage in its pre-call state. With the default
/// [`SystemAlloc`] this never happens in practice.
///
/// [`with_len`]: CountStorage::with_len
/// [`reset`]: CountStorage::reset
#[derive(Debug)]
pub struct CountStorage<A: BufferAlloc = SystemAlloc> {
    // Invariant: every non-Empty buffer in `slots` holds exactly `len` cells.
    len: usize,
    slots: Slots,
    alloc: A,
}

impl CountStorage<SystemAlloc> {
    /// Creates an empty storage with zero cells.
    pub fn new() -> Self {
        Self::new_in(SystemAlloc)
    }

    /// Creates a storage of `len` cells, all logically zero.
    ///
    /// No buffer is allocated until the first nonzero write.
    pub fn with_len(len: usize) -> Self {
        Self::with_len_in(len, SystemAlloc)
    }

    /// Builds a storage from a foreign counter sequence.
    ///
    /// Each count is installed through the uniform zero-then-add path, so the
    /// resulting tag is the narrowest width that holds the largest count.
    pub fn from_counts<T>(counts: &[T]) -> Self
    where
        T: Copy + Into<u64>,
    {
        let mut storage = Self::with_len(counts.len());
        for (i, &x) in counts.iter().enumerate() {
            if let Err(err) = storage.set(i, x.into()) {
                panic!("from_counts: {err}");
            }
        }
        storage
    }
}

impl<A: BufferAlloc> CountStorage<A> {
    /// Creates an empty storage with zero cells, using `alloc` for every
    /// buffer it will ever allocate.
    pub fn new_in(alloc: A) -> Self {
        Self {
            len: 0,
            slots: Slots::Empty,
            alloc,
        }
    }

    /// Creates a storage of `len` cells bound to `alloc`.
    pub fn with_len_in(len: usize, alloc: A) -> Self {
        Self {
            len,
            slots: Slots::Empty,
            alloc,
        }
    }

    /// Number of cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the storage has zero cells.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The current cell representation.
    #[inline]
    pub fn tag(&self) -> Tag {
        self.slots.tag()
    }

    /// The allocator bound at construction time.
    #[inline]
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Memory footprint of the cell buffer in bytes.
    ///
    /// Counts the contiguous allocation only; limbs spilled to the heap by
    /// very large arbitrary-precision cells are not included.
    #[inline]
    pub fn size_bytes(&self) -> usize {
        self.len * self.tag().cell_bytes()
    }

    /// Drops the current buffer and installs an empty storage of `len`
    /// cells. Every cell is logically zero afterwards.
    pub fn reset(&mut self, len: usize) {
        self.slots = Slots::Empty;
        self.len = len;
    }

    /// The value of cell `index` as `f64`.
    ///
    /// Never promotes. Lossy for arbitrary-precision counts above 2^53.
    pub fn get(&self, index: usize) -> f64 {
        debug_assert!(
            index < self.len,
            "cell index {index} out of range for {} cells",
            self.len
        );
        match &self.slots {
            Slots::Empty => 0.0,
            Slots::U8(cells) => cells[index] as f64,
            Slots::U16(cells) => cells[index] as f64,
            Slots::U32(cells) => cells[index] as f64,
            Slots::U64(cells) => cells[index] as f64,
            Slots::Big(cells) => big_as_f64(&cells[index]),
            Slots::F64(cells) => cells[index],
        }
    }

    /// Increments cell `index` by one, promoting on overflow.
    pub fn increment(&mut self, index: usize) -> Result<(), StorageError> {
        debug_assert!(
            index < self.len,
            "cell index {index} out of range for {} cells",
            self.len
        );
        loop {
            let done = match &mut self.slots {
                Slots::Empty => false,
                Slots::U8(cells) => checked_increment(&mut cells[index]),
                Slots::U16(cells) => checked_increment(&mut cells[index]),
                Slots::U32(cells) => checked_increment(&mut cells[index]),
                Slots::U64(cells) => checked_increment(&mut cells[index]),
                Slots::Big(cells) => {
                    cells[index] += 1u32;
                    true
                }
                Slots::F64(cells) => {
                    cells[index] += 1.0;
                    true
                }
            };
            if done {
                return Ok(());
            }
            self.grow()?;
        }
    }

    /// Adds an integer count to cell `index`, promoting until it fits.
    ///
    /// On an `f64` buffer the count is added as floating; otherwise the sum
    /// is exact.
    pub fn add(&mut self, index: usize, count: u64) -> Result<(), StorageError> {
        debug_assert!(
            index < self.len,
            "cell index {index} out of range for {} cells",
            self.len
        );
        loop {
            let done = match &mut self.slots {
                Slots::Empty => false,
                Slots::U8(cells) => checked_radd(&mut cells[index], count),
                Slots::U16(cells) => checked_radd(&mut cells[index], count),
                Slots::U32(cells) => checked_radd(&mut cells[index], count),
                Slots::U64(cells) => checked_radd(&mut cells[index], count),
                Slots::Big(cells) => {
                    cells[index] += count;
                    true
                }
                Slots::F64(cells) => {
                    cells[index] += count as f64;
                    true
                }
            };
            if done {
                return Ok(());
            }
            self.grow()?;
        }
    }

    /// Adds an arbitrary-precision count to cell `index`.
    ///
    /// Addends that fit `u64` take the fixed-width path; anything larger
    /// promotes straight through to the arbitrary-precision representation.
    pub fn add_big(&mut self, index: usize, count: &BigUint) -> Result<(), StorageError> {
        debug_assert!(
            index < self.len,
            "cell index {index} out of range for {} cells",
            self.len
        );
        if let Some(small) = count.to_u64() {
            return self.add(index, small);
        }
        loop {
            let done = match &mut self.slots {
                Slots::Big(cells) => {
                    cells[index] += count;
                    true
                }
                Slots::F64(cells) => {
                    cells[index] += big_as_f64(count);
                    true
                }
                _ => false,
            };
            if done {
                return Ok(());
            }
            self.grow()?;
        }
    }

    /// Adds a floating value to cell `index`.
    ///
    /// Collapses any representation into `f64` first; the buffer stays
    /// `f64` from then on.
    pub fn add_f64(&mut self, index: usize, value: f64) -> Result<(), StorageError> {
        debug_assert!(
            index < self.len,
            "cell index {index} out of range for {} cells",
            self.len
        );
        self.ensure_f64()?;
        if let Slots::F64(cells) = &mut self.slots {
            cells[index] += value;
        }
        Ok(())
    }

    /// Sets cell `index` to an integer count.
    ///
    /// Implemented as zero-then-add so that the promotion rules apply
    /// uniformly; there is no downward coercion.
    pub fn set(&mut self, index: usize, count: u64) -> Result<(), StorageError> {
        self.zero_cell(index);
        self.add(index, count)
    }

    /// Sets cell `index` to an arbitrary-precision count.
    pub fn set_big(&mut self, index: usize, count: &BigUint) -> Result<(), StorageError> {
        self.zero_cell(index);
        self.add_big(index, count)
    }

    /// Sets cell `index` to a floating value. The buffer collapses to `f64`.
    pub fn set_f64(&mut self, index: usize, value: f64) -> Result<(), StorageError> {
        self.zero_cell(index);
        self.add_f64(index, value)
    }

    /// Adds another storage cellwise: `self[i] += other[i]` for every cell.
    ///
    /// Each cell is observed through `other`'s typed buffer and added through
    /// the uniform promotion rules, so mixed-representation pairs behave as
    /// if the counts were replayed one by one.
    pub fn try_add_assign<B: BufferAlloc>(
        &mut self,
        other: &CountStorage<B>,
    ) -> Result<(), StorageError> {
        if other.len != self.len {
            return Err(StorageError::LengthMismatch {
                expected: self.len,
                got: other.len,
            });
        }
        match &other.slots {
            Slots::Empty => Ok(()),
            Slots::U8(cells) => self.add_fixed_cells(cells),
            Slots::U16(cells) => self.add_fixed_cells(cells),
            Slots::U32(cells) => self.add_fixed_cells(cells),
            Slots::U64(cells) => self.add_fixed_cells(cells),
            Slots::Big(cells) => {
                for (i, x) in cells.iter().enumerate() {
                    self.add_big(i, x)?;
                }
                Ok(())
            }
            Slots::F64(cells) => {
                for (i, &x) in cells.iter().enumerate() {
                    self.add_f64(i, x)?;
                }
                Ok(())
            }
        }
    }

    /// Adds a foreign counter sequence cellwise.
    pub fn add_counts<T>(&mut self, counts: &[T]) -> Result<(), StorageError>
    where
        T: Copy + Into<u64>,
    {
        if counts.len() != self.len {
            return Err(StorageError::LengthMismatch {
                expected: self.len,
                got: counts.len(),
            });
        }
        for (i, &x) in counts.iter().enumerate() {
            self.add(i, x.into())?;
        }
        Ok(())
    }

    /// Logical equality against a foreign counter sequence.
    pub fn eq_counts<T>(&self, counts: &[T]) -> bool
    where
        T: Copy + Into<u64>,
    {
        self.len == counts.len()
            && counts
                .iter()
                .enumerate()
                .all(|(i, &x)| cell_eq(self.view(i), CellView::Int(x.into())))
    }

    /// Multiplies every cell by a finite factor.
    ///
    /// Integer representations cannot hold `cell * factor` in general, so
    /// any non-`f64` buffer collapses to `f64` first. Zero and negative
    /// factors are allowed; cells may be zero or negative afterwards.
    ///
    /// An empty buffer stays empty: every cell is zero and `0 * factor`
    /// is zero for any finite factor.
    pub fn scale(&mut self, factor: f64) -> Result<(), StorageError> {
        debug_assert!(factor.is_finite(), "scale factor must be finite, got {factor}");
        if matches!(self.slots, Slots::Empty) {
            return Ok(());
        }
        self.ensure_f64()?;
        if let Slots::F64(cells) = &mut self.slots {
            for cell in cells.iter_mut() {
                *cell *= factor;
            }
        }
        Ok(())
    }

    /// A read-only handle to cell `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    pub fn cell(&self, index: usize) -> CellRef<'_, A> {
        assert!(
            index < self.len,
            "cell index {index} out of range for {} cells",
            self.len
        );
        CellRef::new(self, index)
    }

    /// A mutable handle to cell `index`.
    ///
    /// The handle borrows the storage exclusively; it stays valid across
    /// the promotions its own writes trigger.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    pub fn cell_mut(&mut self, index: usize) -> CellMut<'_, A> {
        assert!(
            index < self.len,
            "cell index {index} out of range for {} cells",
            self.len
        );
        CellMut::new(self, index)
    }

    /// Iterates over all cells as read-only handles.
    pub fn iter(&self) -> Iter<'_, A> {
        Iter::new(self)
    }

    /// Cell `index` through the narrowest exact lens.
    pub(crate) fn view(&self, index: usize) -> CellView<'_> {
        match &self.slots {
            Slots::Empty => CellView::Zero,
            Slots::U8(cells) => CellView::Int(cells[index].widen()),
            Slots::U16(cells) => CellView::Int(cells[index].widen()),
            Slots::U32(cells) => CellView::Int(cells[index].widen()),
            Slots::U64(cells) => CellView::Int(cells[index]),
            Slots::Big(cells) => CellView::Big(&cells[index]),
            Slots::F64(cells) => CellView::Float(cells[index]),
        }
    }

    /// Replaces the buffer with the next wider representation.
    ///
    /// Allocates first, copies with widening, then swaps; on allocation
    /// failure the current buffer and tag are untouched.
    fn grow(&mut self) -> Result<(), StorageError> {
        let wider = match &self.slots {
            Slots::Empty => Slots::U8(self.alloc.allocate(self.len)?),
            Slots::U8(cells) => Slots::U16(widened(&self.alloc, cells)?),
            Slots::U16(cells) => Slots::U32(widened(&self.alloc, cells)?),
            Slots::U32(cells) => Slots::U64(widened(&self.alloc, cells)?),
            Slots::U64(cells) => Slots::Big(to_big(&self.alloc, cells)?),
            Slots::Big(_) | Slots::F64(_) => {
                unreachable!("integer arithmetic never outgrows Big or F64 cells")
            }
        };
        self.slots = wider;
        Ok(())
    }

    /// Collapses the buffer into `f64` cells, whatever its current state.
    fn ensure_f64(&mut self) -> Result<(), StorageError> {
        let floats = match &self.slots {
            Slots::F64(_) => return Ok(()),
            Slots::Empty => self.alloc.allocate(self.len)?,
            Slots::U8(cells) => to_float(&self.alloc, cells)?,
            Slots::U16(cells) => to_float(&self.alloc, cells)?,
            Slots::U32(cells) => to_float(&self.alloc, cells)?,
            Slots::U64(cells) => to_float(&self.alloc, cells)?,
            Slots::Big(cells) => big_to_float(&self.alloc, cells)?,
        };
        self.slots = Slots::F64(floats);
        Ok(())
    }

    /// Writes zero into cell `index` in the current representation.
    fn zero_cell(&mut self, index: usize) {
        match &mut self.slots {
            Slots::Empty => {}
            Slots::U8(cells) => cells[index] = 0,
            Slots::U16(cells) => cells[index] = 0,
            Slots::U32(cells) => cells[index] = 0,
            Slots::U64(cells) => cells[index] = 0,
            Slots::Big(cells) => cells[index].set_zero(),
            Slots::F64(cells) => cells[index] = 0.0,
        }
    }

    fn add_fixed_cells<T: Counter>(&mut self, cells: &[T]) -> Result<(), StorageError> {
        for (i, &x) in cells.iter().enumerate() {
            self.add(i, x.widen())?;
        }
        Ok(())
    }

    /// Copies `source`'s cells into the existing buffer when both sides
    /// share the same representation. Returns `false` when they do not.
    fn copy_cells_from<B: BufferAlloc>(&mut self, source: &CountStorage<B>) -> bool {
        match (&mut self.slots, &source.slots) {
            (Slots::Empty, Slots::Empty) => true,
            (Slots::U8(dst), Slots::U8(src)) => {
                dst.copy_from_slice(src);
                true
            }
            (Slots::U16(dst), Slots::U16(src)) => {
                dst.copy_from_slice(src);
                true
            }
            (Slots::U32(dst), Slots::U32(src)) => {
                dst.copy_from_slice(src);
                true
            }
            (Slots::U64(dst), Slots::U64(src)) => {
                dst.copy_from_slice(src);
                true
            }
            (Slots::Big(dst), Slots::Big(src)) => {
                dst.clone_from_slice(src);
                true
            }
            (Slots::F64(dst), Slots::F64(src)) => {
                dst.copy_from_slice(src);
                true
            }
            _ => false,
        }
    }
}

impl<A: BufferAlloc + Clone> CountStorage<A> {
    /// Deep copy through this storage's allocator.
    ///
    /// The copy shares nothing with the original; its buffer comes from a
    /// fresh allocation.
    pub fn try_clone(&self) -> Result<Self, StorageError> {
        let slots = match &self.slots {
            Slots::Empty => Slots::Empty,
            Slots::U8(cells) => Slots::U8(copy_fixed(&self.alloc, cells)?),
            Slots::U16(cells) => Slots::U16(copy_fixed(&self.alloc, cells)?),
            Slots::U32(cells) => Slots::U32(copy_fixed(&self.alloc, cells)?),
            Slots::U64(cells) => Slots::U64(copy_fixed(&self.alloc, cells)?),
            Slots::Big(cells) => {
                let mut dst = self.alloc.allocate::<BigUint>(self.len)?;
                dst.clone_from_slice(cells);
                Slots::Big(dst)
            }
            Slots::F64(cells) => Slots::F64(copy_fixed(&self.alloc, cells)?),
        };
        Ok(Self {
            len: self.len,
            slots,
            alloc: self.alloc.clone(),
        })
    }

    /// Adds the storage to itself: every cell ends up at twice its prior
    /// value.
    ///
    /// A promotion mid-loop would invalidate a view into the buffer being
    /// read, so the source is copied up front. This is the only operation
    /// that allocates a temporary buffer.
    pub fn add_self(&mut self) -> Result<(), StorageError> {
        let copy = self.try_clone()?;
        self.try_add_assign(&copy)
    }

    /// Moves the storage out, leaving an empty zero-length storage behind.
    ///
    /// The returned storage keeps the original buffer and allocator without
    /// reallocating.
    pub fn take(&mut self) -> Self {
        let leftover = Self::new_in(self.alloc.clone());
        std::mem::replace(self, leftover)
    }
}

fn copy_fixed<T, A>(alloc: &A, src: &[T]) -> Result<Box<[T]>, StorageError>
where
    T: CellValue + Copy,
    A: BufferAlloc,
{
    let mut dst = alloc.allocate::<T>(src.len())?;
    dst.copy_from_slice(src);
    Ok(dst)
}

impl<A: BufferAlloc + Clone> Clone for CountStorage<A> {
    /// # Panics
    ///
    /// Panics if the allocator fails; use [`CountStorage::try_clone`] to
    /// handle allocation failure.
    fn clone(&self) -> Self {
        match self.try_clone() {
            Ok(copy) => copy,
            Err(err) => panic!("cloning counter storage failed: {err}"),
        }
    }

    /// Reuses the existing buffer when `source` has the same length and
    /// representation; otherwise falls back to a fresh deep copy.
    fn clone_from(&mut self, source: &Self) {
        if self.len == source.len && self.copy_cells_from(source) {
            return;
        }
        *self = source.clone();
    }
}

impl<A: BufferAlloc + Default> Default for CountStorage<A> {
    fn default() -> Self {
        Self::new_in(A::default())
    }
}

/// Logical equality of the cell sequences, independent of representation.
///
/// An empty buffer equals any zero-filled buffer of the same length, and
/// mixed integer widths compare exactly. Cells compared against `f64` are
/// compared as `f64`.
impl<A: BufferAlloc, B: BufferAlloc> PartialEq<CountStorage<B>> for CountStorage<A> {
    fn eq(&self, other: &CountStorage<B>) -> bool {
        self.len == other.len && (0..self.len).all(|i| cell_eq(self.view(i), other.view(i)))
    }
}

impl<A: BufferAlloc, B: BufferAlloc> AddAssign<&CountStorage<B>> for CountStorage<A> {
    /// Panicking form of [`CountStorage::try_add_assign`].
    fn add_assign(&mut self, rhs: &CountStorage<B>) {
        if let Err(err) = self.try_add_assign(rhs) {
            panic!("+= on counter storage failed: {err}");
        }
    }
}

impl<A: BufferAlloc> MulAssign<f64> for CountStorage<A> {
    /// Panicking form of [`CountStorage::scale`].
    fn mul_assign(&mut self, factor: f64) {
        if let Err(err) = self.scale(factor) {
            panic!("*= on counter storage failed: {err}");
        }
    }
}

impl<'a, A: BufferAlloc> IntoIterator for &'a CountStorage<A> {
    type Item = CellRef<'a, A>;
    type IntoIter = Iter<'a, A>;

    fn into_iter(self) -> Iter<'a, A> {
        self.iter()
    }
}
