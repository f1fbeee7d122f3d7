//! bincount: adaptive counter storage for histogramming.
//!
//! A dense, fixed-length sequence of non-negative counters that upgrades its
//! cell representation on demand. Counts start costing one byte per cell and
//! widen through `u16`, `u32`, and `u64` into arbitrary precision exactly
//! when a cell would overflow, so every counter is exact while the memory
//! footprint tracks the largest count actually observed. Floating-point
//! arithmetic collapses the buffer into `f64`, which is terminal and lossy.
//!
//! # Key Types
//!
//! - [`CountStorage`] - the storage engine; all fill, add, and scale verbs
//! - [`Tag`] - the runtime representation discriminator
//! - [`CellRef`] / [`CellMut`] / [`Iter`] - per-cell handles and iteration
//! - [`BufferAlloc`] / [`SystemAlloc`] - the buffer allocation hook
//! - [`StorageError`] - allocation failure and length mismatch
//!
//! # Example
//!
//! ```
//! use bincount::{CountStorage, Tag};
//!
//! let mut counts = CountStorage::with_len(4);
//! for _ in 0..300 {
//!     counts.increment(1)?;
//! }
//! assert_eq!(counts.tag(), Tag::U16); // u8 overflowed at 256
//! assert_eq!(counts.get(1), 300.0);
//! assert_eq!(counts.get(0), 0.0);
//! # Ok::<(), bincount::StorageError>(())
//! ```
//!
//! The storage is a single-owner value: it is not internally synchronized,
//! and the enclosing histogram is expected to serialize access. Within one
//! owner, operations are synchronous and run to completion; a failed
//! allocation aborts the triggering operation and leaves the storage
//! untouched.

mod alloc;
mod cell;
mod counter;
mod error;
mod slots;
mod storage;
pub mod testing;

pub use alloc::{BufferAlloc, CellValue, SystemAlloc};
pub use cell::{CellMut, CellRef, Iter};
pub use error::StorageError;
pub use slots::Tag;
pub use storage::CountStorage;
