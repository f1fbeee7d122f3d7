//! Error types for the storage engine.

/// Errors raised by [`CountStorage`](crate::CountStorage) operations.
///
/// The engine never retries and never logs. A failed operation surfaces one
/// of these values and leaves the storage in its pre-call state: the tag,
/// the buffer, and every cell value are exactly what they were before the
/// call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// The allocator could not provide a buffer of the requested width.
    ///
    /// Raised while promoting to a wider representation or while cloning.
    /// The old buffer is untouched and the triggering operation is aborted.
    #[error("allocating {cells} cells of {width} failed")]
    AllocationFailed {
        /// Number of cells requested.
        cells: usize,
        /// Element type of the requested buffer.
        width: &'static str,
    },

    /// A bulk operation was given a sequence of the wrong length.
    ///
    /// Raised by [`try_add_assign`](crate::CountStorage::try_add_assign) and
    /// the foreign-sequence paths when the operand's cell count differs from
    /// the storage's.
    #[error("cell count mismatch: expected {expected}, got {got}")]
    LengthMismatch {
        /// Cell count of the storage.
        expected: usize,
        /// Cell count of the operand.
        got: usize,
    },
}
