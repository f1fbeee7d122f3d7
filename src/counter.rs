//! Width-generic counter arithmetic.
//!
//! The four unsigned widths a buffer can hold before reaching arbitrary
//! precision share one trait, so the increment and add verbs are written
//! once and monomorphized per width. The checked-add predicate works in the
//! widest unsigned domain (`u64`) to stay clear of overflow in the
//! comparison itself.

use std::fmt;

use num_traits::{PrimInt, Unsigned};

/// One fixed-width unsigned counter representation.
///
/// Implemented for `u8`, `u16`, `u32`, and `u64` only; `BigUint` and `f64`
/// cells never overflow and are handled directly at the dispatch site.
pub(crate) trait Counter: PrimInt + Unsigned + fmt::Debug + 'static {
    /// Largest representable count, widened into the checked-add domain.
    const MAX_WIDE: u64;

    /// The count as a `u64`. Lossless for every implementor.
    fn widen(self) -> u64;

    /// Truncating conversion from `u64`. Callers guarantee `wide` fits.
    fn narrow(wide: u64) -> Self;

    /// The count as an `f64`. Lossless up to 2^53.
    fn as_f64(self) -> f64;
}

macro_rules! impl_counter {
    ($($t:ty),*) => {$(
        impl Counter for $t {
            const MAX_WIDE: u64 = <$t>::MAX as u64;

            #[inline]
            fn widen(self) -> u64 {
                self as u64
            }

            #[inline]
            fn narrow(wide: u64) -> Self {
                wide as $t
            }

            #[inline]
            fn as_f64(self) -> f64 {
                self as f64
            }
        }
    )*};
}

impl_counter!(u8, u16, u32, u64);

/// Increments `slot` unless it already holds the width's maximum.
///
/// Returns `false` without touching the slot when the increment would
/// overflow; the caller promotes and retries.
#[inline]
pub(crate) fn checked_increment<T: Counter>(slot: &mut T) -> bool {
    if *slot < T::max_value() {
        *slot = *slot + T::one();
        return true;
    }
    false
}

/// Adds `add` to `slot` if the sum stays representable.
///
/// The overflow predicate `MAX - slot < add` is evaluated with both sides
/// widened to `u64`, the unsigned-widest domain of the operand pair, so the
/// subtraction itself cannot wrap. Returns `false` without touching the slot
/// when the sum does not fit.
#[inline]
pub(crate) fn checked_radd<T: Counter>(slot: &mut T, add: u64) -> bool {
    if T::MAX_WIDE - slot.widen() < add {
        return false;
    }
    *slot = T::narrow(slot.widen() + add);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_below_max() {
        let mut slot = 254u8;
        assert!(checked_increment(&mut slot));
        assert_eq!(slot, 255);
    }

    #[test]
    fn increment_at_max_refuses() {
        let mut slot = u8::MAX;
        assert!(!checked_increment(&mut slot));
        assert_eq!(slot, u8::MAX);

        let mut slot = u64::MAX;
        assert!(!checked_increment(&mut slot));
        assert_eq!(slot, u64::MAX);
    }

    #[test]
    fn radd_exact_fit() {
        let mut slot = 200u8;
        assert!(checked_radd(&mut slot, 55));
        assert_eq!(slot, 255);
    }

    #[test]
    fn radd_one_past_max_refuses() {
        let mut slot = 200u8;
        assert!(!checked_radd(&mut slot, 56));
        assert_eq!(slot, 200, "failed add must not modify the slot");
    }

    #[test]
    fn radd_large_operand_on_narrow_width() {
        // The addend exceeds the width's entire range; the widened
        // comparison must not wrap.
        let mut slot = 0u8;
        assert!(!checked_radd(&mut slot, u64::MAX));
        assert_eq!(slot, 0);
    }

    #[test]
    fn radd_u64_boundary() {
        let mut slot = u64::MAX - 1;
        assert!(checked_radd(&mut slot, 1));
        assert_eq!(slot, u64::MAX);
        assert!(!checked_radd(&mut slot, 1));
    }

    #[test]
    fn widen_narrow_round_trip() {
        assert_eq!(u16::narrow(65535), u16::MAX);
        assert_eq!(u32::MAX.widen(), u32::MAX as u64);
        assert_eq!(u8::MAX.as_f64(), 255.0);
    }
}
